use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};
use std::sync::LazyLock;

struct DatePattern {
    regex: &'static LazyLock<Regex>,
    with_time: bool,
}

// 2019-05-12, 20190512, 2019_05_12
static RE_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<y>[0-9]{4})[-_]?(?P<m>[0-9]{2})[-_]?(?P<d>[0-9]{2})").expect("valid regex")
});
// 20160629_115604
static RE_CAMERA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?P<y>[0-9]{4})(?P<m>[0-9]{2})(?P<d>[0-9]{2})",
        r"[_-](?P<hh>[0-9]{2})(?P<mm>[0-9]{2})(?P<ss>[0-9]{2})",
    ))
    .expect("valid regex")
});

static PATTERNS: &[DatePattern] = &[
    DatePattern { regex: &RE_DAY, with_time: false },
    DatePattern { regex: &RE_CAMERA, with_time: true },
];

/// Date encoded in a file name. Each pattern is tried once at its leftmost
/// match; an impossible calendar date moves on to the next pattern.
pub fn date_from_filename(filename: &str) -> Option<NaiveDateTime> {
    PATTERNS.iter().find_map(|pat| {
        let caps = pat.regex.captures(filename)?;
        let date = calendar_date(&caps)?;
        let time = if pat.with_time {
            time_of_day(&caps)?
        } else {
            NaiveTime::MIN
        };
        Some(date.and_time(time))
    })
}

fn calendar_date(caps: &Captures) -> Option<NaiveDate> {
    let year: i32 = caps.name("y")?.as_str().parse().ok()?;
    let month: u32 = caps.name("m")?.as_str().parse().ok()?;
    let day: u32 = caps.name("d")?.as_str().parse().ok()?;
    if year < 1 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn time_of_day(caps: &Captures) -> Option<NaiveTime> {
    let field = |name: &str| -> Option<u32> { caps.name(name)?.as_str().parse().ok() };
    NaiveTime::from_hms_opt(field("hh")?, field("mm")?, field("ss")?)
}
