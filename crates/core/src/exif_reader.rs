use chrono::NaiveDateTime;
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

const EXIF_DATE_LAYOUT: &str = "%Y:%m:%d %H:%M:%S";

const STANDARD_DATE_TAGS: &[Tag] = &[
    Tag::DateTimeOriginal,
    Tag::DateTimeDigitized,
    Tag::DateTime,
];

/// Capture date from embedded EXIF. Every failure collapses to `None`.
pub fn read_capture_date(path: &Path, locale_tags: &[String]) -> Option<NaiveDateTime> {
    let exif = match read_exif(path) {
        Ok(exif) => exif,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "no usable EXIF container");
            return None;
        }
    };
    capture_date_from(&exif, locale_tags)
}

fn read_exif(path: &Path) -> Result<Exif, exif::Error> {
    let file = File::open(path)?;
    let mut buf = BufReader::new(file);
    Reader::new().read_from_container(&mut buf)
}

fn capture_date_from(exif: &Exif, locale_tags: &[String]) -> Option<NaiveDateTime> {
    let standard = STANDARD_DATE_TAGS
        .iter()
        .map(|tag| exif.get_field(*tag, In::PRIMARY));
    let localized = locale_tags.iter().map(|name| find_field_by_name(exif, name));

    standard
        .chain(localized)
        .flatten()
        .find_map(parse_field)
}

/// A locale tag is either a tag number (`0x9003`, `36867`) or the tag name
/// as kamadak-exif spells it (`DateTimeOriginal`). Explorer column labels
/// such as `Aufnahmedatum` are not stored in the file under that name, so
/// they only match if the EXIF library ever exposes a tag by it.
fn find_field_by_name<'a>(exif: &'a Exif, name: &str) -> Option<&'a Field> {
    let number = tag_number(name);
    exif.fields().find(|field| match number {
        Some(number) => field.tag.number() == number,
        None => field.tag.to_string().eq_ignore_ascii_case(name),
    })
}

fn tag_number(raw: &str) -> Option<u16> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn parse_field(field: &Field) -> Option<NaiveDateTime> {
    match &field.value {
        Value::Ascii(parts) => parts
            .iter()
            .filter_map(|raw| std::str::from_utf8(raw).ok())
            .find_map(parse_exif_datetime),
        _ => None,
    }
}

pub(crate) fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    NaiveDateTime::parse_from_str(trimmed, EXIF_DATE_LAYOUT).ok()
}

/// Minimal JPEG carrying a single EXIF ASCII date tag.
#[cfg(test)]
pub(crate) fn jpeg_with_exif_date(tag: u16, value: &str) -> Vec<u8> {
    let mut ascii = value.as_bytes().to_vec();
    ascii.push(0);
    let count = ascii.len() as u32;

    let in_exif_ifd = tag != 0x0132;
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());

    let ifd0_len = 2 + 12 + 4;
    if in_exif_ifd {
        let exif_ifd = 8 + ifd0_len as u32;
        let data = exif_ifd + ifd0_len as u32;
        push_ifd(&mut tiff, 0x8769, 4, 1, exif_ifd);
        push_ifd(&mut tiff, tag, 2, count, data);
    } else {
        let data = 8 + ifd0_len as u32;
        push_ifd(&mut tiff, tag, 2, count, data);
    }
    tiff.extend_from_slice(&ascii);

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    let segment_len = (2 + 6 + tiff.len()) as u16;
    jpeg.extend_from_slice(&segment_len.to_be_bytes());
    jpeg.extend_from_slice(b"Exif\0\0");
    jpeg.extend_from_slice(&tiff);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

#[cfg(test)]
fn push_ifd(out: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: u32) {
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&value.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::{jpeg_with_exif_date, parse_exif_datetime, read_capture_date, tag_number};
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    fn no_locale() -> Vec<String> {
        Vec::new()
    }

    #[test]
    fn reads_original_capture_time() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("photo.jpg");
        fs::write(&path, jpeg_with_exif_date(0x9003, "2022:01:01 00:00:00")).expect("write jpeg");

        let date = read_capture_date(&path, &no_locale()).expect("date should be read");
        let expected = NaiveDate::from_ymd_opt(2022, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date");
        assert_eq!(date, expected);
    }

    #[test]
    fn falls_back_to_generic_modification_tag() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("photo.jpg");
        fs::write(&path, jpeg_with_exif_date(0x0132, "2019:05:12 08:30:00")).expect("write jpeg");

        let date = read_capture_date(&path, &no_locale()).expect("date should be read");
        assert_eq!(date.to_string(), "2019-05-12 08:30:00");
    }

    #[test]
    fn unparsable_value_yields_nothing() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("photo.jpg");
        fs::write(&path, jpeg_with_exif_date(0x9003, "not a date at all!!")).expect("write jpeg");

        assert_eq!(read_capture_date(&path, &no_locale()), None);
    }

    #[test]
    fn missing_or_foreign_files_yield_nothing() {
        let temp = tempdir().expect("tempdir");
        let plain = temp.path().join("plain.jpg");
        fs::write(&plain, b"definitely not a jpeg").expect("write file");

        assert_eq!(read_capture_date(&plain, &no_locale()), None);
        assert_eq!(
            read_capture_date(&temp.path().join("missing.jpg"), &no_locale()),
            None
        );
    }

    #[test]
    fn parse_rejects_other_layouts() {
        assert!(parse_exif_datetime("2021:06:15 10:15:00").is_some());
        assert!(parse_exif_datetime("2021:06:15 10:15:00\0").is_some());
        assert!(parse_exif_datetime("2021-06-15 10:15:00").is_none());
        assert!(parse_exif_datetime("2021:13:15 10:15:00").is_none());
        assert!(parse_exif_datetime("    :  :     :  :  ").is_none());
    }

    #[test]
    fn extra_tags_match_by_name_or_number() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("photo.jpg");
        // ImageUniqueID, an ASCII tag in the Exif IFD.
        fs::write(&path, jpeg_with_exif_date(0xA420, "2018:03:04 05:06:07")).expect("write jpeg");

        assert_eq!(read_capture_date(&path, &no_locale()), None);
        assert_eq!(
            read_capture_date(&path, &["Aufnahmedatum".to_string()]),
            None
        );
        for name in ["ImageUniqueID", "imageuniqueid", "0xA420", "0xa420", "42016"] {
            let date = read_capture_date(&path, &[name.to_string()])
                .unwrap_or_else(|| panic!("{name} should match"));
            assert_eq!(date.to_string(), "2018-03-04 05:06:07");
        }
    }

    #[test]
    fn tag_numbers_parse_as_hex_or_decimal() {
        assert_eq!(tag_number("0x9003"), Some(0x9003));
        assert_eq!(tag_number("0X9003"), Some(0x9003));
        assert_eq!(tag_number("36867"), Some(0x9003));
        assert_eq!(tag_number("Aufnahmedatum"), None);
        assert_eq!(tag_number("0x1ffff"), None);
    }
}
