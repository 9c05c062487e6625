use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TEMPLATE: &str = "  {spinner:.cyan} {prefix:>9} [{bar:30.cyan/dim}] {pos}/{len} {wide_msg}";

/// One bar shared by every stage of a run; the stage name is the prefix.
pub fn stage_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::with_template(TEMPLATE)
        .map(|style| style.progress_chars("━╸─").tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn reporter(pb: ProgressBar) -> impl Fn(&str, u64, u64, &str) + Send + Sync {
    move |stage, current, total, path| {
        if pb.length() != Some(total) {
            pb.set_length(total);
        }
        pb.set_prefix(stage.to_string());
        pb.set_position(current + 1);
        pb.set_message(path.to_string());
    }
}
