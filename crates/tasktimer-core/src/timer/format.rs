/// Format milliseconds as `HH:MM:SS`. Hours do not wrap at 24.
pub fn format_hms(ms: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        ms / 3_600_000,
        (ms % 3_600_000) / 60_000,
        (ms % 60_000) / 1000
    )
}
