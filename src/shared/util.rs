//! Small formatting helpers shared by the router and the renderer.

use chrono::DateTime;

/// Format a byte count with binary prefixes, trimming trailing zeros
///
/// Mirrors the label users see next to shared files: `512 B`, `2 KiB`,
/// `1.5 MiB`. Sizes of a pebibyte and beyond collapse to `Too Big`.
pub fn human_readable_size(len: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut size = len as f64;
    let mut unit = None;
    for candidate in UNITS {
        if size < 1024.0 {
            unit = Some(candidate);
            break;
        }
        size /= 1024.0;
    }
    let Some(unit) = unit else {
        return "Too Big".to_string();
    };
    let mut text = format!("{size:.3}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    format!("{text} {unit}")
}

/// Render a unix-millisecond timestamp as a short date-time string
///
/// Out-of-range timestamps fall back to the raw number rather than failing
/// the push that needed them.
pub fn format_timestamp(millis: i64) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => millis.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes() {
        assert_eq!(human_readable_size(0), "0 B");
        assert_eq!(human_readable_size(512), "512 B");
        assert_eq!(human_readable_size(1023), "1023 B");
    }

    #[test]
    fn test_binary_prefixes() {
        assert_eq!(human_readable_size(1024), "1 KiB");
        assert_eq!(human_readable_size(1536), "1.5 KiB");
        assert_eq!(human_readable_size(1024 * 1024), "1 MiB");
        assert_eq!(human_readable_size(5 * 1024 * 1024 * 1024), "5 GiB");
    }

    #[test]
    fn test_trailing_zeros_trimmed() {
        // 1126 / 1024 = 1.099609..., rendered as 1.1 after trimming
        assert_eq!(human_readable_size(1126), "1.1 KiB");
    }

    #[test]
    fn test_too_big() {
        assert_eq!(human_readable_size(u64::MAX), "Too Big");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00");
        assert_eq!(format_timestamp(i64::MAX), i64::MAX.to_string());
    }
}
