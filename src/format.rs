//! Human-readable byte sizes for reports

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Format a byte count using binary (1024) units.
///
/// Zero is "0 B". Everything else is rounded to two decimals with trailing
/// zeros trimmed, keeping at least one decimal: 512 is "512.0 B", 1536 is
/// "1.5 KB", 1048576 is "1.0 MB". Anything past GB stays in GB.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let rounded = (size * 100.0).round() / 100.0;
    let mut text = format!("{:.2}", rounded);
    while text.ends_with('0') && !text.ends_with(".0") {
        text.pop();
    }

    format!("{} {}", text, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_and_small() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1), "1.0 B");
        assert_eq!(format_bytes(512), "512.0 B");
        assert_eq!(format_bytes(1023), "1023.0 B");
    }

    #[test]
    fn test_powers_of_1024() {
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.0 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_fractions() {
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1280), "1.25 KB");
        assert_eq!(format_bytes(1365), "1.33 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
    }

    #[test]
    fn test_rounding_just_below_next_unit() {
        // 1023.999 KB rounds up but stays in KB
        assert_eq!(format_bytes(1024 * 1024 - 1), "1024.0 KB");
    }

    #[test]
    fn test_beyond_gigabytes_stays_in_gb() {
        assert_eq!(format_bytes(1024u64.pow(4)), "1024.0 GB");
    }
}
