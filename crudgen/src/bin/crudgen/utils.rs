use chrono::{DateTime, Utc};

/// Format a DateTime to a human-readable string
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// "1 change" / "3 changes"
pub fn count_label(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_datetime() {
        let dt = DateTime::parse_from_rfc3339("2024-06-01T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_datetime(dt), "2024-06-01 10:30:00 UTC");
    }

    #[test]
    fn test_count_label() {
        assert_eq!(count_label(0, "change"), "0 changes");
        assert_eq!(count_label(1, "change"), "1 change");
        assert_eq!(count_label(4, "file"), "4 files");
    }
}
