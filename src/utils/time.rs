use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

/// Parse a timestamp string from Vault audit logs
pub fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .context("Failed to parse timestamp")
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_timestamp() {
        let ts = "2025-10-06T07:26:03.801191678Z";
        let dt = parse_timestamp(ts).unwrap();
        assert_eq!(dt.year(), 2025);
        assert_eq!(dt.month(), 10);
        assert_eq!(dt.day(), 6);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday-ish").is_err());
        assert!(parse_timestamp("").is_err());
    }
}
