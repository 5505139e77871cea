//! Current UTC date and time as ISO strings.

use chrono::Utc;

/// Today as `YYYY-MM-DD`.
pub fn date() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Now as `YYYY-MM-DDTHH:MM:SS`, without fraction or offset.
pub fn datetime() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;

    #[test]
    fn date_is_iso() {
        let today = date();
        assert_eq!(today.len(), 10);
        assert!(NaiveDate::parse_from_str(&today, "%Y-%m-%d").is_ok());
    }

    #[test]
    fn datetime_is_iso_without_offset() {
        let now = datetime();
        assert_eq!(now.len(), 19);
        assert!(NaiveDateTime::parse_from_str(&now, "%Y-%m-%dT%H:%M:%S").is_ok());
    }
}
