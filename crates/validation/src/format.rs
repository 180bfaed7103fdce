//! String format checks shared by the format rules.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;

fn uuid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // RFC 4122 layout: version nibble 1-5, variant nibble 8/9/a/b
        Regex::new(
            r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$",
        )
        .expect("uuid pattern compiles")
    })
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
    })
}

pub(crate) fn is_uuid(s: &str) -> bool {
    uuid_pattern().is_match(s)
}

pub(crate) fn is_email(s: &str) -> bool {
    email_pattern().is_match(s)
}

pub(crate) fn is_url(s: &str) -> bool {
    url::Url::parse(s).is_ok_and(|url| url.has_host())
}

pub(crate) fn is_date(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok() || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Renders a rule parameter, dropping the fraction of whole numbers.
pub(crate) fn number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_requires_version_and_variant_nibbles() {
        assert!(is_uuid("9b2f3c1e-6a4d-4f0b-8c2e-1a2b3c4d5e6f"));
        assert!(is_uuid("9B2F3C1E-6A4D-1F0B-AC2E-1A2B3C4D5E6F"));
        // version 0
        assert!(!is_uuid("9b2f3c1e-6a4d-0f0b-8c2e-1a2b3c4d5e6f"));
        // variant c
        assert!(!is_uuid("9b2f3c1e-6a4d-4f0b-cc2e-1a2b3c4d5e6f"));
        assert!(!is_uuid("9b2f3c1e6a4d4f0b8c2e1a2b3c4d5e6f"));
    }

    #[test]
    fn test_email_shape() {
        assert!(is_email("someone@shop.com"));
        assert!(!is_email("someone@shop"));
        assert!(!is_email("some one@shop.com"));
        assert!(!is_email("@shop.com"));
    }

    #[test]
    fn test_url_needs_a_host() {
        assert!(is_url("https://shop.com/products/1"));
        assert!(!is_url("mailto:someone@shop.com"));
        assert!(!is_url("shop.com"));
    }

    #[test]
    fn test_date_accepts_rfc3339_and_plain_dates() {
        assert!(is_date("2024-02-29"));
        assert!(is_date("2024-02-29T10:00:00Z"));
        assert!(is_date("2024-02-29T10:00:00.123-03:00"));
        assert!(!is_date("2023-02-29"));
        assert!(!is_date("yesterday"));
    }

    #[test]
    fn test_number_rendering() {
        assert_eq!(number(5.0), "5");
        assert_eq!(number(-2.0), "-2");
        assert_eq!(number(0.5), "0.5");
    }
}
