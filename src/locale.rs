//! Locale configuration for lexing and value coercion.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Separators and formats the lexer and the text-to-value coercions honor.
///
/// The engine never consults the process locale; hosts configure this
/// explicitly per engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// Decimal point inside numeric literals (`.` for en-US, `,` for de-DE).
    pub decimal_separator: char,
    /// Separator between function arguments (`,` for en-US, `;` for de-DE).
    pub list_separator: char,
    /// Suffix that divides a numeric literal by 100.
    pub percent_symbol: char,
    /// Date/time formats tried in order when coercing text to a date and when
    /// reading `#...#` literals. `chrono` strftime syntax.
    pub date_formats: Vec<String>,
}

impl LocaleConfig {
    pub fn en_us() -> Self {
        LocaleConfig {
            decimal_separator: '.',
            list_separator: ',',
            percent_symbol: '%',
            date_formats: vec![
                "%m/%d/%Y %H:%M:%S".to_string(),
                "%m/%d/%Y %H:%M".to_string(),
                "%m/%d/%Y".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%d".to_string(),
            ],
        }
    }

    pub fn de_de() -> Self {
        LocaleConfig {
            decimal_separator: ',',
            list_separator: ';',
            percent_symbol: '%',
            date_formats: vec![
                "%d.%m.%Y %H:%M:%S".to_string(),
                "%d.%m.%Y %H:%M".to_string(),
                "%d.%m.%Y".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%d".to_string(),
            ],
        }
    }

    /// Parses a full numeric literal, including scientific notation, honoring
    /// the configured decimal separator.
    pub fn parse_number(&self, text: &str) -> Option<f64> {
        let normalized: String = text
            .chars()
            .map(|c| if c == self.decimal_separator { '.' } else { c })
            .collect();
        normalized.parse::<f64>().ok()
    }

    /// Tries each configured date format in order; date-only formats get a
    /// midnight time component.
    pub fn parse_date(&self, text: &str) -> Option<NaiveDateTime> {
        let text = text.trim();
        for fmt in &self.date_formats {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
                return Some(dt);
            }
            if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
                return d.and_hms_opt(0, 0, 0);
            }
        }
        None
    }
}

impl Default for LocaleConfig {
    fn default() -> Self {
        LocaleConfig::en_us()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn en_us_number() {
        let locale = LocaleConfig::en_us();
        assert_eq!(locale.parse_number("1.5"), Some(1.5));
        assert_eq!(locale.parse_number("1.5e3"), Some(1500.0));
        assert_eq!(locale.parse_number("abc"), None);
    }

    #[test]
    fn de_de_number() {
        let locale = LocaleConfig::de_de();
        assert_eq!(locale.parse_number("1,5"), Some(1.5));
    }

    #[test]
    fn date_fallback_formats() {
        let locale = LocaleConfig::en_us();
        let d = locale.parse_date("1/30/2024").unwrap();
        assert_eq!(d.format("%Y-%m-%d").to_string(), "2024-01-30");
        let d = locale.parse_date("2024-01-30 12:30:00").unwrap();
        assert_eq!(d.format("%H:%M").to_string(), "12:30");
    }
}
