//! Cell cleanup rules applied while mapping table cells to record fields.

use std::sync::LazyLock;

use regex::Regex;

static NUMERIC_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)").expect("valid numeric pattern"));
static STATUS_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d.%]+").expect("valid status pattern"));
static MM_UNIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)mm").expect("valid unit pattern"));
static MM_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[\d.]+\s*mm").expect("valid value pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// How a single-valued cell is cleaned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    /// Trim surrounding whitespace only
    Trim,
    /// Keep the first numeric run; empty or "-" becomes "0"
    Battery,
    /// Collapse internal whitespace and newlines to single spaces
    CollapseWhitespace,
}

impl Cleanup {
    pub fn apply(&self, raw: &str) -> String {
        match self {
            Cleanup::Trim => raw.trim().to_string(),
            Cleanup::Battery => battery(raw),
            Cleanup::CollapseWhitespace => collapse_whitespace(raw),
        }
    }
}

/// How a cell carrying both a reading and a description is split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// "99.9%Sangat Lembab"
    Percent,
    /// "0.2 mm Hujan Ringan"
    Millimetres,
}

impl Split {
    /// Returns `(numeric, status)`
    pub fn apply(&self, raw: &str) -> (String, String) {
        let raw = raw.trim();
        match self {
            Split::Percent => (numeric_or_raw(raw), status(raw)),
            Split::Millimetres => {
                let without_unit = MM_UNIT.replace_all(raw, "");
                let without_value = MM_VALUE.replace_all(raw, "");
                (numeric_or_raw(without_unit.trim()), status(&without_value))
            }
        }
    }
}

/// First run of digits with an optional decimal part
pub fn first_numeric(text: &str) -> Option<&str> {
    NUMERIC_RUN.find(text).map(|m| m.as_str())
}

/// Numeric part of `text`, or `text` unchanged when it has none
pub fn numeric_or_raw(text: &str) -> String {
    first_numeric(text).unwrap_or(text).to_string()
}

/// Descriptive part of `text`: digits, dots and percent signs removed
pub fn status(text: &str) -> String {
    STATUS_NOISE.replace_all(text, "").trim().to_string()
}

pub fn battery(raw: &str) -> String {
    let value = raw.trim();
    match first_numeric(value) {
        Some(number) => number.to_string(),
        None if value.is_empty() || value == "-" => "0".to_string(),
        None => value.to_string(),
    }
}

pub fn collapse_whitespace(raw: &str) -> String {
    WHITESPACE.replace_all(raw, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_parsing_table() {
        let cases = [
            ("12.5", "12.5"),
            ("12.5V", "12.5"),
            ("12.50 volt", "12.50"),
            ("", "0"),
            ("-", "0"),
            ("N/A", "N/A"),
            ("13.2", "13.2"),
            ("  12.8 ", "12.8"),
        ];

        for (input, expected) in cases {
            assert_eq!(battery(input), expected, "input {:?}", input);
        }
    }

    #[test]
    fn test_humidity_split() {
        let (value, status) = Split::Percent.apply("99.9%Sangat Lembab");
        assert_eq!(value, "99.9");
        assert_eq!(status, "Sangat Lembab");
    }

    #[test]
    fn test_humidity_without_status() {
        let (value, status) = Split::Percent.apply("78%");
        assert_eq!(value, "78");
        assert_eq!(status, "");
    }

    #[test]
    fn test_rainfall_split_strips_unit() {
        let (value, status) = Split::Millimetres.apply("0.2 mm Hujan Ringan");
        assert_eq!(value, "0.2");
        assert_eq!(status, "Hujan Ringan");

        let (value, status) = Split::Millimetres.apply("0MMTidak Hujan");
        assert_eq!(value, "0");
        assert_eq!(status, "Tidak Hujan");
    }

    #[test]
    fn test_non_numeric_split_keeps_text() {
        let (value, status) = Split::Millimetres.apply("-");
        assert_eq!(value, "-");
        assert_eq!(status, "-");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Barat\n   Daya \t"), "Barat Daya");
        assert_eq!(Cleanup::CollapseWhitespace.apply("U\n\nTL"), "U TL");
    }

    #[test]
    fn test_trim_keeps_inner_spacing() {
        assert_eq!(Cleanup::Trim.apply("  Kab.  Bangka \n"), "Kab.  Bangka");
    }
}
