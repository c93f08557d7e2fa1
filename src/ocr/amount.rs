//! Monetary amount extraction from OCR text.
//!
//! Lines mentioning a total/due keyword are searched first and the largest
//! amount on them wins. Without any keyword hit, the largest amount anywhere
//! in the text is used. The "largest wins" rule is a heuristic: a reference
//! number formatted like currency on a keyword line can outrank the real total.

use once_cell::sync::Lazy;
use regex::Regex;

/// Phrases marking a line that probably carries the document total.
/// Matched case-insensitively as substrings, so "Subtotal" also counts.
pub const TOTAL_KEYWORDS: &[&str] = &[
    "total due",
    "amount due",
    "balance due",
    "amount owed",
    "total",
    "grand total",
    "invoice total",
];

/// Optional currency symbol, digits with optional thousands separators,
/// optional two-digit fraction
static CURRENCY_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[£$€]?\s?(\d{1,3}(?:,\d{3})+|\d+)(?:\.(\d{2}))?").expect("Currency token regex should be valid")
});

static HORIZONTAL_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\S\n]+").expect("Whitespace regex should be valid"));

/// Collapse whitespace runs inside each line to one space and drop blank lines
pub fn normalize_text(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(|line| HORIZONTAL_WHITESPACE.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Every currency-like token on a line, in minor units
pub fn amounts_in_line(line: &str) -> Vec<i64> {
    CURRENCY_TOKEN
        .captures_iter(line)
        .filter_map(|caps| {
            let whole: i64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
            let fraction: i64 = match caps.get(2) {
                Some(m) => m.as_str().parse().ok()?,
                None => 0,
            };
            whole.checked_mul(100)?.checked_add(fraction)
        })
        .collect()
}

fn has_total_keyword(line: &str) -> bool {
    let lower = line.to_lowercase();
    TOTAL_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Pick the document amount, in minor units
pub fn extract_amount(text: &str) -> Option<i64> {
    let lines = normalize_text(text);

    let keyword_max = lines
        .iter()
        .filter(|line| has_total_keyword(line))
        .flat_map(|line| amounts_in_line(line))
        .max();

    keyword_max.or_else(|| lines.iter().flat_map(|line| amounts_in_line(line)).max())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_line_wins_over_larger_unmarked_amount() {
        assert_eq!(extract_amount("Subtotal: £45.00\nTotal Due: £120.00\n"), Some(12_000));

        let text = "Invoice 2024\nRef 99999\nAmount due: $310.40";
        assert_eq!(extract_amount(text), Some(31_040));
    }

    #[test]
    fn test_fallback_to_global_maximum() {
        assert_eq!(extract_amount("Plumbing £12.50\nParts £7.00"), Some(1_250));
    }

    #[test]
    fn test_no_amount() {
        assert_eq!(extract_amount("Thank you for your business"), None);
        assert_eq!(extract_amount(""), None);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        assert_eq!(extract_amount("GRAND TOTAL €1,250.99\nDeposit €5,000.00"), Some(125_099));
    }

    #[test]
    fn test_thousands_separators_and_fractions() {
        assert_eq!(amounts_in_line("£1,234,567.89"), vec![123_456_789]);
        assert_eq!(amounts_in_line("$ 42"), vec![4_200]);
        assert_eq!(amounts_in_line("12.5"), vec![1_200, 500]);
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        let lines = normalize_text("Total   Due:\t £10.00\r\n\n   \nNext  line");
        assert_eq!(lines, vec!["Total Due: £10.00".to_string(), "Next line".to_string()]);
    }
}
