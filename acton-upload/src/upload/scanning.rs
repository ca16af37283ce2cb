//! Heuristic threat scanning for text uploads
//!
//! This is structural and heuristic inspection only. It does not match
//! malware signatures, execute content, or consult virus databases; combine
//! it with the other pipeline stages rather than relying on it alone.
//!
//! Text-bearing categories (`csv`, `text`) are decoded as UTF-8 and checked
//! for:
//!
//! - injection markers such as `<script` or `<?php` (case-insensitive, first
//!   match wins)
//! - an unusually high share of symbol characters, which tends to indicate
//!   obfuscated script rather than data
//!
//! Binary categories pass through untouched.
//!
//! Within [`super::UploadValidator`] the content type stage already rejects
//! text that is not valid UTF-8 as `mime.undetermined`, so
//! [`ThreatError::NonTextPayload`] is only reported when the scanner is used
//! on its own.
//!
//! Obfuscation thresholds must lie in `0.0..1.0`. A scanner built with any
//! other value, NaN included, rejects every text upload instead of accepting
//! it unchecked.
//!
//! # Examples
//!
//! ```rust
//! use acton_upload::upload::{Category, ThreatScanner};
//! use acton_upload::error::ThreatError;
//!
//! let scanner = ThreatScanner::default();
//! assert!(scanner.scan(b"name,total\nwidgets,12\n", Category::Csv).is_ok());
//! assert_eq!(
//!     scanner.scan(b"=HYPERLINK(\"javascript:alert(1)\")", Category::Csv),
//!     Err(ThreatError::SuspiciousPattern("javascript:".to_string()))
//! );
//! ```

use super::types::Category;
use crate::error::ThreatError;

/// Default share of unusual characters tolerated in text content
pub const DEFAULT_OBFUSCATION_THRESHOLD: f64 = 0.30;

/// Injection markers, checked in order against lowercased content
pub const INJECTION_MARKERS: &[&str] = &[
    "<script",
    "javascript:",
    "vbscript:",
    "onload=",
    "onerror=",
    "eval(",
    "exec(",
    "system(",
    "shell_exec",
    "<?php",
    "<%",
    "<jsp:",
    "${",
    "import os",
    "import subprocess",
];

/// Whether `threshold` is usable as an obfuscation threshold
///
/// No ratio can exceed a threshold of 1.0 or above, and NaN compares false
/// against everything.
#[must_use]
pub fn is_valid_threshold(threshold: f64) -> bool {
    (0.0..1.0).contains(&threshold)
}

/// Punctuation that ordinary data uses heavily and never counts as unusual
const COMMON_PUNCTUATION: &[char] = &[',', '.', '"', '\''];

/// Scans decoded text for injection markers and obfuscation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreatScanner {
    obfuscation_threshold: f64,
}

impl Default for ThreatScanner {
    fn default() -> Self {
        Self::new(DEFAULT_OBFUSCATION_THRESHOLD)
    }
}

impl ThreatScanner {
    /// Creates a scanner with a custom obfuscation threshold
    ///
    /// The threshold is the ratio of unusual characters to total characters
    /// above which content is rejected. It is a tunable heuristic, not proof
    /// of malice. A threshold outside `0.0..1.0` makes every text upload fail
    /// the obfuscation check.
    #[must_use]
    pub const fn new(obfuscation_threshold: f64) -> Self {
        Self {
            obfuscation_threshold,
        }
    }

    /// Returns the configured obfuscation threshold
    #[must_use]
    pub const fn obfuscation_threshold(&self) -> f64 {
        self.obfuscation_threshold
    }

    /// Scans content declared under `category`
    ///
    /// # Errors
    ///
    /// - [`ThreatError::NonTextPayload`] if text-bearing content is not UTF-8
    /// - [`ThreatError::SuspiciousPattern`] on the first injection marker
    /// - [`ThreatError::ObfuscationSuspected`] if the unusual character ratio
    ///   exceeds the threshold, or the threshold is outside `0.0..1.0`
    pub fn scan(&self, content: &[u8], category: Category) -> Result<(), ThreatError> {
        if !category.is_text_bearing() {
            return Ok(());
        }

        let text = std::str::from_utf8(content).map_err(|_| ThreatError::NonTextPayload)?;

        if let Some(marker) = find_marker(text) {
            return Err(ThreatError::SuspiciousPattern(marker.to_string()));
        }

        let ratio = unusual_character_ratio(text);
        if !is_valid_threshold(self.obfuscation_threshold)
            || ratio > self.obfuscation_threshold
        {
            return Err(ThreatError::ObfuscationSuspected {
                ratio,
                threshold: self.obfuscation_threshold,
            });
        }

        Ok(())
    }
}

fn find_marker(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    INJECTION_MARKERS
        .iter()
        .copied()
        .find(|marker| lowered.contains(marker))
}

/// Share of characters that are not alphanumeric, whitespace, or common
/// punctuation; zero for empty text
#[allow(clippy::cast_precision_loss)]
fn unusual_character_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut unusual = 0usize;

    for c in text.chars() {
        total += 1;
        if !c.is_alphanumeric() && !c.is_whitespace() && !COMMON_PUNCTUATION.contains(&c) {
            unusual += 1;
        }
    }

    if total == 0 {
        return 0.0;
    }

    unusual as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clean_csv_passes() {
        let scanner = ThreatScanner::default();
        let csv = b"id,name,email\n1,\"Doe, Jane\",jane@example.com\n2,Bob,bob@example.com\n";
        assert!(scanner.scan(csv, Category::Csv).is_ok());
    }

    #[test]
    fn test_script_tag_detected() {
        let scanner = ThreatScanner::default();
        assert_eq!(
            scanner.scan(b"<script>alert(1)</script>", Category::Csv),
            Err(ThreatError::SuspiciousPattern("<script".to_string()))
        );
    }

    #[test]
    fn test_markers_are_case_insensitive() {
        let scanner = ThreatScanner::default();
        assert_eq!(
            scanner.scan(b"hello <ScRiPt src=x>", Category::Text),
            Err(ThreatError::SuspiciousPattern("<script".to_string()))
        );
        assert_eq!(
            scanner.scan(b"<?PHP echo 1; ?>", Category::Text),
            Err(ThreatError::SuspiciousPattern("<?php".to_string()))
        );
    }

    #[test]
    fn test_first_marker_in_list_order_wins() {
        let scanner = ThreatScanner::default();
        assert_eq!(
            scanner.scan(b"import os; eval(x); <script>", Category::Text),
            Err(ThreatError::SuspiciousPattern("<script".to_string()))
        );
    }

    #[test]
    fn test_template_and_event_handlers() {
        let scanner = ThreatScanner::default();
        assert_eq!(
            scanner.scan(b"name\n${jndi:ldap://x}\n", Category::Csv),
            Err(ThreatError::SuspiciousPattern("${".to_string()))
        );
        assert_eq!(
            scanner.scan(b"<img src=x onerror=steal()>", Category::Text),
            Err(ThreatError::SuspiciousPattern("onerror=".to_string()))
        );
    }

    #[test]
    fn test_invalid_utf8_in_text_category() {
        let scanner = ThreatScanner::default();
        assert_eq!(
            scanner.scan(&[0x66, 0x6F, 0xFF, 0xFE], Category::Text),
            Err(ThreatError::NonTextPayload)
        );
    }

    #[test]
    fn test_binary_categories_skipped() {
        let scanner = ThreatScanner::default();
        assert!(scanner.scan(b"<script>alert(1)</script>", Category::Image).is_ok());
        assert!(scanner.scan(&[0xFF, 0xFE, 0x00], Category::Pdf).is_ok());
    }

    #[test]
    fn test_obfuscation_detected() {
        let scanner = ThreatScanner::default();
        let result = scanner.scan(b"a=~[];a={___:++a}", Category::Text);
        assert!(matches!(
            result,
            Err(ThreatError::ObfuscationSuspected { ratio, threshold })
                if ratio > threshold
        ));
    }

    #[test]
    fn test_common_punctuation_is_not_unusual() {
        assert!(unusual_character_ratio("\"a\",'b'.c,,").abs() < f64::EPSILON);
    }

    #[test]
    fn test_ratio_at_threshold_passes() {
        // 3 of 10 characters are unusual: exactly 0.30
        let scanner = ThreatScanner::default();
        assert!(scanner.scan(b"abcdefg-+*", Category::Text).is_ok());
        assert!(scanner.scan(b"abcdef-+*/", Category::Text).is_err());
    }

    #[test]
    fn test_threshold_is_tunable() {
        let strict = ThreatScanner::new(0.05);
        assert!(matches!(
            strict.scan(b"price: $10 (net)", Category::Text),
            Err(ThreatError::ObfuscationSuspected { .. })
        ));
        assert!(ThreatScanner::default()
            .scan(b"price: $10 (net)", Category::Text)
            .is_ok());
    }

    #[test]
    fn test_unusable_threshold_rejects_instead_of_disabling() {
        let symbols = b"!@#$%^&*()_+{}|:<>?~";
        for threshold in [f64::NAN, f64::INFINITY, 1.0, 1.5, -0.1] {
            let scanner = ThreatScanner::new(threshold);
            assert!(
                matches!(
                    scanner.scan(symbols, Category::Text),
                    Err(ThreatError::ObfuscationSuspected { .. })
                ),
                "threshold {threshold} let obfuscated text through"
            );
            assert!(matches!(
                scanner.scan(b"plain words", Category::Csv),
                Err(ThreatError::ObfuscationSuspected { .. })
            ));
        }
    }

    #[test]
    fn test_threshold_range() {
        assert!(is_valid_threshold(0.0));
        assert!(is_valid_threshold(DEFAULT_OBFUSCATION_THRESHOLD));
        assert!(is_valid_threshold(0.99));
        assert!(!is_valid_threshold(1.0));
        assert!(!is_valid_threshold(f64::NAN));
        assert!(!is_valid_threshold(f64::NEG_INFINITY));
    }

    #[test]
    fn test_empty_text_ratio_is_zero() {
        assert!(unusual_character_ratio("").abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_script_tag_always_detected(
            prefix in "[a-z0-9 ,\n]{0,40}",
            tag in "<[sS][cC][rR][iI][pP][tT]",
            suffix in "[a-z0-9 ,\n]{0,40}",
        ) {
            let content = format!("{prefix}{tag}{suffix}");
            prop_assert_eq!(
                ThreatScanner::default().scan(content.as_bytes(), Category::Csv),
                Err(ThreatError::SuspiciousPattern("<script".to_string()))
            );
        }
    }
}
