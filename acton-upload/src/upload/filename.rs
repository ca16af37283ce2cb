//! Filename normalization and rejection
//!
//! Client-supplied filenames pass through three independent layers:
//!
//! 1. Raw traversal check: any `..` path segment is rejected outright
//! 2. Normalization to `[A-Za-z0-9._-]` with separators collapsed
//! 3. Post-normalization checks for length, dangerous extensions, and any
//!    remaining traversal sequence
//!
//! Layer 3 repeats the traversal check even though layer 2 should have
//! removed every separator.
//!
//! # Examples
//!
//! ```rust
//! use acton_upload::upload::FilenameSanitizer;
//!
//! let sanitizer = FilenameSanitizer::default();
//! assert_eq!(sanitizer.sanitize("My Report (final).csv").unwrap(), "My_Report_final.csv");
//! assert!(sanitizer.sanitize("../../etc/passwd").is_err());
//! assert!(sanitizer.sanitize("invoice.exe").is_err());
//! ```

use super::policy::DangerousExtensions;
use crate::error::FilenameError;
use std::sync::Arc;

/// Longest normalized filename accepted
pub const MAX_FILENAME_LENGTH: usize = 255;

const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Turns untrusted filenames into safe storage names
#[derive(Debug, Clone, Default)]
pub struct FilenameSanitizer {
    dangerous_extensions: Arc<DangerousExtensions>,
}

impl FilenameSanitizer {
    /// Creates a sanitizer sharing the given extension set
    #[must_use]
    pub const fn new(dangerous_extensions: Arc<DangerousExtensions>) -> Self {
        Self {
            dangerous_extensions,
        }
    }

    /// Normalizes a filename or explains why it is unusable
    ///
    /// # Errors
    ///
    /// - [`FilenameError::EmptyName`] if nothing usable remains
    /// - [`FilenameError::PathTraversal`] if the input has a `..` segment, or
    ///   the normalized name still contains `..`, `/`, or `\`
    /// - [`FilenameError::NameTooLong`] if the result exceeds 255 characters
    /// - [`FilenameError::DisallowedExtension`] for dangerous extensions
    pub fn sanitize(&self, original_filename: &str) -> Result<String, FilenameError> {
        if original_filename.trim().is_empty() {
            return Err(FilenameError::EmptyName);
        }

        if has_traversal_segment(original_filename) {
            return Err(FilenameError::PathTraversal);
        }

        let secure_name = normalize(original_filename);
        if secure_name.is_empty() {
            return Err(FilenameError::EmptyName);
        }

        if secure_name.len() > MAX_FILENAME_LENGTH {
            return Err(FilenameError::NameTooLong {
                length: secure_name.len(),
                max: MAX_FILENAME_LENGTH,
            });
        }

        if let Some((_, extension)) = secure_name.rsplit_once('.') {
            if self.dangerous_extensions.contains(extension) {
                return Err(FilenameError::DisallowedExtension(
                    extension.to_ascii_lowercase(),
                ));
            }
        }

        if secure_name.contains("..") || secure_name.contains('/') || secure_name.contains('\\') {
            return Err(FilenameError::PathTraversal);
        }

        Ok(secure_name)
    }
}

fn has_traversal_segment(name: &str) -> bool {
    name.split(['/', '\\']).any(|segment| segment.trim() == "..")
}

/// Reduces a name to `[A-Za-z0-9._-]`
///
/// Separators and whitespace runs become a single `_`, non-ASCII characters
/// are dropped, and leading or trailing `.`/`_` are trimmed. Windows device
/// names get a `_` prefix.
fn normalize(name: &str) -> String {
    let spaced: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_ascii_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');

    let stem = trimmed.split('.').next().unwrap_or_default();
    if WINDOWS_DEVICE_NAMES
        .iter()
        .any(|device| device.eq_ignore_ascii_case(stem))
    {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sanitizer() -> FilenameSanitizer {
        FilenameSanitizer::default()
    }

    #[test]
    fn test_plain_name_unchanged() {
        assert_eq!(sanitizer().sanitize("photo.png").unwrap(), "photo.png");
        assert_eq!(sanitizer().sanitize("archive.tar.gz").unwrap(), "archive.tar.gz");
    }

    #[test]
    fn test_whitespace_and_punctuation() {
        assert_eq!(
            sanitizer().sanitize("My File (1).csv").unwrap(),
            "My_File_1.csv"
        );
        assert_eq!(sanitizer().sanitize("  notes\t v2.txt ").unwrap(), "notes_v2.txt");
    }

    #[test]
    fn test_separators_collapse() {
        assert_eq!(sanitizer().sanitize("reports/2024/q1.csv").unwrap(), "reports_2024_q1.csv");
        assert_eq!(sanitizer().sanitize("C:\\Users\\me\\a.txt").unwrap(), "C_Users_me_a.txt");
    }

    #[test]
    fn test_non_ascii_dropped() {
        assert_eq!(sanitizer().sanitize("résumé.pdf").unwrap(), "rsum.pdf");
    }

    #[test]
    fn test_leading_dots_removed() {
        assert_eq!(sanitizer().sanitize(".htaccess").unwrap(), "htaccess");
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(sanitizer().sanitize(""), Err(FilenameError::EmptyName));
        assert_eq!(sanitizer().sanitize("   "), Err(FilenameError::EmptyName));
        assert_eq!(sanitizer().sanitize("...."), Err(FilenameError::EmptyName));
        assert_eq!(sanitizer().sanitize("\u{0}"), Err(FilenameError::EmptyName));
        assert_eq!(sanitizer().sanitize("日本語"), Err(FilenameError::EmptyName));
    }

    #[test]
    fn test_raw_traversal_rejected() {
        assert_eq!(
            sanitizer().sanitize("../../etc/passwd"),
            Err(FilenameError::PathTraversal)
        );
        assert_eq!(
            sanitizer().sanitize("..\\windows\\win.ini"),
            Err(FilenameError::PathTraversal)
        );
        assert_eq!(sanitizer().sanitize(".."), Err(FilenameError::PathTraversal));
    }

    #[test]
    fn test_normalized_traversal_rejected() {
        assert_eq!(
            sanitizer().sanitize("my..file.txt"),
            Err(FilenameError::PathTraversal)
        );
    }

    #[test]
    fn test_too_long() {
        let name = format!("{}.txt", "a".repeat(300));
        assert_eq!(
            sanitizer().sanitize(&name),
            Err(FilenameError::NameTooLong {
                length: 304,
                max: MAX_FILENAME_LENGTH,
            })
        );
    }

    #[test]
    fn test_exactly_max_length_accepted() {
        let name = format!("{}.txt", "a".repeat(MAX_FILENAME_LENGTH - 4));
        assert_eq!(sanitizer().sanitize(&name).unwrap().len(), MAX_FILENAME_LENGTH);
    }

    #[test]
    fn test_dangerous_extensions() {
        assert_eq!(
            sanitizer().sanitize("malware.exe"),
            Err(FilenameError::DisallowedExtension("exe".to_string()))
        );
        assert_eq!(
            sanitizer().sanitize("shell.PHP"),
            Err(FilenameError::DisallowedExtension("php".to_string()))
        );
        assert_eq!(
            sanitizer().sanitize("photo.png.sh"),
            Err(FilenameError::DisallowedExtension("sh".to_string()))
        );
    }

    #[test]
    fn test_name_without_extension_not_treated_as_extension() {
        assert_eq!(sanitizer().sanitize("exe").unwrap(), "exe");
    }

    #[test]
    fn test_extra_extensions_respected() {
        let sanitizer =
            FilenameSanitizer::new(Arc::new(DangerousExtensions::with_extra(["hta"])));
        assert_eq!(
            sanitizer.sanitize("update.hta"),
            Err(FilenameError::DisallowedExtension("hta".to_string()))
        );
    }

    #[test]
    fn test_windows_device_names_prefixed() {
        assert_eq!(sanitizer().sanitize("CON.txt").unwrap(), "_CON.txt");
        assert_eq!(sanitizer().sanitize("lpt1").unwrap(), "_lpt1");
        assert_eq!(sanitizer().sanitize("console.txt").unwrap(), "console.txt");
    }

    proptest! {
        #[test]
        fn prop_result_never_contains_traversal(name in ".*") {
            if let Ok(secure) = sanitizer().sanitize(&name) {
                prop_assert!(!secure.contains(".."));
                prop_assert!(!secure.contains('/'));
                prop_assert!(!secure.contains('\\'));
            }
        }

        #[test]
        fn prop_result_uses_safe_alphabet(name in "[a-zA-Z0-9 ./\\\\_-]{1,64}") {
            if let Ok(secure) = sanitizer().sanitize(&name) {
                prop_assert!(secure
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')));
            }
        }
    }
}
