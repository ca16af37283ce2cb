//! Core types for upload validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Caller-declared classification of an upload
///
/// The category selects the MIME allow-list and size ceiling applied to the
/// submission. It never influences content sniffing itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Comma-separated values
    Csv,
    /// Plain text
    Text,
    /// Raster image (JPEG, PNG, GIF, WebP)
    Image,
    /// PDF document
    Pdf,
}

impl Category {
    /// All categories, in declaration order
    pub const ALL: [Self; 4] = [Self::Csv, Self::Text, Self::Image, Self::Pdf];

    /// Lowercase name used in configuration and messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Text => "text",
            Self::Image => "image",
            Self::Pdf => "pdf",
        }
    }

    /// Whether content in this category is expected to decode as text
    ///
    /// Only text-bearing categories are scanned for injection markers.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use acton_upload::upload::Category;
    ///
    /// assert!(Category::Csv.is_text_bearing());
    /// assert!(!Category::Pdf.is_text_bearing());
    /// ```
    #[must_use]
    pub const fn is_text_bearing(self) -> bool {
        matches!(self, Self::Csv | Self::Text)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A category name that does not match any known category
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown file category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "pdf" => Ok(Self::Pdf),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// An untrusted file handed to the validation pipeline
///
/// The pipeline consumes the submission; its bytes move into the
/// [`ValidationResult`] on success and are dropped on rejection.
///
/// # Examples
///
/// ```rust
/// use acton_upload::upload::{Category, FileSubmission};
///
/// let submission = FileSubmission::new("data.csv", Category::Csv, b"a,b\n1,2\n".to_vec());
/// assert_eq!(submission.size(), 8);
/// ```
#[derive(Debug, Clone)]
pub struct FileSubmission {
    /// Filename as supplied by the client
    pub original_filename: String,

    /// Category the caller expects the file to belong to
    pub declared_category: Category,

    /// Raw file bytes
    pub content: Vec<u8>,
}

impl FileSubmission {
    /// Creates a new submission
    #[must_use]
    pub fn new(original_filename: impl Into<String>, declared_category: Category, content: Vec<u8>) -> Self {
        Self {
            original_filename: original_filename.into(),
            declared_category,
            content,
        }
    }

    /// Returns the content length in bytes
    #[must_use]
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// An upload that passed every pipeline stage
///
/// Only [`crate::upload::UploadValidator`] can construct one, so holding a
/// `ValidationResult` is proof that the bytes were validated. The content is
/// the original buffer, passed through unchanged.
///
/// Serializing a result omits the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    original_filename: String,
    secure_filename: String,
    mime_type: String,
    size_bytes: u64,
    content_hash: String,
    #[serde(skip)]
    content: Vec<u8>,
    accepted: bool,
}

impl ValidationResult {
    pub(crate) fn accepted(
        original_filename: String,
        secure_filename: String,
        mime_type: String,
        content_hash: String,
        content: Vec<u8>,
    ) -> Self {
        Self {
            original_filename,
            secure_filename,
            mime_type,
            size_bytes: content.len() as u64,
            content_hash,
            content,
            accepted: true,
        }
    }

    /// Filename as supplied by the client
    #[must_use]
    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    /// Normalized, filesystem-safe filename
    #[must_use]
    pub fn secure_filename(&self) -> &str {
        &self.secure_filename
    }

    /// MIME type detected from content
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Content length in bytes
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Lowercase hex SHA-256 digest of the content
    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Validated bytes
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Always `true`; rejected submissions never produce a result
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Consumes the result, returning the validated bytes
    #[must_use]
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!("  PDF ".parse::<Category>().unwrap(), Category::Pdf);
    }

    #[test]
    fn test_unknown_category() {
        let err = "spreadsheet".parse::<Category>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown file category: spreadsheet");
    }

    #[test]
    fn test_result_serialization_skips_content() {
        let result = ValidationResult::accepted(
            "a.txt".to_string(),
            "a.txt".to_string(),
            "text/plain".to_string(),
            "0".repeat(64),
            b"secret body".to_vec(),
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["size_bytes"], 11);
        assert_eq!(json["accepted"], true);
        assert!(json.get("content").is_none());
    }
}
