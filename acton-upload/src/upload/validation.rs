//! MIME type detection from content bytes
//!
//! The declared category, the filename, and any client `Content-Type` header
//! are never consulted when deciding what a file is. Binary formats are
//! identified by their magic numbers using the `infer` crate; text is
//! identified structurally (valid UTF-8, no stray control characters).
//!
//! # Security
//!
//! Renaming `shell.php` to `data.csv` changes nothing here: the bytes decide
//! the type, and the type must then appear on the category allow-list.
//!
//! # Examples
//!
//! ```rust
//! use acton_upload::upload::{Category, ContentTypeValidator};
//! use acton_upload::error::MimeError;
//!
//! let validator = ContentTypeValidator::default();
//!
//! let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];
//! assert_eq!(validator.sniff(&png, Category::Image), Ok("image/png"));
//!
//! // A PNG is not a CSV, whatever the filename says
//! assert!(matches!(
//!     validator.sniff(&png, Category::Csv),
//!     Err(MimeError::DisallowedType { .. })
//! ));
//! ```

use super::policy::CategoryPolicies;
use super::types::Category;
use crate::error::MimeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Plain text
pub const TEXT_PLAIN: &str = "text/plain";

/// Comma-separated values
pub const TEXT_CSV: &str = "text/csv";

/// Generic binary, used only by the opaque fallback
pub const OCTET_STREAM: &str = "application/octet-stream";

const CSV_SAMPLE_LINES: usize = 5;

/// Signature matches trusted even when every byte of the file is printable
const TEXTUAL_FORMATS: &[&str] = &["application/pdf"];

/// Outcome of inspecting content bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sniffed {
    /// A signature or text structure matched
    Detected(&'static str),

    /// Inspection ran but nothing matched
    Unrecognized,

    /// Inspection cannot run in this environment
    Unavailable,
}

/// Content inspection backend
///
/// Implementations must look only at the bytes.
#[cfg_attr(test, mockall::automock)]
pub trait ContentSniffer: Send + Sync {
    /// Inspects content and reports what it is
    fn sniff(&self, content: &[u8]) -> Sniffed;

    /// Name of the backend, for diagnostics
    fn name(&self) -> &'static str;
}

/// Magic-number and text-structure sniffer backed by `infer`
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureSniffer;

impl SignatureSniffer {
    /// Creates a new signature sniffer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ContentSniffer for SignatureSniffer {
    fn sniff(&self, content: &[u8]) -> Sniffed {
        let text = classify_text(content);

        if let Some(kind) = infer::get(content) {
            // HTML, XML and shebang matches are text with a hint, not a format
            let is_markup = matches!(kind.matcher_type(), infer::MatcherType::Text);
            // Short printable magics (`BM`, `MZ`, `ID3`) also open ordinary text
            let outranks_text = text.is_none() || TEXTUAL_FORMATS.contains(&kind.mime_type());
            if !is_markup && outranks_text {
                return Sniffed::Detected(kind.mime_type());
            }
        }

        text.map_or(Sniffed::Unrecognized, Sniffed::Detected)
    }

    fn name(&self) -> &'static str {
        "infer signature sniffer"
    }
}

/// Sniffer for platforms where content inspection is not available
///
/// Always reports [`Sniffed::Unavailable`]; what happens next is decided by
/// the configured [`SniffFallback`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSniffer;

impl ContentSniffer for UnavailableSniffer {
    fn sniff(&self, _content: &[u8]) -> Sniffed {
        Sniffed::Unavailable
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// What to do when the sniffer reports [`Sniffed::Unavailable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SniffFallback {
    /// Reject every upload that cannot be inspected
    #[default]
    FailClosed,

    /// Treat binary-category uploads as `application/octet-stream`
    ///
    /// The allow-list still applies, so this only admits files for categories
    /// whose policy explicitly lists `application/octet-stream`. Text-bearing
    /// categories always fail closed.
    OpaqueBinary,
}

/// Sniffs content and enforces the category allow-list
#[derive(Clone)]
pub struct ContentTypeValidator {
    sniffer: Arc<dyn ContentSniffer>,
    policies: Arc<CategoryPolicies>,
    fallback: SniffFallback,
}

impl fmt::Debug for ContentTypeValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentTypeValidator")
            .field("sniffer", &self.sniffer.name())
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl Default for ContentTypeValidator {
    fn default() -> Self {
        Self::new(
            Arc::new(SignatureSniffer::new()),
            Arc::default(),
            SniffFallback::default(),
        )
    }
}

impl ContentTypeValidator {
    /// Creates a validator from a sniffer, policy table, and fallback
    #[must_use]
    pub fn new(
        sniffer: Arc<dyn ContentSniffer>,
        policies: Arc<CategoryPolicies>,
        fallback: SniffFallback,
    ) -> Self {
        Self {
            sniffer,
            policies,
            fallback,
        }
    }

    /// Replaces the content inspection backend
    #[must_use]
    pub fn with_sniffer(mut self, sniffer: Arc<dyn ContentSniffer>) -> Self {
        self.sniffer = sniffer;
        self
    }

    /// Returns the configured fallback
    #[must_use]
    pub const fn fallback(&self) -> SniffFallback {
        self.fallback
    }

    /// Determines the MIME type and checks it against the category
    ///
    /// # Errors
    ///
    /// - [`MimeError::UndeterminedType`] if nothing matched
    /// - [`MimeError::SniffingUnavailable`] if inspection is unavailable and
    ///   the fallback refuses
    /// - [`MimeError::DisallowedType`] if the type is not allowed
    pub fn sniff(&self, content: &[u8], category: Category) -> Result<&'static str, MimeError> {
        let mime_type = match self.sniffer.sniff(content) {
            Sniffed::Detected(mime_type) => mime_type,
            Sniffed::Unrecognized => return Err(MimeError::UndeterminedType),
            Sniffed::Unavailable => self.degraded(category)?,
        };

        if !self.policies.get(category).allows(mime_type) {
            return Err(MimeError::DisallowedType {
                mime_type: mime_type.to_string(),
                category,
            });
        }

        Ok(mime_type)
    }

    fn degraded(&self, category: Category) -> Result<&'static str, MimeError> {
        match self.fallback {
            SniffFallback::OpaqueBinary if !category.is_text_bearing() => {
                warn!(
                    sniffer = self.sniffer.name(),
                    %category,
                    "Content sniffing unavailable, classifying upload as opaque binary"
                );
                Ok(OCTET_STREAM)
            }
            SniffFallback::FailClosed | SniffFallback::OpaqueBinary => {
                Err(MimeError::SniffingUnavailable { category })
            }
        }
    }
}

/// Classifies UTF-8 content without stray control characters as text
fn classify_text(content: &[u8]) -> Option<&'static str> {
    let text = std::str::from_utf8(content).ok()?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    if text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\x0c'))
    {
        return None;
    }

    if looks_like_csv(text) {
        Some(TEXT_CSV)
    } else {
        Some(TEXT_PLAIN)
    }
}

/// At least two sampled lines with the same non-zero comma count
fn looks_like_csv(text: &str) -> bool {
    let counts: Vec<usize> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(CSV_SAMPLE_LINES)
        .map(|line| line.matches(',').count())
        .collect();

    counts.len() >= 2 && counts[0] > 0 && counts.iter().all(|&count| count == counts[0])
}
