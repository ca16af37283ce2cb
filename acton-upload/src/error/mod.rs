//! Error types for the upload validation pipeline
//!
//! Each pipeline stage reports failure through its own error enum. The
//! [`ValidationError`] wraps whichever stage failed first; it is the only
//! error the orchestrator ever returns. Persistence failures live in
//! [`crate::storage::StorageError`] and are never folded into this type.
//!
//! Messages may echo an offending extension, marker, or MIME type but never
//! the file content itself.

use crate::storage::StorageError;
use crate::upload::types::Category;
use thiserror::Error;

/// Filename stage failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilenameError {
    /// Filename was empty, or nothing survived normalization
    #[error("Filename is required")]
    EmptyName,

    /// Normalized filename is longer than the filesystem limit
    #[error("Filename too long: {length} characters exceeds limit of {max}")]
    NameTooLong {
        /// Length of the normalized name
        length: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Extension is on the dangerous extension list
    #[error("File type '{0}' not allowed")]
    DisallowedExtension(String),

    /// Filename contains a directory traversal sequence
    #[error("Invalid characters in filename")]
    PathTraversal,
}

/// Size stage failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeError {
    /// Content is zero bytes long
    #[error("File is empty")]
    EmptyFile,

    /// Content exceeds the category ceiling
    #[error("File size {actual} exceeds limit of {limit} bytes")]
    TooLarge {
        /// Actual content length
        actual: u64,
        /// Ceiling for the declared category
        limit: u64,
    },
}

/// Content-type stage failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MimeError {
    /// No content signature matched
    #[error("Could not determine file type")]
    UndeterminedType,

    /// Detected type is not on the category allow-list
    #[error("File type '{mime_type}' not allowed for {category} files")]
    DisallowedType {
        /// Type detected from content
        mime_type: String,
        /// Declared category
        category: Category,
    },

    /// Content inspection is unavailable and the fallback policy refused
    #[error("File type cannot be verified for {category} files")]
    SniffingUnavailable {
        /// Declared category
        category: Category,
    },
}

/// Threat scan stage failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThreatError {
    /// Declared text file does not decode as UTF-8
    #[error("File contains non-text data")]
    NonTextPayload,

    /// An injection marker was found
    #[error("Potentially malicious content detected: {0}")]
    SuspiciousPattern(String),

    /// Too many unusual characters for ordinary text
    #[error("File contains suspicious character patterns")]
    ObfuscationSuspected {
        /// Observed ratio of unusual characters
        ratio: f64,
        /// Configured threshold that was exceeded
        threshold: f64,
    },
}

/// Terminal outcome of a rejected submission
///
/// Exactly one stage error is carried. The pipeline stops at the first
/// failure, so later stages never contribute.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Filename stage rejected the submission
    #[error(transparent)]
    Filename(#[from] FilenameError),

    /// Size stage rejected the submission
    #[error(transparent)]
    Size(#[from] SizeError),

    /// Content-type stage rejected the submission
    #[error(transparent)]
    Mime(#[from] MimeError),

    /// Threat scan rejected the submission
    #[error(transparent)]
    Threat(#[from] ThreatError),
}

impl ValidationError {
    /// Machine-readable reason code in `stage.reason` form
    ///
    /// # Examples
    ///
    /// ```rust
    /// use acton_upload::error::{FilenameError, ValidationError};
    ///
    /// let err = ValidationError::from(FilenameError::PathTraversal);
    /// assert_eq!(err.code(), "filename.path_traversal");
    /// ```
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Filename(e) => match e {
                FilenameError::EmptyName => "filename.empty",
                FilenameError::NameTooLong { .. } => "filename.too_long",
                FilenameError::DisallowedExtension(_) => "filename.disallowed_extension",
                FilenameError::PathTraversal => "filename.path_traversal",
            },
            Self::Size(e) => match e {
                SizeError::EmptyFile => "size.empty_file",
                SizeError::TooLarge { .. } => "size.too_large",
            },
            Self::Mime(e) => match e {
                MimeError::UndeterminedType => "mime.undetermined",
                MimeError::DisallowedType { .. } => "mime.disallowed_type",
                MimeError::SniffingUnavailable { .. } => "mime.sniffing_unavailable",
            },
            Self::Threat(e) => match e {
                ThreatError::NonTextPayload => "threat.non_text_payload",
                ThreatError::SuspiciousPattern(_) => "threat.suspicious_pattern",
                ThreatError::ObfuscationSuspected { .. } => "threat.obfuscation_suspected",
            },
        }
    }

    /// Name of the pipeline stage that failed
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Filename(_) => "filename",
            Self::Size(_) => "size",
            Self::Mime(_) => "mime",
            Self::Threat(_) => "threat",
        }
    }
}

/// Failure of validate-then-persist
///
/// A rejection maps to a client error, a storage failure to a server error.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The submission was rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The accepted file could not be stored
    #[error(transparent)]
    Storage(#[from] StorageError),
}
