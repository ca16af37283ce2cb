//! Upload validation
//!
//! Untrusted bytes and their claimed filename pass through a fixed sequence
//! of guards before anything is stored:
//!
//! - [`FilenameSanitizer`]: safe storage name, dangerous extension and
//!   traversal rejection
//! - [`SizeGuard`]: per-category size ceilings
//! - [`ContentTypeValidator`]: MIME type from the bytes, checked against the
//!   category allow-list
//! - [`ThreatScanner`]: injection markers and obfuscation in text uploads
//! - [`content_hash`]: SHA-256 digest for auditing and storage naming
//!
//! [`UploadValidator`] composes them and stops at the first failure.
//!
//! # Examples
//!
//! ```rust
//! use acton_upload::upload::{Category, FileSubmission, UploadValidator};
//!
//! let validator = UploadValidator::default();
//! let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D];
//!
//! let result = validator
//!     .validate(FileSubmission::new("photo.png", Category::Image, png.to_vec()))
//!     .unwrap();
//! assert_eq!(result.mime_type(), "image/png");
//! assert_eq!(result.content_hash().len(), 64);
//! ```

pub mod filename;
pub mod integrity;
pub mod pipeline;
pub mod policy;
pub mod scanning;
pub mod size;
pub mod types;
pub mod validation;

pub use filename::{FilenameSanitizer, MAX_FILENAME_LENGTH};
pub use integrity::content_hash;
pub use pipeline::UploadValidator;
pub use policy::{CategoryPolicies, CategoryPolicy, DangerousExtensions};
pub use scanning::ThreatScanner;
pub use size::SizeGuard;
pub use types::{Category, FileSubmission, UnknownCategory, ValidationResult};
pub use validation::{
    ContentSniffer, ContentTypeValidator, SignatureSniffer, SniffFallback, Sniffed,
    UnavailableSniffer,
};
