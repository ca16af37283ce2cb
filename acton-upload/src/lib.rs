//! acton-upload: Defense-in-depth validation for untrusted file uploads
//!
//! Every upload passes a fixed sequence of independent guards before it is
//! stored or trusted anywhere else:
//!
//! 1. **Filename**: normalized to a safe storage name; traversal sequences and
//!    executable or script extensions are rejected
//! 2. **Size**: per-category ceilings, empty files rejected
//! 3. **Content type**: MIME type determined from the bytes and checked
//!    against the category allow-list; the filename and client headers are
//!    never trusted
//! 4. **Threat scan**: text uploads are checked for injection markers and
//!    obfuscated content
//! 5. **Integrity**: SHA-256 digest for auditing and content-addressed storage
//!
//! The first failing stage ends the run. Accepted files can then be written
//! with owner-only permissions by [`storage::SecureFileWriter`].
//!
//! Validation is structural and heuristic. It does not match malware
//! signatures, sandbox content, or consult virus databases.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use acton_upload::prelude::*;
//! use axum::{extract::DefaultBodyLimit, routing::post, Router};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     acton_upload::observability::init()?;
//!
//!     let config = UploadConfig::load_for_service("my-app")?;
//!     let validator = Arc::new(UploadValidator::from_settings(&config.upload));
//!
//!     let guard = UploadGuard::new(validator, Category::Image).with_field("avatar");
//!     let app = Router::new()
//!         .route("/avatar", post(require_secure_upload(guard, save_avatar)))
//!         .layer(DefaultBodyLimit::max(6 * 1024 * 1024));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//!
//! async fn save_avatar(file: ValidationResult) -> String {
//!     format!("{} accepted as {}", file.secure_filename(), file.mime_type())
//! }
//! ```

// Lint configuration is handled at the workspace level in Cargo.toml

pub mod config;
pub mod error;
pub mod extractors;
pub mod observability;
pub mod storage;
pub mod upload;

pub mod prelude {
    //! Convenience re-exports for common types
    //!
    //! # Examples
    //!
    //! ```rust
    //! use acton_upload::prelude::*;
    //! ```

    pub use crate::config::UploadConfig;
    pub use crate::error::{UploadError, ValidationError};
    pub use crate::extractors::{require_secure_upload, UploadGuard, UploadRejection};
    pub use crate::storage::{SecureFileWriter, StorageError};
    pub use crate::upload::{
        content_hash, Category, FileSubmission, SniffFallback, UploadValidator, ValidationResult,
    };
}
