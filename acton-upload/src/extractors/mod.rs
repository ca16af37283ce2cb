//! Request-side integration with axum
//!
//! See [`file_upload`] for the upload guard.

pub mod file_upload;

pub use file_upload::{
    require_secure_upload, GuardedFuture, UploadGuard, UploadRejection, DEFAULT_FIELD,
    GENERIC_FAILURE_MESSAGE,
};
