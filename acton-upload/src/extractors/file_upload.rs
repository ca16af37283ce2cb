//! Upload guard for axum handlers
//!
//! [`require_secure_upload`] wraps a handler so that it only ever sees a
//! [`ValidationResult`]. The guard pulls the named multipart field, runs the
//! validation pipeline, and answers `400 Bad Request` with a JSON body on any
//! failure without calling the handler:
//!
//! ```json
//! {"status": "error", "code": "filename.disallowed_extension", "message": "File type 'exe' not allowed"}
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use acton_upload::extractors::{require_secure_upload, UploadGuard};
//! use acton_upload::upload::{Category, UploadValidator, ValidationResult};
//! use axum::{extract::DefaultBodyLimit, routing::post, Router};
//! use std::sync::Arc;
//!
//! async fn import_csv(file: ValidationResult) -> String {
//!     format!("Imported {} ({} bytes)", file.secure_filename(), file.size_bytes())
//! }
//!
//! let validator = Arc::new(UploadValidator::default());
//! let guard = UploadGuard::new(validator, Category::Csv).with_field("document");
//!
//! let app: Router = Router::new()
//!     .route("/import", post(require_secure_upload(guard, import_csv)))
//!     // axum caps request bodies at 2 MiB unless told otherwise
//!     .layer(DefaultBodyLimit::max(11 * 1024 * 1024));
//! ```

use crate::error::ValidationError;
use crate::upload::{Category, FileSubmission, UploadValidator, ValidationResult};
use axum::{
    extract::{multipart::MultipartRejection, Multipart},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Multipart field read when none is configured
pub const DEFAULT_FIELD: &str = "file";

/// Message sent for failures whose detail stays server-side
pub const GENERIC_FAILURE_MESSAGE: &str = "File validation failed";

/// Why a guarded request never reached its handler
#[derive(Debug, Error)]
pub enum UploadRejection {
    /// The configured field is absent from the form
    #[error("No file provided in '{0}' field")]
    MissingFile(String),

    /// The field is present but carries no filename
    #[error("No file selected")]
    NoFileSelected,

    /// The request body could not be read as multipart form data
    #[error("File validation failed")]
    Multipart(String),

    /// The pipeline rejected the file
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl UploadRejection {
    /// Machine-readable reason code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingFile(_) => "upload.missing_file",
            Self::NoFileSelected => "upload.no_file_selected",
            Self::Multipart(_) => "upload.malformed",
            Self::Invalid(err) => err.code(),
        }
    }
}

impl IntoResponse for UploadRejection {
    fn into_response(self) -> Response {
        if let Self::Multipart(detail) = &self {
            warn!(error = %detail, "Unreadable upload request");
        }

        let body = json!({
            "status": "error",
            "code": self.code(),
            "message": self.to_string(),
        });

        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Validates the file in one multipart field against one category
#[derive(Debug, Clone)]
pub struct UploadGuard {
    validator: Arc<UploadValidator>,
    category: Category,
    field: String,
}

impl UploadGuard {
    /// Creates a guard reading the `file` field
    #[must_use]
    pub fn new(validator: Arc<UploadValidator>, category: Category) -> Self {
        Self {
            validator,
            category,
            field: DEFAULT_FIELD.to_string(),
        }
    }

    /// Reads a different multipart field
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Category files are validated against
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Name of the multipart field holding the file
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Reads the configured field and runs the pipeline on it
    ///
    /// Other fields are skipped. The first field with the configured name
    /// is used.
    ///
    /// # Errors
    ///
    /// - [`UploadRejection::Multipart`] if the body cannot be read
    /// - [`UploadRejection::MissingFile`] if the field is absent
    /// - [`UploadRejection::NoFileSelected`] if it has no filename
    /// - [`UploadRejection::Invalid`] if validation fails
    pub async fn check(&self, mut multipart: Multipart) -> Result<ValidationResult, UploadRejection> {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| UploadRejection::Multipart(e.body_text()))?
        {
            if field.name() != Some(self.field.as_str()) {
                continue;
            }

            let filename = match field.file_name() {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => return Err(UploadRejection::NoFileSelected),
            };

            let content = field
                .bytes()
                .await
                .map_err(|e| UploadRejection::Multipart(e.body_text()))?;

            let submission = FileSubmission::new(filename, self.category, content.to_vec());
            return Ok(self.validator.validate(submission)?);
        }

        Err(UploadRejection::MissingFile(self.field.clone()))
    }
}

/// Boxed response future returned by a guarded handler
pub type GuardedFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Wraps `handler` so it only runs for uploads that pass validation
///
/// The returned closure is an axum handler taking the multipart body. The
/// wrapped handler receives the accepted [`ValidationResult`]; every
/// rejection is answered by [`UploadRejection`].
pub fn require_secure_upload<H, Fut, R>(
    guard: UploadGuard,
    handler: H,
) -> impl Fn(Result<Multipart, MultipartRejection>) -> GuardedFuture + Clone + Send + Sync + 'static
where
    H: Fn(ValidationResult) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    move |multipart: Result<Multipart, MultipartRejection>| -> GuardedFuture {
        let guard = guard.clone();
        let handler = handler.clone();

        Box::pin(async move {
            let multipart = match multipart {
                Ok(multipart) => multipart,
                Err(rejection) => {
                    return UploadRejection::Multipart(rejection.body_text()).into_response();
                }
            };

            match guard.check(multipart).await {
                Ok(result) => handler(result).await.into_response(),
                Err(rejection) => rejection.into_response(),
            }
        })
    }
}
