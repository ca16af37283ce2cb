//! The ordered validation pipeline
//!
//! Stages run strictly in order, cheapest first, and the first failure ends
//! the run:
//!
//! ```text
//! name -> size -> content type -> threat scan -> hash -> accepted
//! ```
//!
//! A submission yields exactly one of [`ValidationResult`] or
//! [`ValidationError`].

use super::filename::FilenameSanitizer;
use super::integrity::content_hash;
use super::policy::{CategoryPolicies, DangerousExtensions};
use super::scanning::ThreatScanner;
use super::size::SizeGuard;
use super::types::{FileSubmission, ValidationResult};
use super::validation::{ContentSniffer, ContentTypeValidator, SignatureSniffer, SniffFallback};
use crate::config::UploadSettings;
use crate::error::{UploadError, ValidationError};
use crate::storage::SecureFileWriter;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Validates untrusted uploads before anything is persisted
///
/// Cloning is cheap; policy tables are shared read-only between clones, so a
/// single validator built at startup can serve every request concurrently.
///
/// # Examples
///
/// ```rust
/// use acton_upload::upload::{Category, FileSubmission, UploadValidator};
///
/// let validator = UploadValidator::default();
///
/// let rejected = validator.validate(FileSubmission::new(
///     "../../etc/passwd",
///     Category::Text,
///     b"hello".to_vec(),
/// ));
/// assert_eq!(rejected.unwrap_err().code(), "filename.path_traversal");
///
/// let accepted = validator
///     .validate(FileSubmission::new("notes.txt", Category::Text, b"hello".to_vec()))
///     .unwrap();
/// assert_eq!(accepted.mime_type(), "text/plain");
/// assert_eq!(accepted.secure_filename(), "notes.txt");
/// ```
#[derive(Debug, Clone)]
pub struct UploadValidator {
    filenames: FilenameSanitizer,
    sizes: SizeGuard,
    content_types: ContentTypeValidator,
    threats: ThreatScanner,
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::from_settings(&UploadSettings::default())
    }
}

impl UploadValidator {
    /// Assembles a validator from its configuration tables
    #[must_use]
    pub fn new(
        policies: CategoryPolicies,
        dangerous_extensions: DangerousExtensions,
        threats: ThreatScanner,
        fallback: SniffFallback,
    ) -> Self {
        let policies = Arc::new(policies);
        Self {
            filenames: FilenameSanitizer::new(Arc::new(dangerous_extensions)),
            sizes: SizeGuard::new(Arc::clone(&policies)),
            content_types: ContentTypeValidator::new(
                Arc::new(SignatureSniffer::new()),
                policies,
                fallback,
            ),
            threats,
        }
    }

    /// Builds a validator from loaded configuration
    ///
    /// Settings that skipped [`UploadSettings::validate`] still fail closed: an
    /// unusable obfuscation threshold rejects every text upload.
    #[must_use]
    pub fn from_settings(settings: &UploadSettings) -> Self {
        Self::new(
            settings.categories.clone(),
            DangerousExtensions::with_extra(&settings.extra_dangerous_extensions),
            ThreatScanner::new(settings.obfuscation_threshold),
            settings.sniff_fallback,
        )
    }

    /// Replaces the content inspection backend
    #[must_use]
    pub fn with_sniffer(mut self, sniffer: Arc<dyn ContentSniffer>) -> Self {
        self.content_types = self.content_types.with_sniffer(sniffer);
        self
    }

    /// Runs every stage against a submission
    ///
    /// Accepted content is handed back unchanged inside the result.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] of the first stage that fails; no later
    /// stage runs.
    pub fn validate(&self, submission: FileSubmission) -> Result<ValidationResult, ValidationError> {
        let category = submission.declared_category;
        let size = submission.size();

        self.run(submission).inspect_err(|err| {
            warn!(
                stage = err.stage(),
                code = err.code(),
                %category,
                size,
                "Upload rejected"
            );
        })
    }

    fn run(&self, submission: FileSubmission) -> Result<ValidationResult, ValidationError> {
        let FileSubmission {
            original_filename,
            declared_category: category,
            content,
        } = submission;

        let secure_filename = self.filenames.sanitize(&original_filename)?;
        self.sizes.check_size(&content, category)?;
        let mime_type = self.content_types.sniff(&content, category)?;
        self.threats.scan(&content, category)?;
        let hash = content_hash(&content);

        debug!(
            %category,
            mime_type,
            hash = &hash[..16],
            size = content.len(),
            "Upload accepted"
        );

        Ok(ValidationResult::accepted(
            original_filename,
            secure_filename,
            mime_type.to_string(),
            hash,
            content,
        ))
    }

    /// Validates a submission and stores it when accepted
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Validation`] if any stage rejects the
    /// submission, in which case nothing is written, and
    /// [`UploadError::Storage`] if the accepted file cannot be stored.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use acton_upload::storage::SecureFileWriter;
    /// use acton_upload::upload::{Category, FileSubmission, UploadValidator};
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let validator = UploadValidator::default();
    /// let writer = SecureFileWriter::new("/var/lib/my-app/uploads");
    ///
    /// let submission = FileSubmission::new("report.csv", Category::Csv, b"a,b\n1,2\n".to_vec());
    /// let (result, path) = validator.validate_and_persist(submission, &writer).await?;
    /// println!("{} stored at {}", result.content_hash(), path.display());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn validate_and_persist(
        &self,
        submission: FileSubmission,
        writer: &SecureFileWriter,
    ) -> Result<(ValidationResult, PathBuf), UploadError> {
        let result = self.validate(submission)?;
        let path = writer.persist(&result).await?;
        Ok((result, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FilenameError, MimeError, SizeError, ThreatError};
    use crate::upload::types::Category;
    use crate::upload::validation::{MockContentSniffer, Sniffed};

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn png_bytes() -> Vec<u8> {
        let mut content = PNG_HEADER.to_vec();
        content.extend(std::iter::repeat_n(0x42, 256));
        content
    }

    /// Sniffer that panics if consulted
    fn untouchable_sniffer() -> Arc<MockContentSniffer> {
        let mut sniffer = MockContentSniffer::new();
        sniffer.expect_sniff().never();
        sniffer.expect_name().return_const("untouchable");
        Arc::new(sniffer)
    }

    #[test]
    fn test_accepts_png() {
        let validator = UploadValidator::default();
        let result = validator
            .validate(FileSubmission::new("photo.png", Category::Image, png_bytes()))
            .unwrap();

        assert!(result.is_accepted());
        assert_eq!(result.mime_type(), "image/png");
        assert_eq!(result.secure_filename(), "photo.png");
        assert_eq!(result.original_filename(), "photo.png");
        assert_eq!(result.size_bytes(), 264);
        assert_eq!(result.content_hash(), content_hash(&png_bytes()));
        assert_eq!(result.content(), png_bytes().as_slice());
    }

    #[test]
    fn test_filename_failure_skips_later_stages() {
        let validator = UploadValidator::default().with_sniffer(untouchable_sniffer());
        let err = validator
            .validate(FileSubmission::new("../../etc/passwd", Category::Text, Vec::new()))
            .unwrap_err();
        assert_eq!(err, ValidationError::Filename(FilenameError::PathTraversal));
    }

    #[test]
    fn test_size_failure_skips_sniffing() {
        let validator = UploadValidator::default().with_sniffer(untouchable_sniffer());
        let err = validator
            .validate(FileSubmission::new("empty.txt", Category::Text, Vec::new()))
            .unwrap_err();
        assert_eq!(err, ValidationError::Size(SizeError::EmptyFile));
    }

    #[test]
    fn test_mime_failure_precedes_threat_scan() {
        // PNG bytes are not UTF-8, so a threat scan would report NonTextPayload
        let validator = UploadValidator::default();
        let err = validator
            .validate(FileSubmission::new("data.csv", Category::Csv, png_bytes()))
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Mime(MimeError::DisallowedType { ref mime_type, category: Category::Csv })
                if mime_type == "image/png"
        ));
    }

    #[test]
    fn test_threat_stage_runs_last() {
        let validator = UploadValidator::default();
        let err = validator
            .validate(FileSubmission::new(
                "data.csv",
                Category::Csv,
                b"<script>alert(1)</script>".to_vec(),
            ))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::Threat(ThreatError::SuspiciousPattern("<script".to_string()))
        );
    }

    #[test]
    fn test_degraded_sniffer_fails_closed_by_default() {
        let mut sniffer = MockContentSniffer::new();
        sniffer.expect_sniff().returning(|_| Sniffed::Unavailable);
        sniffer.expect_name().return_const("mock");

        let validator = UploadValidator::default().with_sniffer(Arc::new(sniffer));
        let err = validator
            .validate(FileSubmission::new("photo.png", Category::Image, png_bytes()))
            .unwrap_err();
        assert_eq!(err.code(), "mime.sniffing_unavailable");
    }

    #[test]
    fn test_extra_dangerous_extensions_from_settings() {
        let settings = UploadSettings {
            extra_dangerous_extensions: vec!["hta".to_string()],
            ..UploadSettings::default()
        };
        let validator = UploadValidator::from_settings(&settings);
        let err = validator
            .validate(FileSubmission::new("invoice.hta", Category::Text, b"hi".to_vec()))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::Filename(FilenameError::DisallowedExtension("hta".to_string()))
        );
    }

    #[test]
    fn test_nan_threshold_from_settings_fails_closed() {
        let settings = UploadSettings {
            obfuscation_threshold: f64::NAN,
            ..UploadSettings::default()
        };
        let validator = UploadValidator::from_settings(&settings);
        let err = validator
            .validate(FileSubmission::new(
                "notes.txt",
                Category::Text,
                b"!@#$%^&*()_+{}|:<>?~".to_vec(),
            ))
            .unwrap_err();
        assert_eq!(err.code(), "threat.obfuscation_suspected");
    }

    #[test]
    fn test_invalid_utf8_text_stops_at_mime_stage() {
        let validator = UploadValidator::default();
        let err = validator
            .validate(FileSubmission::new(
                "notes.txt",
                Category::Text,
                vec![0x66, 0x6F, 0xFF, 0xFE],
            ))
            .unwrap_err();
        assert_eq!(err, ValidationError::Mime(MimeError::UndeterminedType));
        assert_eq!(err.code(), "mime.undetermined");
    }

    #[test]
    fn test_validation_is_idempotent() {
        let validator = UploadValidator::default();
        let submit = || FileSubmission::new("table.csv", Category::Csv, b"a,b\n1,2\n3,4\n".to_vec());

        let first = validator.validate(submit()).unwrap();
        let second = validator.validate(submit()).unwrap();

        assert_eq!(first.content_hash(), second.content_hash());
        assert_eq!(first.mime_type(), second.mime_type());
        assert_eq!(first.mime_type(), "text/csv");
    }

    #[tokio::test]
    async fn test_validate_and_persist_writes_nothing_on_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SecureFileWriter::new(dir.path().join("uploads"));

        let result = UploadValidator::default()
            .validate_and_persist(
                FileSubmission::new("malware.exe", Category::Csv, b"a,b".to_vec()),
                &writer,
            )
            .await;

        assert!(matches!(result, Err(UploadError::Validation(_))));
        assert!(!dir.path().join("uploads").exists());
    }

    #[tokio::test]
    async fn test_validate_and_persist_stores_accepted_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SecureFileWriter::new(dir.path().join("accepted"));

        let (result, path) = UploadValidator::default()
            .validate_and_persist(
                FileSubmission::new("photo.png", Category::Image, png_bytes()),
                &writer,
            )
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), result.content());
    }
}
