//! Per-category size ceilings

use super::policy::{CategoryPolicies, CategoryPolicy};
use super::types::Category;
use crate::error::SizeError;
use std::sync::Arc;

/// Rejects empty content and content over the category ceiling
#[derive(Debug, Clone, Default)]
pub struct SizeGuard {
    policies: Arc<CategoryPolicies>,
}

impl SizeGuard {
    /// Creates a guard sharing the given policy table
    #[must_use]
    pub const fn new(policies: Arc<CategoryPolicies>) -> Self {
        Self { policies }
    }

    /// Checks content length against the declared category
    ///
    /// # Errors
    ///
    /// Returns [`SizeError::EmptyFile`] for zero-length content and
    /// [`SizeError::TooLarge`] when the category ceiling is exceeded.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use acton_upload::upload::{Category, SizeGuard};
    ///
    /// let guard = SizeGuard::default();
    /// assert!(guard.check_size(b"hello", Category::Text).is_ok());
    /// assert!(guard.check_size(b"", Category::Text).is_err());
    /// ```
    pub fn check_size(&self, content: &[u8], category: Category) -> Result<(), SizeError> {
        check_against(content, self.policies.get(category))
    }

    /// Checks content length against a category given by name
    ///
    /// Unknown names fall back to the 1 MiB ceiling.
    ///
    /// # Errors
    ///
    /// Same as [`SizeGuard::check_size`].
    pub fn check_size_named(&self, content: &[u8], category: &str) -> Result<(), SizeError> {
        check_against(content, &self.policies.for_name(category))
    }
}

fn check_against(content: &[u8], policy: &CategoryPolicy) -> Result<(), SizeError> {
    if content.is_empty() {
        return Err(SizeError::EmptyFile);
    }

    let actual = content.len() as u64;
    let limit = policy.max_size_bytes();
    if actual > limit {
        return Err(SizeError::TooLarge { actual, limit });
    }

    Ok(())
}
