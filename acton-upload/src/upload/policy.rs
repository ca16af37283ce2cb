//! Category policies and the dangerous extension set
//!
//! Both tables are built once at startup (usually from [`crate::config`]) and
//! then shared read-only behind an `Arc` by every validator. Nothing in this
//! module offers mutation after construction.
//!
//! # Examples
//!
//! ```rust
//! use acton_upload::upload::{Category, CategoryPolicies};
//!
//! let policies = CategoryPolicies::default();
//! let csv = policies.get(Category::Csv);
//!
//! assert_eq!(csv.max_size_bytes(), 10 * 1024 * 1024);
//! assert!(csv.allows("text/csv"));
//! assert!(!csv.allows("image/png"));
//! ```

use super::types::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const MIB: u64 = 1024 * 1024;

/// Ceiling applied to a category name that does not parse
pub const FALLBACK_MAX_SIZE_BYTES: u64 = MIB;

/// Built-in dangerous extensions, rejected for every category
pub const DEFAULT_DANGEROUS_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "pif", "scr", "vbs", "js", "jar", "php", "asp", "aspx", "jsp",
    "py", "pl", "sh", "ps1", "dll", "so", "dylib", "app", "deb", "rpm", "dmg", "iso", "msi",
];

/// Allow-list and size ceiling for one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPolicy {
    /// MIME types accepted after content sniffing
    pub allowed_mime_types: BTreeSet<String>,

    /// Maximum content length in bytes
    pub max_size_bytes: u64,
}

impl CategoryPolicy {
    /// Creates a policy from a size ceiling and allowed MIME types
    ///
    /// # Examples
    ///
    /// ```rust
    /// use acton_upload::upload::CategoryPolicy;
    ///
    /// let policy = CategoryPolicy::new(1024, ["image/png"]);
    /// assert!(policy.allows("image/png"));
    /// ```
    #[must_use]
    pub fn new<I, S>(max_size_bytes: u64, allowed_mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_mime_types: allowed_mime_types.into_iter().map(Into::into).collect(),
            max_size_bytes,
        }
    }

    /// Policy for an unrecognized category: 1 MiB and nothing allowed
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            allowed_mime_types: BTreeSet::new(),
            max_size_bytes: FALLBACK_MAX_SIZE_BYTES,
        }
    }

    /// Returns the size ceiling in bytes
    #[must_use]
    pub const fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Checks whether a detected MIME type is on the allow-list
    #[must_use]
    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.contains(mime_type)
    }
}

/// One policy per category
///
/// Each category is a named field, so a missing or duplicate entry cannot be
/// represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryPolicies {
    /// Policy for CSV uploads
    pub csv: CategoryPolicy,
    /// Policy for plain text uploads
    pub text: CategoryPolicy,
    /// Policy for image uploads
    pub image: CategoryPolicy,
    /// Policy for PDF uploads
    pub pdf: CategoryPolicy,
}

impl Default for CategoryPolicies {
    fn default() -> Self {
        Self {
            csv: CategoryPolicy::new(10 * MIB, ["text/csv", "text/plain", "application/csv"]),
            text: CategoryPolicy::new(5 * MIB, ["text/plain", "text/csv", "application/csv"]),
            image: CategoryPolicy::new(
                5 * MIB,
                ["image/jpeg", "image/png", "image/gif", "image/webp"],
            ),
            pdf: CategoryPolicy::new(20 * MIB, ["application/pdf"]),
        }
    }
}

impl CategoryPolicies {
    /// Returns the policy for a category
    #[must_use]
    pub const fn get(&self, category: Category) -> &CategoryPolicy {
        match category {
            Category::Csv => &self.csv,
            Category::Text => &self.text,
            Category::Image => &self.image,
            Category::Pdf => &self.pdf,
        }
    }

    /// Returns the policy for a category name, or the fallback policy
    ///
    /// Unknown names are capped at 1 MiB and allow no MIME types, so they can
    /// never pass the content-type stage.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use acton_upload::upload::{CategoryPolicies, CategoryPolicy};
    ///
    /// let policies = CategoryPolicies::default();
    /// assert_eq!(policies.for_name("spreadsheet"), CategoryPolicy::fallback());
    /// ```
    #[must_use]
    pub fn for_name(&self, name: &str) -> CategoryPolicy {
        name.parse::<Category>()
            .map_or_else(|_| CategoryPolicy::fallback(), |c| self.get(c).clone())
    }
}

/// Lowercase extensions rejected regardless of declared category
///
/// Always contains the built-in list; configuration can only add to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DangerousExtensions(BTreeSet<String>);

impl Default for DangerousExtensions {
    fn default() -> Self {
        Self(
            DEFAULT_DANGEROUS_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
        )
    }
}

impl DangerousExtensions {
    /// Built-in set plus additional extensions
    ///
    /// Extras are lowercased and stripped of a leading dot.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use acton_upload::upload::DangerousExtensions;
    ///
    /// let set = DangerousExtensions::with_extra([".HTA", "lnk"]);
    /// assert!(set.contains("hta"));
    /// assert!(set.contains("EXE"));
    /// ```
    #[must_use]
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        set.0.extend(
            extra
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty()),
        );
        set
    }

    /// Case-insensitive membership check
    #[must_use]
    pub fn contains(&self, extension: &str) -> bool {
        self.0.contains(&extension.to_ascii_lowercase())
    }

    /// Number of extensions in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty; false for any constructed set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
