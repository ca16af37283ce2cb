//! Configuration management for acton-upload
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `ACTON_` prefix, `__` for nesting)
//! 2. `./config.toml` (development)
//! 3. `~/.config/acton-upload/{service}/config.toml` (user config, XDG)
//! 4. `/etc/acton-upload/{service}/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! Environment variable format: `ACTON_SECTION__FIELD_NAME`
//! - Example: `ACTON_UPLOAD__OBFUSCATION_THRESHOLD=0.25`
//! - Example: `ACTON_STORAGE__DIRECTORY=/var/lib/uploads`
//!
//! Policies are read once at startup. Build an [`crate::upload::UploadValidator`]
//! from the loaded settings and share it; nothing here is reloaded at runtime.
//!
//! # Example Configuration
//!
//! ```toml
//! [upload]
//! obfuscation_threshold = 0.30
//! sniff_fallback = "fail_closed"
//! extra_dangerous_extensions = ["hta", "lnk"]
//!
//! [upload.categories.image]
//! max_size_bytes = 2097152
//! allowed_mime_types = ["image/png", "image/jpeg"]
//!
//! [storage]
//! directory = "/var/lib/my-app/uploads"
//! ```

use crate::upload::policy::CategoryPolicies;
use crate::upload::scanning::{is_valid_threshold, DEFAULT_OBFUSCATION_THRESHOLD};
use crate::upload::validation::SniffFallback;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Validation pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Allow-list and size ceiling per category
    pub categories: CategoryPolicies,

    /// Extensions rejected in addition to the built-in list
    pub extra_dangerous_extensions: Vec<String>,

    /// Share of unusual characters tolerated in text uploads, in `0.0..1.0`
    pub obfuscation_threshold: f64,

    /// Behavior when content sniffing is unavailable
    pub sniff_fallback: SniffFallback,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            categories: CategoryPolicies::default(),
            extra_dangerous_extensions: Vec::new(),
            obfuscation_threshold: DEFAULT_OBFUSCATION_THRESHOLD,
            sniff_fallback: SniffFallback::FailClosed,
        }
    }
}

impl UploadSettings {
    /// Checks values that deserialize cleanly but cannot be used
    ///
    /// # Errors
    ///
    /// Returns an error if `obfuscation_threshold` is NaN, infinite, or
    /// outside `0.0..1.0`.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            is_valid_threshold(self.obfuscation_threshold),
            "upload.obfuscation_threshold must be at least 0.0 and below 1.0, got {}",
            self.obfuscation_threshold
        );
        Ok(())
    }
}

/// Persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory accepted files are written to
    ///
    /// Created with mode `0700` if missing. An existing directory is never
    /// modified and must already be owner-only, so a shared directory such as
    /// `/tmp` is refused at write time.
    pub directory: PathBuf,

    /// Prefix of every stored filename
    pub filename_prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            directory: std::env::temp_dir().join("acton-upload"),
            filename_prefix: "secure".to_string(),
        }
    }
}

/// Complete acton-upload configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UploadConfig {
    /// Validation pipeline settings
    #[serde(default)]
    pub upload: UploadSettings,

    /// Persistence settings
    #[serde(default)]
    pub storage: StorageSettings,
}

impl UploadConfig {
    /// Load configuration for a specific service
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file contains invalid TOML
    /// - Values fail type conversion
    /// - `upload.obfuscation_threshold` is outside `0.0..1.0`
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use acton_upload::config::UploadConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = UploadConfig::load_for_service("my-app")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_for_service(service_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new()
            // 5. Start with defaults (lowest priority)
            .merge(Toml::string(&toml::to_string(&Self::default())?));

        // 4. System config: /etc/acton-upload/{service_name}/config.toml
        let system_config = PathBuf::from("/etc/acton-upload")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        // 3. User config: ~/.config/acton-upload/{service_name}/config.toml
        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        // 2. Local config: ./config.toml
        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        // 1. Environment variables (highest priority, double underscore for nesting)
        figment = figment.merge(Env::prefixed("ACTON_").split("__").lowercase(true));

        let config: Self = figment.extract()?;
        config.upload.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// # Errors
    ///
    /// Returns an error if the file contains invalid TOML, values fail type
    /// conversion, or `upload.obfuscation_threshold` is outside `0.0..1.0`.
    /// A missing file yields the defaults.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use acton_upload::config::UploadConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = UploadConfig::load_from("./config/production.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        let config: Self = Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path))
            .merge(Env::prefixed("ACTON_").split("__").lowercase(true))
            .extract()?;

        config.upload.validate()?;
        Ok(config)
    }

    /// Get the recommended XDG config path for a service
    ///
    /// # Example
    ///
    /// ```rust
    /// use acton_upload::config::UploadConfig;
    ///
    /// let path = UploadConfig::recommended_path("my-app");
    /// // Returns: ~/.config/acton-upload/my-app/config.toml
    /// ```
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./config.toml"),
            |config_dir| {
                config_dir
                    .join("acton-upload")
                    .join(service_name)
                    .join("config.toml")
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::types::Category;

    #[test]
    fn test_default_config() {
        let config = UploadConfig::default();
        assert!((config.upload.obfuscation_threshold - 0.30).abs() < f64::EPSILON);
        assert_eq!(config.upload.sniff_fallback, SniffFallback::FailClosed);
        assert!(config.upload.extra_dangerous_extensions.is_empty());
        assert_eq!(config.storage.filename_prefix, "secure");
    }

    #[test]
    fn test_defaults_survive_toml_round_trip() {
        let config = UploadConfig::default();
        let encoded = toml::to_string(&config).unwrap();
        let decoded: UploadConfig = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_load_from_overrides_selected_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[upload]
obfuscation_threshold = 0.5
sniff_fallback = "opaque_binary"
extra_dangerous_extensions = ["hta"]

[upload.categories.image]
max_size_bytes = 1024
allowed_mime_types = ["image/png"]

[storage]
directory = "/srv/uploads"
"#,
        )
        .unwrap();

        let config = UploadConfig::load_from(path.to_str().unwrap()).unwrap();

        assert!((config.upload.obfuscation_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.upload.sniff_fallback, SniffFallback::OpaqueBinary);
        assert_eq!(config.upload.extra_dangerous_extensions, vec!["hta"]);
        assert_eq!(config.upload.categories.get(Category::Image).max_size_bytes(), 1024);
        assert!(!config.upload.categories.get(Category::Image).allows("image/jpeg"));
        // Untouched categories keep their defaults
        assert_eq!(
            config.upload.categories.get(Category::Pdf),
            CategoryPolicies::default().get(Category::Pdf)
        );
        assert_eq!(config.storage.directory, PathBuf::from("/srv/uploads"));
        assert_eq!(config.storage.filename_prefix, "secure");
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = UploadConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.upload, UploadSettings::default());
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        for value in ["1.5", "1.0", "-0.2", "nan", "inf"] {
            let path = dir.path().join("config.toml");
            std::fs::write(&path, format!("[upload]\nobfuscation_threshold = {value}\n")).unwrap();

            let err = UploadConfig::load_from(path.to_str().unwrap()).unwrap_err();
            assert!(
                err.to_string().contains("obfuscation_threshold"),
                "{value}: {err}"
            );
        }
    }

    #[test]
    fn test_settings_validation() {
        assert!(UploadSettings::default().validate().is_ok());

        let settings = UploadSettings {
            obfuscation_threshold: f64::NAN,
            ..UploadSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_recommended_path_ends_with_service() {
        let path = UploadConfig::recommended_path("my-app");
        assert!(path.ends_with("config.toml"));
    }
}
