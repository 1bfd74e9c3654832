//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Tunables for the snapshot workflow, layered from defaults, configuration
/// files, and `IMPRINT_*` environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "IMPRINT",
    discovery(
        app_name = "imprint",
        env_var = "IMPRINT_CONFIG_PATH",
        config_file_name = "imprint.toml",
        dotfile_name = ".imprint.toml",
        project_file_name = "imprint.toml"
    )
)]
pub struct WorkflowConfig {
    /// Hard ceiling for a single run, in seconds.
    #[ortho_config(default = 840)]
    pub max_duration_secs: u64,
    /// Delay between polls of the image service, in seconds.
    #[ortho_config(default = 30)]
    pub check_interval_secs: u64,
    /// Minimum remaining budget, in seconds, before a cross-region copy is
    /// attempted.
    #[ortho_config(default = 120)]
    pub replication_min_remaining_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 840,
            check_interval_secs: 30,
            replication_min_remaining_secs: 120,
        }
    }
}

impl WorkflowConfig {
    /// Loads workflow configuration without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("imprint")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Maximum run duration.
    #[must_use]
    pub const fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    /// Poll cadence.
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Remaining budget at or below which replication is skipped.
    #[must_use]
    pub const fn replication_min_remaining(&self) -> Duration {
        Duration::from_secs(self.replication_min_remaining_secs)
    }

    /// Checks that the timings describe a usable budget.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a duration is zero or the poll
    /// interval does not fit inside the maximum duration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_duration_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "max_duration_secs must be greater than zero",
            )));
        }
        if self.check_interval_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "check_interval_secs must be greater than zero",
            )));
        }
        if self.check_interval_secs >= self.max_duration_secs {
            return Err(ConfigError::Invalid(format!(
                "check_interval_secs ({}) must be smaller than max_duration_secs ({})",
                self.check_interval_secs, self.max_duration_secs
            )));
        }
        Ok(())
    }
}

/// Scaleway specific configuration derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "SCW")]
pub struct ScalewayConfig {
    /// Access key assigned to the Scaleway application. Not needed for API
    /// calls; kept so it can be reported alongside provider errors.
    pub access_key: Option<String>,
    /// Secret key used for authentication. This value is required.
    pub secret_key: String,
    /// Organisation identifier used by some Scaleway endpoints.
    pub default_organization_id: Option<String>,
    /// Project identifier owning the images.
    pub default_project_id: String,
    /// Zone hosting the source instance. Defaults to `fr-par-1`.
    #[ortho_config(default = "fr-par-1".to_owned())]
    pub default_zone: String,
    /// Object Storage bucket used to move snapshots between zones. Copies are
    /// refused when unset.
    pub image_transfer_bucket: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }
}

impl ScalewayConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to [{}] in imprint.toml",
                metadata.description, metadata.env_var, metadata.toml_key, metadata.section
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("imprint")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns the transfer bucket when one is configured and non-blank.
    #[must_use]
    pub fn transfer_bucket(&self) -> Option<&str> {
        self.image_transfer_bucket
            .as_deref()
            .map(str::trim)
            .filter(|bucket| !bucket.is_empty())
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.secret_key,
            &FieldMetadata::new(
                "Scaleway API secret key",
                "SCW_SECRET_KEY",
                "secret_key",
                "scaleway",
            ),
        )?;
        Self::require_field(
            &self.default_project_id,
            &FieldMetadata::new(
                "Scaleway project ID",
                "SCW_DEFAULT_PROJECT_ID",
                "default_project_id",
                "scaleway",
            ),
        )?;
        Self::require_field(
            &self.default_zone,
            &FieldMetadata::new(
                "availability zone",
                "SCW_DEFAULT_ZONE",
                "default_zone",
                "scaleway",
            ),
        )?;
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
