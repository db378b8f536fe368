//! Configuration Loader
//!
//! Environment-aware loading built on the `config` crate. Sources are merged in order,
//! later sources winning:
//!
//! 1. Struct defaults
//! 2. `POINT_RECOVERY_CONFIG_PATH` (default `config/point_recovery.toml`, optional)
//! 3. `config/point_recovery.<environment>.toml` next to the base file (optional)
//! 4. `POINT_RECOVERY__<SECTION>__<FIELD>` environment variables

use super::error::{ConfigResult, ConfigurationError};
use super::RecoveryConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_PATH_VAR: &str = "POINT_RECOVERY_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/point_recovery.toml";
const ENV_PREFIX: &str = "POINT_RECOVERY";

/// Zero-state utility for loading [`RecoveryConfig`]
#[derive(Debug)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<RecoveryConfig> {
        let path = env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .ok();
        let explicit = path.is_some();
        let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        if explicit && !path.is_file() {
            return Err(ConfigurationError::ConfigFileNotFound { path });
        }

        Self::load_from_path(&path, &crate::logging::get_environment())
    }

    /// Load configuration from a specific base file with explicit environment.
    /// Missing files are skipped; environment variables are always applied.
    pub fn load_from_path(path: &Path, environment: &str) -> ConfigResult<RecoveryConfig> {
        let overlay = Self::environment_overlay_path(path, environment);

        debug!(
            base = %path.display(),
            overlay = %overlay.display(),
            environment = %environment,
            "Loading recovery configuration"
        );

        let merged = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(File::from(overlay.as_path()).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(path.display().to_string(), e))?;

        let config: RecoveryConfig = merged
            .try_deserialize()
            .map_err(ConfigurationError::deserialize_error)?;

        config.validate()?;

        info!(
            environment = %environment,
            topic = %config.consumer.topic,
            consumer_group = %config.consumer.consumer_group,
            base_url = %config.http.base_url,
            "✅ Configuration loaded successfully"
        );
        debug!(
            "Configuration: {}",
            serde_json::to_string_pretty(&config.sanitized())
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(config)
    }

    /// `config/point_recovery.toml` + `production` → `config/point_recovery.production.toml`
    fn environment_overlay_path(path: &Path, environment: &str) -> PathBuf {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("point_recovery");
        path.with_file_name(format!("{stem}.{environment}.toml"))
    }
}
