//! Configuration Loader
//!
//! Environment-aware loading built on the `config` crate. Layers, lowest
//! precedence first:
//!
//! 1. Built-in defaults ([`ResilienceConfig::default`])
//! 2. `{config_dir}/resilience.toml` (optional)
//! 3. `{config_dir}/resilience.{environment}.toml` (optional)
//! 4. Environment variables such as `TASKER_RESILIENCE__RETRY__MAX_ATTEMPTS=5`
//!
//! The merged result is validated before it is handed out.

use super::error::ConfigResult;
use super::ResilienceConfig;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "TASKER_RESILIENCE";

/// Separator between nested keys in environment variable overrides
pub const ENV_SEPARATOR: &str = "__";

/// Base name of the configuration files
pub const CONFIG_FILE_STEM: &str = "resilience";

/// Loaded configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: ResilienceConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(config_dir, environment, None)
    }

    /// Like [`Self::load_from_directory_with_env`], but environment overrides
    /// are read from `variables` instead of the process environment.
    ///
    /// Lets tests exercise the override layer without mutating global state.
    pub fn load_with_env_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        variables: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(config_dir, environment, Some(variables))
    }

    fn build(
        config_dir: Option<PathBuf>,
        environment: &str,
        variables: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = environment,
            config_directory = %config_directory.display(),
            "Loading resilience configuration"
        );

        let base_path = Self::config_file_path(&config_directory, None);
        let environment_path = Self::config_file_path(&config_directory, Some(environment));

        let environment_source = Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(variables);

        let config: ResilienceConfig = Config::builder()
            .add_source(Config::try_from(&ResilienceConfig::default())?)
            .add_source(
                File::from(base_path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                File::from(environment_path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(environment_source)
            .build()?
            .try_deserialize()?;

        config.validate()?;

        info!(
            environment = environment,
            base_file_present = base_path.exists(),
            environment_file_present = environment_path.exists(),
            "✅ Resilience configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Detect the current environment from the usual variables
    pub fn detect_environment() -> String {
        env::var("TASKER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// `TASKER_CONFIG_DIR` when set, otherwise `./config`
    fn default_config_directory() -> PathBuf {
        env::var("TASKER_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn config_file_path(config_directory: &Path, environment: Option<&str>) -> PathBuf {
        match environment {
            Some(environment) => {
                config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}.toml"))
            }
            None => config_directory.join(format!("{CONFIG_FILE_STEM}.toml")),
        }
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }
}
