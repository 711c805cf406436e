use std::{
    io,
    path::{Path, PathBuf},
};

use config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files relative to the application root.
const CONFIGURATION_DIR: &str = "configuration";

/// Supported extensions for base and environment configuration files.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// The `configuration` directory does not exist.
    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    /// Could not locate one of the required configuration files.
    #[error("could not locate `{stem}.{{yaml,yml,json}}` in `{directory}`")]
    ConfigurationFileMissing { stem: String, directory: PathBuf },

    /// The environment name is not one of the supported values.
    #[error("failed to detect the runtime environment: {0}")]
    Environment(#[source] io::Error),

    /// The configuration backend rejected the assembled sources.
    #[error("failed to build or deserialize the configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// Loads the application configuration for the current environment.
///
/// Layers, later sources overriding earlier ones:
/// 1. `configuration/base.{yaml,yml,json}`
/// 2. `configuration/{environment}.{yaml,yml,json}` (`dev` or `prod`, from
///    `APP_ENVIRONMENT`)
/// 3. `APP`-prefixed environment variables, with `__` separating nested keys (for
///    example `APP__STORE__URL` overrides `store.url`)
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let directory = std::env::current_dir()
        .map_err(LoadConfigError::CurrentDir)?
        .join(CONFIGURATION_DIR);
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(directory));
    }

    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    let mut builder: ConfigBuilder<DefaultState> = config::Config::builder();
    builder = builder.add_source(config::File::from(locate_file(&directory, "base")?));
    builder = builder.add_source(config::File::from(locate_file(
        &directory,
        environment.as_str(),
    )?));
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_PREFIX_SEPARATOR)
            .separator(ENV_SEPARATOR),
    );

    let settings = builder.build()?;

    Ok(settings.try_deserialize::<T>()?)
}

/// Finds `{stem}.{ext}` in `directory` for the first supported extension present.
fn locate_file(directory: &Path, stem: &str) -> Result<PathBuf, LoadConfigError> {
    for extension in CONFIG_FILE_EXTENSIONS {
        let candidate = directory.join(format!("{stem}.{extension}"));
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(LoadConfigError::ConfigurationFileMissing {
        stem: stem.to_string(),
        directory: directory.to_path_buf(),
    })
}
