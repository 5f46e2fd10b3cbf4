use crate::core::config::data::{path_display, Config};
use crate::core::document::DocumentError;
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_VAR: &str = "STANDIN_CONFIG";

/// Errors that stop the application before the UI starts.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A backend credential is absent from the environment.
    MissingCredential { var: &'static str, role: &'static str },

    /// The biography text file could not be read.
    Biography {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The profile document could not be opened.
    Profile {
        path: PathBuf,
        source: DocumentError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config at {}: {}", path_display(path), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse config at {}: {}", path_display(path), source)
            }
            ConfigError::MissingCredential { var, role } => {
                write!(f, "{var} is not set; the {role} backend needs an API key")
            }
            ConfigError::Biography { path, source } => {
                write!(f, "Failed to read biography at {}: {}", path_display(path), source)
            }
            ConfigError::Profile { path, source } => {
                write!(f, "Failed to load profile at {}: {}", path_display(path), source)
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::MissingCredential { .. } => None,
            ConfigError::Biography { source, .. } => Some(source),
            ConfigError::Profile { source, .. } => Some(source),
        }
    }
}

impl Config {
    /// Loads the file named by `STANDIN_CONFIG`, or `config.toml` in the
    /// platform config directory. A missing file yields the defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Config, ConfigError> {
        let path = match explicit_path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_config_path(),
        };
        match path {
            Some(path) => Self::load_from_path(&path),
            None => {
                debug!("no platform config directory; using defaults");
                Ok(Config::default())
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            debug!(path = %config_path.display(), "config file absent; using defaults");
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;
        debug!(path = %config_path.display(), "config loaded");
        Ok(config)
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "standin", "standin")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
