//! Supervisor configuration.
//!
//! Values are layered, highest precedence first:
//!
//! 1. command-line flags ([`ConfigOverrides`] built by the binary)
//! 2. environment: `SSHELL_AGENT`, `SSHELL_AUDIT_LOG`, `SSHELL_LOG_FILE`
//! 3. a TOML file (`--config`, or `<config_dir>/sshell/config.toml` if it exists)
//! 4. built-in defaults
//!
//! ```toml
//! agent_program = "/usr/local/bin/sensor-agent"
//! audit_log = "/var/log/sshell/log.txt"
//! diagnostics_log = "/tmp/sshell.log"
//! capacity = 8
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::registry::{DEFAULT_CAPACITY, MAX_CAPACITY};

/// Agent executable name looked up next to the supervisor binary.
pub const AGENT_PROGRAM: &str = "sensor-agent";

/// Audit log file name, relative to the working directory.
pub const DEFAULT_AUDIT_LOG: &str = "log.txt";

pub const ENV_AGENT: &str = "SSHELL_AGENT";
pub const ENV_AUDIT_LOG: &str = "SSHELL_AUDIT_LOG";
pub const ENV_LOG_FILE: &str = "SSHELL_LOG_FILE";

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("capacity must be between 1 and {MAX_CAPACITY}, got {0}")]
    Capacity(usize),
}

/// One configuration layer; unset fields fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub agent_program: Option<PathBuf>,
    pub audit_log: Option<PathBuf>,
    pub diagnostics_log: Option<PathBuf>,
    pub capacity: Option<usize>,
}

impl ConfigOverrides {
    /// Reads a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads the `SSHELL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a layer from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        Self {
            agent_program: path(ENV_AGENT),
            audit_log: path(ENV_AUDIT_LOG),
            diagnostics_log: path(ENV_LOG_FILE),
            capacity: None,
        }
    }

    /// Fills every field unset here from `lower`.
    #[must_use]
    pub fn or(self, lower: Self) -> Self {
        Self {
            agent_program: self.agent_program.or(lower.agent_program),
            audit_log: self.audit_log.or(lower.audit_log),
            diagnostics_log: self.diagnostics_log.or(lower.diagnostics_log),
            capacity: self.capacity.or(lower.capacity),
        }
    }
}

/// Resolved supervisor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Agent executable to spawn
    pub agent_program: PathBuf,
    /// Append-only audit log
    pub audit_log: PathBuf,
    /// Diagnostics (tracing) output
    pub diagnostics_log: PathBuf,
    /// Registry capacity
    pub capacity: usize,
}

impl ShellConfig {
    /// Loads configuration from every layer.
    ///
    /// An explicit `config_path` must exist; the default location is only
    /// read if present.
    pub fn load(config_path: Option<&Path>, cli: ConfigOverrides) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => ConfigOverrides::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.is_file() => ConfigOverrides::from_file(&path)?,
                _ => ConfigOverrides::default(),
            },
        };
        let config = Self::resolve(cli.or(ConfigOverrides::from_env()).or(file))?;
        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Applies defaults to a merged layer and validates the result.
    pub fn resolve(layer: ConfigOverrides) -> Result<Self, ConfigError> {
        let config = Self {
            agent_program: layer.agent_program.unwrap_or_else(default_agent_program),
            audit_log: layer
                .audit_log
                .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_LOG)),
            diagnostics_log: layer.diagnostics_log.unwrap_or_else(default_diagnostics_log),
            capacity: layer.capacity.unwrap_or(DEFAULT_CAPACITY),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(ConfigError::Capacity(self.capacity));
        }
        Ok(())
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            agent_program: default_agent_program(),
            audit_log: PathBuf::from(DEFAULT_AUDIT_LOG),
            diagnostics_log: default_diagnostics_log(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// `<config_dir>/sshell/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sshell").join("config.toml"))
}

/// The agent binary installed next to the running executable.
fn default_agent_program() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(AGENT_PROGRAM)))
        .unwrap_or_else(|| PathBuf::from(AGENT_PROGRAM))
}

fn default_diagnostics_log() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("sshell")
        .join("sshell.log")
}
