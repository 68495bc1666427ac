use std::env;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_DEPLOYMENT_URL: &str = "http://localhost:8000";
pub const DEFAULT_AGENT_ID: &str = "deepagent";

pub const ENV_DEPLOYMENT_URL: &str = "BROOK_DEPLOYMENT_URL";
pub const ENV_AGENT_ID: &str = "BROOK_AGENT_ID";
pub const ENV_ACCESS_TOKEN: &str = "BROOK_ACCESS_TOKEN";
pub const ENV_TRANSPORT: &str = "BROOK_TRANSPORT";

/// How assistant turns reach the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    /// Fetch the finished turn in one request and replay it as paced chunks.
    #[default]
    Replay,
    /// Consume the backend's SSE endpoint frame by frame.
    Incremental,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Replay => "replay",
            Transport::Incremental => "incremental",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "replay" => Ok(Transport::Replay),
            "incremental" => Ok(Transport::Incremental),
            other => Err(format!(
                "unknown transport '{other}' (expected 'replay' or 'incremental')"
            )),
        }
    }
}

/// Connection settings for one agent deployment.
///
/// Loaded from `config.toml` in the platform config directory, then
/// overridden field by field from `BROOK_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the deployment, e.g. `http://localhost:8000`.
    pub deployment_url: String,
    /// Agent to address on that deployment.
    pub agent_id: String,
    /// Bearer token; requests go out unauthenticated when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub transport: Transport,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            deployment_url: DEFAULT_DEPLOYMENT_URL.to_string(),
            agent_id: DEFAULT_AGENT_ID.to_string(),
            access_token: None,
            transport: Transport::default(),
        }
    }
}

/// Errors that can occur when loading configuration from disk.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        /// Path to the configuration file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        /// Path to the configuration file with invalid TOML.
        path: PathBuf,
        /// The TOML deserialization error.
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(
                    f,
                    "Failed to read config at {}: {}",
                    path_display(path),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse config at {}: {}",
                    path_display(path),
                    source
                )
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl Config {
    /// Loads the config file (if any) and applies environment overrides.
    pub fn load() -> Result<Config, ConfigError> {
        let mut config = Self::load_from_path(&Self::config_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    pub fn config_path() -> PathBuf {
        let proj_dirs = ProjectDirs::from("org", "permacommons", "brook")
            .expect("Failed to determine config directory");
        proj_dirs.config_dir().join("config.toml")
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|name| env::var(name).ok());
    }

    fn apply_env_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_DEPLOYMENT_URL) {
            self.deployment_url = url;
        }
        if let Some(agent_id) = lookup(ENV_AGENT_ID) {
            self.agent_id = agent_id;
        }
        if let Some(token) = lookup(ENV_ACCESS_TOKEN) {
            self.access_token = Some(token);
        }
        if let Some(value) = lookup(ENV_TRANSPORT) {
            match value.parse() {
                Ok(transport) => self.transport = transport,
                Err(err) => warn!(%err, "ignoring {ENV_TRANSPORT}"),
            }
        }
    }

    /// Token to attach as a `Bearer` header, treating an empty string the
    /// same as no token at all.
    pub fn bearer_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|token| !token.is_empty())
    }
}

fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
