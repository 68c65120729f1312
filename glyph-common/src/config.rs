//! Configuration loading and root folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing config file is not an error: the service starts with defaults
//! and logs a warning once tracing is up.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{BackendKind, Error, Result};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "GLYPH_ROOT_FOLDER";

/// Environment variable overriding the config file location
pub const CONFIG_FILE_ENV: &str = "GLYPH_CONFIG";

/// Name of the ledger file inside the root folder
pub const LEDGER_FILE: &str = "results.csv";

/// Name of the artifact directory inside the root folder
pub const ARTIFACT_DIR: &str = "tmp";

/// Name of the models directory inside the root folder
pub const MODELS_DIR: &str = "models";

/// Compiled defaults
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8000";
pub const DEFAULT_INVOKE_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:5173", "http://localhost:5174"];

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. "info" or "glyph_api=debug"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One `[backends.<kind>]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Executable to spawn; defaults to the sibling binary of the service
    pub program: Option<PathBuf>,
    /// Extra arguments placed before `--input`
    pub args: Vec<String>,
    /// Model weights; defaults to `<models_dir>/<kind file>`
    pub model: Option<PathBuf>,
}

/// `[backends]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub lr: Option<BackendConfig>,
    pub cnn: Option<BackendConfig>,
    pub rnn: Option<BackendConfig>,
}

impl BackendsConfig {
    pub fn get(&self, kind: BackendKind) -> Option<&BackendConfig> {
        match kind {
            BackendKind::Lr => self.lr.as_ref(),
            BackendKind::Cnn => self.cnn.as_ref(),
            BackendKind::Rnn => self.rnn.as_ref(),
        }
    }
}

/// Contents of `glyph.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub models_dir: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
    /// Per-invocation backend timeout; 0 disables the timeout
    pub invoke_timeout_secs: Option<u64>,
    pub logging: LoggingConfig,
    pub backends: BackendsConfig,
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
    }

    /// Parse a config file, falling back to defaults when it does not exist
    ///
    /// A file that exists but cannot be parsed is still an error. Nothing is
    /// logged here: callers load config before the subscriber is installed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn invoke_timeout(&self) -> Option<Duration> {
        match self.invoke_timeout_secs.unwrap_or(DEFAULT_INVOKE_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn bind_address(&self) -> String {
        self.bind_address
            .clone()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.allowed_origins.clone().unwrap_or_else(|| {
            DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|s| s.to_string())
                .collect()
        })
    }
}

/// Locate the config file: CLI argument, `GLYPH_CONFIG`, then the user config dir
pub fn config_file_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::config_dir()
        .map(|d| d.join("glyph").join("glyph.toml"))
        .unwrap_or_else(|| PathBuf::from("glyph.toml"))
}

/// Resolve the root folder holding the ledger, artifacts and models
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("glyph"))
        .unwrap_or_else(|| PathBuf::from("./glyph_data"))
}

/// Paths derived from the resolved root folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFolder {
    root: PathBuf,
    models_dir: Option<PathBuf>,
}

impl RootFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            models_dir: None,
        }
    }

    /// Override the models directory (config `models_dir`)
    pub fn with_models_dir(mut self, models_dir: Option<PathBuf>) -> Self {
        self.models_dir = models_dir;
        self
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.root.join(ARTIFACT_DIR)
    }

    pub fn models_dir(&self) -> PathBuf {
        self.models_dir
            .clone()
            .unwrap_or_else(|| self.root.join(MODELS_DIR))
    }

    /// Create the root folder and artifact directory if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.artifact_dir())?;
        Ok(())
    }
}
