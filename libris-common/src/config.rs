//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. Every field has a built-in
//! default, so a missing or partial file never prevents startup.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`LIBRIS_ROOT_FOLDER`)
//! 3. TOML config file (`root_folder`)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "LIBRIS_ROOT_FOLDER";

/// Environment variable overriding the config file location
pub const CONFIG_FILE_ENV: &str = "LIBRIS_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "libris.db";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Library root folder (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// SQLite database path (optional, defaults to `<root>/libris.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Resolver / predictor tuning
    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Filename-parsing and predictor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Minimum prediction confidence for the AI-augmented parser
    #[serde(default = "default_predictor_threshold")]
    pub predictor_threshold: f64,

    /// Confidence a prediction must exceed to replace a non-empty heuristic value
    #[serde(default = "default_predictor_override")]
    pub predictor_override: f64,

    /// Upper bound on a single predictor call
    #[serde(default = "default_predictor_timeout_ms")]
    pub predictor_timeout_ms: u64,

    /// Number of ancestor folders inspected for series/author clues
    #[serde(default = "default_folder_depth")]
    pub folder_depth: usize,

    /// Trained predictor model (JSON); predictor disabled when absent
    #[serde(default)]
    pub model_path: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            predictor_threshold: default_predictor_threshold(),
            predictor_override: default_predictor_override(),
            predictor_timeout_ms: default_predictor_timeout_ms(),
            folder_depth: default_folder_depth(),
            model_path: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_predictor_threshold() -> f64 {
    0.7
}

fn default_predictor_override() -> f64 {
    0.8
}

fn default_predictor_timeout_ms() -> u64 {
    2000
}

fn default_folder_depth() -> usize {
    4
}

impl TomlConfig {
    /// Load configuration from an explicit file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the platform location, falling back to defaults
    ///
    /// A missing file is not an error; a malformed one is logged and ignored.
    pub fn load_or_default() -> Self {
        let (config, ignored) = Self::load_located();
        if let Some((path, e)) = ignored {
            warn!("Ignoring config file {}: {}", path.display(), e);
        }
        config
    }

    /// Like [`TomlConfig::load_or_default`], but hands back the ignored file
    /// and its error instead of logging it
    ///
    /// Used before logging is initialized, since the logging level itself
    /// comes from this file.
    pub fn load_located() -> (Self, Option<(PathBuf, Error)>) {
        let Some(path) = locate_config_file() else {
            debug!("No config file found, using built-in defaults");
            return (Self::default(), None);
        };

        match Self::load(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded config file");
                (config, None)
            }
            Err(e) => (Self::default(), Some((path, e))),
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let r = &self.resolver;
        if !(0.0..=1.0).contains(&r.predictor_threshold) {
            return Err(Error::Config(format!(
                "resolver.predictor_threshold must be within [0, 1], got {}",
                r.predictor_threshold
            )));
        }
        if !(0.0..=1.0).contains(&r.predictor_override) {
            return Err(Error::Config(format!(
                "resolver.predictor_override must be within [0, 1], got {}",
                r.predictor_override
            )));
        }
        if r.folder_depth == 0 {
            return Err(Error::Config("resolver.folder_depth must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Database path: explicit setting, else `<root>/libris.db`
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| root_folder.join(DATABASE_FILE_NAME))
    }
}

/// Resolve the library root folder
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
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
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Find the config file for the platform
///
/// `LIBRIS_CONFIG` wins; on Linux `~/.config/libris/config.toml` is tried
/// before `/etc/libris/config.toml`.
pub fn locate_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        let path = PathBuf::from(path);
        return path.exists().then_some(path);
    }

    let user_config = dirs::config_dir().map(|d| d.join("libris").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/libris/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/libris (or /var/lib/libris for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("libris"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/libris"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("libris"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/libris"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("libris"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\libris"))
    } else {
        PathBuf::from("./libris_data")
    }
}

/// Write configuration to disk (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
