//! Configuration loading and root folder resolution
//!
//! Every setting resolves with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is never fatal: the module logs a warning and starts
//! with defaults. A TOML file that exists but fails to parse is an error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "NLCM_ROOT_FOLDER";

/// Environment variable overriding the config file location
pub const CONFIG_FILE_ENV: &str = "NLCM_CONFIG";

/// `[logging]` table shared by all modules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing level (`RUST_LOG` still wins at runtime)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: LoggingConfig::default().level,
        }
    }
}

/// Root folder resolution for a module
///
/// The root folder anchors relative paths in the module config (e.g. the
/// training corpus file).
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            toml_value: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_value(mut self, path: Option<PathBuf>) -> Self {
        self.toml_value = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!("{}: root folder from command line", self.module_name);
            return path.clone();
        }

        if let Some(path) = non_empty_env(ROOT_FOLDER_ENV) {
            debug!("{}: root folder from {}", self.module_name, ROOT_FOLDER_ENV);
            return PathBuf::from(path);
        }

        if let Some(path) = &self.toml_value {
            debug!("{}: root folder from TOML config", self.module_name);
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Resolve one setting through the CLI > ENV > TOML > default chain
///
/// An environment value that fails to parse is ignored with a warning rather
/// than aborting startup.
pub fn resolve_setting<T>(cli: Option<T>, env_var: &str, toml: Option<T>, default: T) -> T
where
    T: FromStr,
{
    if let Some(value) = cli {
        return value;
    }

    if let Some(raw) = non_empty_env(env_var) {
        match raw.parse::<T>() {
            Ok(value) => return value,
            Err(_) => warn!("Ignoring unparsable {}={:?}", env_var, raw),
        }
    }

    toml.unwrap_or(default)
}

/// Default config file location: `<config dir>/nlcm/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nlcm").join(format!("{}.toml", module_name)))
}

/// Locate the config file: explicit path, then `NLCM_CONFIG`, then the platform default
pub fn locate_config_file(cli_path: Option<&Path>, module_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }
    if let Some(path) = non_empty_env(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }
    default_config_path(module_name)
}

/// Load a TOML config file
pub fn load_toml_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load a TOML config file, falling back to defaults when it does not exist
pub fn load_toml_config_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match path {
        Some(path) if path.exists() => load_toml_config(path),
        Some(path) => {
            warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            Ok(T::default())
        }
        None => {
            warn!("No config file location available, using defaults");
            Ok(T::default())
        }
    }
}

/// Write a TOML config file (creates parent directories)
pub fn write_toml_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/nlcm (or /var/lib/nlcm for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("nlcm"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/nlcm"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/nlcm
        dirs::data_dir()
            .map(|d| d.join("nlcm"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/nlcm"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\nlcm
        dirs::data_local_dir()
            .map(|d| d.join("nlcm"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\nlcm"))
    } else {
        PathBuf::from("./nlcm_data")
    }
}
