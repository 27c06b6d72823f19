//! Configuration for nlcm-lc
//!
//! Reads `nlcm-lc.toml` and resolves every setting with priority
//! CLI > ENV > TOML > compiled default. The command line parser lives in
//! `main.rs`; this module only sees its values through [`CliOverrides`].

use crate::reconciler::ReconcilerSettings;
use crate::service::HttpServiceConfig;
use nlcm_common::config::{
    load_toml_config_or_default, locate_config_file, resolve_setting, LoggingConfig,
    RootFolderResolver,
};
use nlcm_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Module name used for the config file (`nlcm-lc.toml`)
pub const MODULE_NAME: &str = "nlcm-lc";

pub const LOG_LEVEL_ENV: &str = "NLCM_LOG_LEVEL";
pub const SERVICE_URL_ENV: &str = "NLCM_SERVICE_URL";
pub const SERVICE_USERNAME_ENV: &str = "NLCM_SERVICE_USERNAME";
pub const SERVICE_PASSWORD_ENV: &str = "NLCM_SERVICE_PASSWORD";
pub const CORPUS_FILE_ENV: &str = "NLCM_CORPUS_FILE";
pub const POLL_INTERVAL_ENV: &str = "NLCM_POLL_INTERVAL_SECS";
pub const BIND_ENV: &str = "NLCM_BIND";

pub const DEFAULT_CORPUS_FILE: &str = "shared/self_nlc.csv";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BIND: &str = "127.0.0.1:5741";

/// `[service]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceSection {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// `[classifier]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierSection {
    /// Corpus path, relative paths are under the root folder
    pub corpus_file: Option<PathBuf>,
    /// Family name registered with the service (defaults to the corpus file name)
    pub family_name: Option<String>,
    pub language: Option<String>,
    /// Classifier to start from before the first snapshot
    pub classifier_id: Option<String>,
}

/// `[reconciler]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconcilerSection {
    pub poll_interval_secs: Option<u64>,
    pub grace_window_secs: Option<u64>,
}

/// `[http]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSection {
    pub bind: Option<String>,
}

/// Contents of `nlcm-lc.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub service: ServiceSection,
    pub classifier: ClassifierSection,
    pub reconciler: ReconcilerSection,
    pub http: HttpSection,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_file: Option<PathBuf>,
    pub root_folder: Option<PathBuf>,
    pub log_level: Option<String>,
    pub service_url: Option<String>,
    pub corpus_file: Option<PathBuf>,
    pub poll_interval_secs: Option<u64>,
    pub bind: Option<SocketAddr>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub service: HttpServiceConfig,
    pub corpus_path: PathBuf,
    pub family_name: String,
    pub language: String,
    pub initial_classifier_id: Option<String>,
    pub poll_interval: Duration,
    pub grace_window: Duration,
    pub bind: SocketAddr,
}

impl LifecycleConfig {
    /// Locate and read the config file, then resolve against CLI and environment
    pub fn load(cli: &CliOverrides) -> Result<Self> {
        let path = locate_config_file(cli.config_file.as_deref(), MODULE_NAME);
        if let Some(path) = &path {
            info!("Config file: {}", path.display());
        }
        let toml_config: TomlConfig = load_toml_config_or_default(path.as_deref())?;
        Self::resolve(cli, &toml_config)
    }

    /// Resolve settings from already loaded sources
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let root_folder = RootFolderResolver::new(MODULE_NAME)
            .with_cli_arg(cli.root_folder.clone())
            .with_toml_value(toml_config.root_folder.clone())
            .resolve();

        let log_level = resolve_setting(
            cli.log_level.clone(),
            LOG_LEVEL_ENV,
            Some(toml_config.logging.level.clone()),
            LoggingConfig::default().level,
        );

        let service = resolve_service(cli, &toml_config.service)?;

        let corpus_file = resolve_setting(
            cli.corpus_file.clone(),
            CORPUS_FILE_ENV,
            toml_config.classifier.corpus_file.clone(),
            PathBuf::from(DEFAULT_CORPUS_FILE),
        );
        let corpus_path = anchor(&root_folder, corpus_file);

        let family_name = match non_empty(toml_config.classifier.family_name.clone()) {
            Some(name) => name,
            None => corpus_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    Error::Config(format!(
                        "Cannot derive classifier family name from {}",
                        corpus_path.display()
                    ))
                })?,
        };

        let language = non_empty(toml_config.classifier.language.clone())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let poll_interval_secs = resolve_setting(
            cli.poll_interval_secs,
            POLL_INTERVAL_ENV,
            toml_config.reconciler.poll_interval_secs,
            DEFAULT_POLL_INTERVAL_SECS,
        );
        if poll_interval_secs == 0 {
            return Err(Error::Config(
                "reconciler.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        let grace_window_secs = toml_config
            .reconciler
            .grace_window_secs
            .unwrap_or(poll_interval_secs);

        let bind = resolve_bind(cli, &toml_config.http)?;

        Ok(Self {
            root_folder,
            log_level,
            service,
            corpus_path,
            family_name,
            language,
            initial_classifier_id: non_empty(toml_config.classifier.classifier_id.clone()),
            poll_interval: Duration::from_secs(poll_interval_secs),
            grace_window: Duration::from_secs(grace_window_secs),
            bind,
        })
    }

    /// Settings for [`crate::reconciler::spawn_reconciler`]
    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            family_name: self.family_name.clone(),
            poll_interval: self.poll_interval,
            grace_window: self.grace_window,
            initial_selection: self.initial_classifier_id.clone(),
        }
    }
}

fn resolve_service(cli: &CliOverrides, section: &ServiceSection) -> Result<HttpServiceConfig> {
    let base_url = resolve_setting(
        cli.service_url.clone(),
        SERVICE_URL_ENV,
        section.url.clone(),
        String::new(),
    );
    if base_url.trim().is_empty() {
        return Err(Error::Config(format!(
            "Classifier service URL not configured (set service.url or {})",
            SERVICE_URL_ENV
        )));
    }

    let username = non_empty(Some(resolve_setting(
        None,
        SERVICE_USERNAME_ENV,
        section.username.clone(),
        String::new(),
    )));
    let password = non_empty(Some(resolve_setting(
        None,
        SERVICE_PASSWORD_ENV,
        section.password.clone(),
        String::new(),
    )));

    let timeout_secs = section.timeout_secs.unwrap_or(DEFAULT_SERVICE_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(Error::Config(
            "service.timeout_secs must be greater than zero".to_string(),
        ));
    }

    Ok(HttpServiceConfig {
        base_url: base_url.trim().to_string(),
        username,
        password,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn resolve_bind(cli: &CliOverrides, section: &HttpSection) -> Result<SocketAddr> {
    if let Some(addr) = cli.bind {
        return Ok(addr);
    }

    let raw = resolve_setting(
        None,
        BIND_ENV,
        section.bind.clone(),
        DEFAULT_BIND.to_string(),
    );
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid bind address {:?}: {}", raw, e)))
}

fn anchor(root_folder: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root_folder.join(path)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
