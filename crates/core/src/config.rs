//! TOML-based configuration for the clinic store.
//!
//! The `[store]` section locates the table files. The `[mirror]` section is
//! the middle layer of the mirror settings: an environment variable wins over
//! it, and a hard-coded default applies when both are absent. Resolution
//! happens once, in [`MirrorSettings::resolve`], and the result is handed to
//! the store explicitly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::mirror::Driver;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Flat-file store settings.
    #[serde(default)]
    pub store: StoreSection,

    /// Relational mirror settings (file layer).
    #[serde(default)]
    pub mirror: MirrorSection,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// How rows with fewer fields than the schema requires are treated on read.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShortRowPolicy {
    /// Drop the row and log a warning.
    #[default]
    Skip,
    /// Fail the whole read with [`StoreError::ShortRow`](crate::errors::StoreError::ShortRow).
    Reject,
}

/// Flat-file store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    /// Directory holding one `<table>.<extension>` file per table.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Table file extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Treatment of structurally short rows.
    #[serde(default)]
    pub short_rows: ShortRowPolicy,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_extension() -> String {
    "csv".into()
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            extension: default_extension(),
            short_rows: ShortRowPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mirror
// ---------------------------------------------------------------------------

/// Mirror settings as written in the config file. Every field is optional so
/// that "absent" can fall through to the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorSection {
    pub enabled: Option<bool>,
    pub driver: Option<Driver>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sqlite_path: Option<PathBuf>,
}

pub const ENV_SYNC_ENABLED: &str = "CLINIC_DB_SYNC_ENABLED";
pub const ENV_DRIVER: &str = "CLINIC_DB_DRIVER";
pub const ENV_HOST: &str = "CLINIC_DB_HOST";
pub const ENV_PORT: &str = "CLINIC_DB_PORT";
pub const ENV_NAME: &str = "CLINIC_DB_NAME";
pub const ENV_USER: &str = "CLINIC_DB_USER";
pub const ENV_PASSWORD: &str = "CLINIC_DB_PASSWORD";
pub const ENV_SQLITE_PATH: &str = "CLINIC_DB_SQLITE_PATH";

/// Fully resolved mirror settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSettings {
    /// The configured flag. Driver availability is checked separately.
    pub enabled: bool,
    pub driver: Driver,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub sqlite_path: PathBuf,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            driver: Driver::MySql,
            host: "localhost".into(),
            port: 3306,
            database: "clinic".into(),
            username: "root".into(),
            password: String::new(),
            sqlite_path: PathBuf::from("clinic.db"),
        }
    }
}

impl MirrorSettings {
    /// Resolve against the process environment.
    pub fn resolve(section: &MirrorSection) -> Result<Self, ConfigError> {
        Self::resolve_with(section, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup. Empty values count as
    /// unset.
    pub fn resolve_with<F>(section: &MirrorSection, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let enabled = match env(ENV_SYNC_ENABLED) {
            Some(raw) => parse_flag(ENV_SYNC_ENABLED, &raw)?,
            None => section.enabled.unwrap_or(defaults.enabled),
        };
        let driver = match env(ENV_DRIVER) {
            Some(raw) => raw.parse::<Driver>().map_err(|detail| ConfigError::InvalidValue {
                field: ENV_DRIVER.into(),
                detail,
            })?,
            None => section.driver.unwrap_or(defaults.driver),
        };
        let port = match env(ENV_PORT) {
            Some(raw) => parse_port(&raw)?,
            None => section.port.unwrap_or(defaults.port),
        };
        let pick = |key: &str, file: &Option<String>, default: String| {
            env(key)
                .or_else(|| file.clone().filter(|v| !v.is_empty()))
                .unwrap_or(default)
        };

        let settings = Self {
            enabled,
            driver,
            host: pick(ENV_HOST, &section.host, defaults.host),
            port,
            database: pick(ENV_NAME, &section.database, defaults.database),
            username: pick(ENV_USER, &section.username, defaults.username),
            password: pick(ENV_PASSWORD, &section.password, defaults.password),
            sqlite_path: env(ENV_SQLITE_PATH)
                .map(PathBuf::from)
                .or_else(|| section.sqlite_path.clone())
                .unwrap_or(defaults.sqlite_path),
        };
        debug!(
            enabled = settings.enabled,
            driver = %settings.driver,
            host = %settings.host,
            port = settings.port,
            database = %settings.database,
            "resolved mirror settings"
        );
        Ok(settings)
    }
}

fn parse_flag(field: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.into(),
            detail: format!("'{raw}' is not a boolean"),
        }),
    }
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    let invalid = |detail: String| ConfigError::InvalidValue {
        field: ENV_PORT.into(),
        detail,
    };
    match raw.trim().parse::<u16>() {
        Ok(0) => Err(invalid("port must be > 0".into())),
        Ok(port) => Ok(port),
        Err(e) => Err(invalid(format!("'{raw}' is not a port number: {e}"))),
    }
}

// ---------------------------------------------------------------------------
// Loading & validating
// ---------------------------------------------------------------------------

impl StoreConfig {
    /// Load a [`StoreConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: StoreConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all fields are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "store.data_dir".into(),
                detail: "data directory must not be empty".into(),
            });
        }
        if self.store.extension.is_empty() || self.store.extension.contains(['.', '/', '\\']) {
            return Err(ConfigError::InvalidValue {
                field: "store.extension".into(),
                detail: "extension must be a bare suffix such as 'csv'".into(),
            });
        }
        if self.mirror.port == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "mirror.port".into(),
                detail: "port must be > 0".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the mirror settings against the process environment.
    pub fn mirror_settings(&self) -> Result<MirrorSettings, ConfigError> {
        MirrorSettings::resolve(&self.mirror)
    }
}
