//! # Bridge Configuration
//!
//! Servers, databases and HTTP settings for the publisher.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     GEOBRIDGE_SERVER=staging                                           │
//! │     GEOBRIDGE_USERNAME / GEOBRIDGE_PASSWORD                            │
//! │     GEOBRIDGE_TIMEOUT_SECS=120                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or                                                │
//! │     ~/.config/geobridge/config.toml (Linux)                            │
//! │     ~/Library/Application Support/org.geobridge.geobridge/... (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     no servers, 60s timeout                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! default_server = "local"
//!
//! [http]
//! timeout_secs = 60
//!
//! [[servers]]
//! name = "local"
//! url = "http://localhost:8080/geoserver"
//! username = "admin"
//! password = "geoserver"
//! use_vector_tiles = true
//! storage = { kind = "postgis_managed_by_publisher", database = "warehouse" }
//!
//! [[databases]]
//! name = "warehouse"
//! host = "db.internal"
//! port = 5432
//! schema = "public"
//! database = "gis"
//! username = "loader"
//! password = "secret"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use geobridge_core::validation::validate_positive;
use geobridge_core::{PostgisConnection, ServerProfile, StorageStrategy};

use crate::error::{PublishError, PublishResult};
use crate::transport::{Credentials, TransportConfig};

const CONFIG_FILE: &str = "config.toml";

// =============================================================================
// HTTP Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Whole-request timeout (seconds). Uploads share it.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Overrides the default `geobridge/<version>` user agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

fn default_timeout() -> u64 {
    60
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            timeout_secs: default_timeout(),
            user_agent: None,
        }
    }
}

// =============================================================================
// Server Entries
// =============================================================================

/// One GeoServer instance.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub name: String,

    /// Base URL; a trailing `/rest` is optional.
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default = "default_storage")]
    pub storage: StorageStrategy,

    #[serde(default)]
    pub use_original_data_source: bool,

    #[serde(default)]
    pub use_vector_tiles: bool,
}

fn default_storage() -> StorageStrategy {
    StorageStrategy::FileBased
}

impl fmt::Debug for ServerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerEntry")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("storage", &self.storage)
            .field("use_original_data_source", &self.use_original_data_source)
            .field("use_vector_tiles", &self.use_vector_tiles)
            .finish()
    }
}

impl ServerEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        ServerEntry {
            name: name.into(),
            url: url.into(),
            username: None,
            password: None,
            storage: default_storage(),
            use_original_data_source: false,
            use_vector_tiles: false,
        }
    }

    pub fn profile(&self) -> ServerProfile {
        ServerProfile::new(self.name.as_str(), &self.url)
            .with_storage(self.storage.clone())
            .with_original_data_source(self.use_original_data_source)
            .with_vector_tiles(self.use_vector_tiles)
            .with_credential_ref(self.name.as_str())
    }

    /// Basic-auth credentials, when a username is configured.
    pub fn credentials(&self) -> Option<Credentials> {
        self.username.as_ref().map(|username| {
            Credentials::new(username.as_str(), self.password.clone().unwrap_or_default())
        })
    }
}

// =============================================================================
// Database Entries
// =============================================================================

/// External PostGIS database the publisher can load layers into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    pub name: String,

    #[serde(flatten)]
    pub connection: PostgisConnection,
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Server used when none is named explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_server: Option<String>,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub servers: Vec<ServerEntry>,

    #[serde(default)]
    pub databases: Vec<DatabaseEntry>,
}

impl BridgeConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> PublishResult<Self> {
        let explicit = config_path.is_some();
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                config = Self::read(&path)?;
            } else if explicit {
                return Err(PublishError::ConfigLoadFailed(format!(
                    "{} does not exist",
                    path.display()
                )));
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> PublishResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PublishError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> PublishResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Saves configuration as pretty TOML.
    pub fn save(&self, config_path: Option<PathBuf>) -> PublishResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| PublishError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(path)
    }

    /// Validates the configuration.
    ///
    /// ## Rules
    /// - Server and database names are non-empty and unique
    /// - Server URLs are absolute http(s) URLs
    /// - Publisher-managed storage names a configured database
    /// - `default_server`, when set, names a configured server
    pub fn validate(&self) -> PublishResult<()> {
        validate_positive("http.timeout_secs", self.http.timeout_secs)?;

        let mut names = HashSet::new();
        for server in &self.servers {
            if server.name.trim().is_empty() {
                return Err(PublishError::InvalidConfig("server name must not be empty".into()));
            }
            if !names.insert(server.name.as_str()) {
                return Err(PublishError::InvalidConfig(format!(
                    "duplicate server '{}'",
                    server.name
                )));
            }

            let parsed = url::Url::parse(&server.url)?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(PublishError::InvalidUrl(format!(
                    "Server URL must start with http:// or https://, got: {}",
                    server.url
                )));
            }

            if let StorageStrategy::PostgisManagedByPublisher { database } = &server.storage {
                if self.database(database).is_none() {
                    return Err(PublishError::UnknownDatabase(database.clone()));
                }
            }
        }

        let mut databases = HashSet::new();
        for entry in &self.databases {
            if entry.name.trim().is_empty() {
                return Err(PublishError::InvalidConfig("database name must not be empty".into()));
            }
            if !databases.insert(entry.name.as_str()) {
                return Err(PublishError::InvalidConfig(format!(
                    "duplicate database '{}'",
                    entry.name
                )));
            }
        }

        if let Some(default) = &self.default_server {
            if !names.contains(default.as_str()) {
                return Err(PublishError::InvalidConfig(format!(
                    "default_server '{}' is not configured",
                    default
                )));
            }
        }

        Ok(())
    }

    /// Applies `GEOBRIDGE_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(server) = lookup("GEOBRIDGE_SERVER") {
            debug!(%server, "Overriding default server from environment");
            self.default_server = Some(server);
        }

        if let Some(timeout) = lookup("GEOBRIDGE_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.http.timeout_secs = secs,
                Err(_) => warn!(%timeout, "Ignoring invalid GEOBRIDGE_TIMEOUT_SECS"),
            }
        }

        let username = lookup("GEOBRIDGE_USERNAME");
        let password = lookup("GEOBRIDGE_PASSWORD");
        if username.is_none() && password.is_none() {
            return;
        }

        let target = self.default_server.clone();
        let entry = match target {
            Some(name) => self.servers.iter_mut().find(|s| s.name == name),
            None if self.servers.len() == 1 => self.servers.first_mut(),
            None => None,
        };
        match entry {
            Some(entry) => {
                if username.is_some() {
                    entry.username = username;
                }
                if password.is_some() {
                    entry.password = password;
                }
            }
            None => warn!("Credentials in environment but no server selected"),
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "geobridge", "geobridge")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Server by name, else the default, else the only one configured.
    pub fn server(&self, name: Option<&str>) -> PublishResult<&ServerEntry> {
        let wanted = name.or(self.default_server.as_deref());
        match wanted {
            Some(wanted) => self
                .servers
                .iter()
                .find(|server| server.name == wanted)
                .ok_or_else(|| PublishError::InvalidConfig(format!("unknown server '{}'", wanted))),
            None => match self.servers.as_slice() {
                [only] => Ok(only),
                [] => Err(PublishError::InvalidConfig("no servers configured".into())),
                _ => Err(PublishError::InvalidConfig(
                    "several servers configured, pick one with --server".into(),
                )),
            },
        }
    }

    pub fn database(&self, name: &str) -> Option<&DatabaseEntry> {
        self.databases.iter().find(|entry| entry.name == name)
    }

    pub fn transport(&self) -> TransportConfig {
        let mut transport = TransportConfig {
            timeout: Duration::from_secs(self.http.timeout_secs),
            ..TransportConfig::default()
        };
        if let Some(agent) = &self.http.user_agent {
            transport.user_agent = agent.clone();
        }
        transport
    }
}
