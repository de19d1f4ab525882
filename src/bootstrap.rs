//! Datasource bootstrap
//!
//! Merges user-supplied datasource configuration with defaults, validates
//! it, installs the datasource into the metadata registry and tears it down
//! on application stop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{TxError, TxResult};
use crate::metadata::{self, DEFAULT_DATASOURCE_NAME};
use crate::query_log::QueryLogger;
use crate::session::Datasource;

fn default_name() -> String {
    DEFAULT_DATASOURCE_NAME.to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Datasource configuration accepted by the bootstrap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasourceConfig {
    /// Database engine, e.g. "postgres", "mysql", "sqlite"
    #[serde(rename = "type")]
    pub engine: String,
    /// Registry name the datasource is installed under
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Connection URL, alternative to host/port/database fields
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Whether the query-log adapter forwards ORM events
    #[serde(default)]
    pub logging: bool,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl DatasourceConfig {
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            name: default_name(),
            host: None,
            port: None,
            url: None,
            database: None,
            username: None,
            password: None,
            logging: false,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    /// Engines that carry their storage in-process and need no host or URL
    pub fn is_embedded(&self) -> bool {
        matches!(self.engine.as_str(), "sqlite" | "sqlite3" | "memory")
    }

    /// Fill engine-dependent defaults into unset fields
    pub fn merged_defaults(mut self) -> Self {
        if self.port.is_none() {
            self.port = match self.engine.as_str() {
                "postgres" | "postgresql" => Some(5432),
                "mysql" | "mariadb" => Some(3306),
                _ => None,
            };
        }
        self
    }

    /// Reject incomplete configurations.
    ///
    /// The engine is always required. Non-embedded engines additionally
    /// need a host or a connection URL, and a database name.
    pub fn validate(&self) -> TxResult<()> {
        if self.engine.trim().is_empty() {
            return Err(TxError::configuration(
                "missing required field 'type': select a database engine",
            ));
        }
        if !self.is_embedded() {
            if self.host.is_none() && self.url.is_none() {
                return Err(TxError::configuration(format!(
                    "datasource '{}' needs a 'host' or a connection 'url'",
                    self.name
                )));
            }
            if self.database.is_none() {
                return Err(TxError::configuration(format!(
                    "datasource '{}' needs a 'database' name",
                    self.name
                )));
            }
        }
        if self.min_connections > self.max_connections {
            return Err(TxError::configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

/// Installs a datasource into the metadata registry and removes it on stop
pub struct DatasourcePlugin {
    config: DatasourceConfig,
}

impl DatasourcePlugin {
    /// Merge defaults into the configuration and validate it
    pub fn new(config: DatasourceConfig) -> TxResult<Self> {
        let config = config.merged_defaults();
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DatasourceConfig {
        &self.config
    }

    /// Query-log adapter configured from this datasource's logging flag
    pub fn query_logger(&self) -> QueryLogger {
        QueryLogger::new(self.config.logging)
    }

    /// Install the datasource under the configured registry name
    pub fn install(&self, datasource: Arc<dyn Datasource>) {
        info!(
            "Installing datasource '{}' (engine {})",
            self.config.name, self.config.engine
        );
        metadata::register_datasource(self.config.name.clone(), datasource);
    }

    /// Remove the datasource from the registry and destroy its sessions
    pub async fn shutdown(&self) -> TxResult<()> {
        if let Some(meta) = metadata::remove_datasource(&self.config.name) {
            meta.datasource.close().await?;
            info!("Datasource '{}' shut down", self.config.name);
        }
        Ok(())
    }
}
