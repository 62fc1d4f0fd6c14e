//! # Configuration
//!
//! Where to connect and how to shape the benchmark table.
//!
//! Values come from, in increasing priority:
//! 1. `Default`
//! 2. a JSON file (`PgVectorConfig::load`)
//! 3. `ANN_BENCHMARKS_PG_*` environment variables (`apply_env`)

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AnnError, AnnResult};

/// Environment variable prefix shared with the upstream benchmark suite
pub const ENV_PREFIX: &str = "ANN_BENCHMARKS_PG_";

/// PostgreSQL connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "ann".to_string(),
            password: "ann".to_string(),
            dbname: "ann".to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Override fields from `ANN_BENCHMARKS_PG_{HOST,PORT,USER,PASSWORD,DBNAME}`
    pub fn apply_env(&mut self) -> AnnResult<()> {
        self.apply_vars(|name| std::env::var(format!("{ENV_PREFIX}{name}")).ok())
    }

    fn apply_vars<F>(&mut self, lookup: F) -> AnnResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .parse()
                .map_err(|_| AnnError::Config(format!("{ENV_PREFIX}PORT is not a port: '{port}'")))?;
        }
        if let Some(user) = lookup("USER") {
            self.user = user;
        }
        if let Some(password) = lookup("PASSWORD") {
            self.password = password;
        }
        if let Some(dbname) = lookup("DBNAME") {
            self.dbname = dbname;
        }
        Ok(())
    }
}

/// Adapter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PgVectorConfig {
    /// Where the server lives
    pub connection: ConnectionConfig,

    /// Table holding `(id, embedding)`; the index is `<table>_embedding_idx`
    pub table: String,

    /// Session `work_mem` while querying
    pub work_mem: String,

    /// Session `maintenance_work_mem` during the index build, if any
    pub maintenance_work_mem: Option<String>,

    /// Session `max_parallel_maintenance_workers` during the build, if any
    pub max_parallel_maintenance_workers: Option<u32>,
}

impl Default for PgVectorConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            table: "items".to_string(),
            work_mem: "4GB".to_string(),
            maintenance_work_mem: None,
            max_parallel_maintenance_workers: None,
        }
    }
}

impl PgVectorConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> AnnResult<Self> {
        let mut config = Self::default();
        config.connection.apply_env()?;
        Ok(config)
    }

    /// Read a JSON file, then apply environment overrides
    pub fn load(path: &Path) -> AnnResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_json(&text)?;
        config.connection.apply_env()?;
        Ok(config)
    }

    /// Parse JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> AnnResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
