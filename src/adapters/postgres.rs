//! # PostgreSQL Session Adapter
//!
//! Talks to a real pgvector server through the synchronous `postgres`
//! client. Each call is one blocking round-trip.
//!
//! - Statements go over the simple query protocol, so each one commits on
//!   its own (no transaction is ever opened).
//! - The bulk load streams text-format rows into `COPY ... FROM STDIN`.
//! - k-NN queries are prepared once per SQL text and reuse the prepared
//!   statement; results come back binary-encoded.

use std::collections::HashMap;
use std::io::Write;
use std::time::Instant;

use pgvector::Vector;
use postgres::{Client, Config, NoTls};
use tracing::debug;

use crate::core::config::ConnectionConfig;
use crate::core::{AnnResult, Dataset};
use crate::ports::{Connector, Session};
use crate::sql::{relation_size_sql, NearestQuery, Statement, TableRef};

/// Opens `PgSession`s from a `ConnectionConfig`
pub struct PgConnector {
    config: ConnectionConfig,
}

impl PgConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    fn client_config(&self) -> Config {
        let mut config = Config::new();
        config
            .host(&self.config.host)
            .port(self.config.port)
            .user(&self.config.user)
            .password(&self.config.password)
            .dbname(&self.config.dbname);
        config
    }
}

impl Connector for PgConnector {
    fn connect(&self) -> AnnResult<Box<dyn Session>> {
        debug!(target: "pgvector_ann::sql", server = %self.describe(), "connecting");
        let client = self.client_config().connect(NoTls)?;
        Ok(Box::new(PgSession::new(client)))
    }

    fn describe(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{}",
            self.config.user, self.config.host, self.config.port, self.config.dbname
        )
    }
}

/// A live connection plus its prepared-statement cache
pub struct PgSession {
    client: Client,
    prepared: HashMap<String, postgres::Statement>,
}

impl PgSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            prepared: HashMap::new(),
        }
    }

    fn prepare_cached(&mut self, sql: &str) -> AnnResult<postgres::Statement> {
        if let Some(statement) = self.prepared.get(sql) {
            return Ok(statement.clone());
        }

        let statement = self.client.prepare(sql)?;
        self.prepared.insert(sql.to_string(), statement.clone());
        Ok(statement)
    }
}

impl Session for PgSession {
    fn execute(&mut self, statement: &Statement) -> AnnResult<()> {
        let sql = statement.sql();
        let start = Instant::now();
        self.client.batch_execute(&sql)?;
        debug!(target: "pgvector_ann::sql", %sql, elapsed_ms = start.elapsed().as_millis() as u64, "executed");
        Ok(())
    }

    fn copy_dataset(&mut self, table: &TableRef, dataset: &Dataset) -> AnnResult<u64> {
        let sql = table.copy_in();
        debug!(target: "pgvector_ann::sql", %sql, rows = dataset.len(), "copy");

        let mut writer = self.client.copy_in(sql.as_str())?;
        for (id, row) in dataset.iter() {
            writer.write_all(copy_row(id, row).as_bytes())?;
        }
        Ok(writer.finish()?)
    }

    fn nearest(&mut self, query: &NearestQuery, vector: &[f32], limit: i64) -> AnnResult<Vec<i32>> {
        let statement = self.prepare_cached(query.sql())?;
        let embedding = Vector::from(vector.to_vec());

        let rows = self.client.query(&statement, &[&embedding, &limit])?;
        let ids = rows
            .iter()
            .map(|row| row.try_get::<_, i32>(0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn relation_size(&mut self, relation: &str) -> AnnResult<i64> {
        let row = self.client.query_one(relation_size_sql(relation).as_str(), &[])?;
        Ok(row.try_get::<_, i64>(0)?)
    }
}

/// One line of text-format COPY input: `id<TAB>[v0,v1,...]`
fn copy_row(id: usize, row: &[f32]) -> String {
    let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
    format!("{}\t[{}]\n", id, values.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_row_format() {
        assert_eq!(copy_row(0, &[0.0, 1.5, -2.25]), "0\t[0,1.5,-2.25]\n");
        assert_eq!(copy_row(42, &[0.1]), "42\t[0.1]\n");
    }

    #[test]
    fn test_describe_hides_password() {
        let connector = PgConnector::new(ConnectionConfig {
            password: "s3cret".to_string(),
            ..ConnectionConfig::default()
        });

        let described = connector.describe();
        assert_eq!(described, "postgres://ann@localhost:5432/ann");
        assert!(!described.contains("s3cret"));
    }
}
