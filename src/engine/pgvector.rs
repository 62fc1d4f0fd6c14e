//! # PgVector Engine
//!
//! The benchmark adapter.
//!
//! This struct wires together:
//! - A connector (where sessions come from)
//! - The metric-specific query, chosen once at construction
//! - The single session opened by `fit` and released by `done`
//!
//! And exposes the harness lifecycle through `AnnAlgorithm`.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::adapters::postgres::PgConnector;
use crate::core::config::PgVectorConfig;
use crate::core::{AnnError, AnnResult, Dataset, HnswParams, Metric};
use crate::ports::{AnnAlgorithm, Connector, Session};
use crate::sql::{NearestQuery, Setting, Statement, TableRef};

/// Where the adapter is in its lifecycle
enum State {
    Unfitted,
    Fitted(Fitted),
    Done,
}

/// Everything that only exists between `fit` and `done`
struct Fitted {
    session: Box<dyn Session>,
    dimensions: usize,
}

fn require_fitted(state: &mut State) -> AnnResult<&mut Fitted> {
    match state {
        State::Fitted(fitted) => Ok(fitted),
        State::Unfitted => Err(AnnError::NotFitted),
        State::Done => Err(AnnError::Done),
    }
}

/// pgvector HNSW behind the benchmark harness interface
pub struct PgVector {
    metric: Metric,
    params: HnswParams,
    config: PgVectorConfig,
    table: TableRef,
    query: NearestQuery,
    connector: Box<dyn Connector>,
    ef_search: Option<u32>,
    state: State,
}

impl PgVector {
    /// Create an adapter that talks to PostgreSQL
    ///
    /// Connection settings come from `ANN_BENCHMARKS_PG_*` over defaults.
    /// Fails with `UnsupportedMetric` for anything but `angular` and
    /// `euclidean`.
    pub fn new(metric: &str, params: HnswParams) -> AnnResult<Self> {
        let metric: Metric = metric.parse()?;
        let config = PgVectorConfig::from_env()?;
        let connector = Box::new(PgConnector::new(config.connection.clone()));
        Self::build(metric, params, config, connector)
    }

    /// Create with explicit configuration and a custom connector
    pub fn with_connector(
        metric: &str,
        params: HnswParams,
        config: PgVectorConfig,
        connector: Box<dyn Connector>,
    ) -> AnnResult<Self> {
        let metric: Metric = metric.parse()?;
        Self::build(metric, params, config, connector)
    }

    fn build(
        metric: Metric,
        params: HnswParams,
        config: PgVectorConfig,
        connector: Box<dyn Connector>,
    ) -> AnnResult<Self> {
        let table = TableRef::new(&config.table)?;
        let query = NearestQuery::new(table.clone(), metric);

        Ok(Self {
            metric,
            params,
            config,
            table,
            query,
            connector,
            ef_search: None,
            state: State::Unfitted,
        })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn params(&self) -> HnswParams {
        self.params
    }

    pub fn ef_search(&self) -> Option<u32> {
        self.ef_search
    }

    /// The k-NN query text selected for this adapter's metric
    pub fn query_sql(&self) -> &str {
        self.query.sql()
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, State::Fitted(_))
    }

    // ========================================================================
    // FIT PHASES
    // ========================================================================

    fn load(&self, session: &mut dyn Session, dataset: &Dataset) -> AnnResult<()> {
        session.execute(&Statement::CreateTable {
            table: self.table.clone(),
            dimensions: dataset.dimensions(),
        })?;
        session.execute(&Statement::SetStoragePlain {
            table: self.table.clone(),
        })?;

        info!(rows = dataset.len(), dimensions = dataset.dimensions(), "copying data");
        let start = Instant::now();
        let copied = session.copy_dataset(&self.table, dataset)?;
        info!(rows = copied, elapsed_s = start.elapsed().as_secs_f64(), "copied data");

        Ok(())
    }

    /// Settings raised for the build only; each is `RESET` afterwards
    fn build_settings(&self) -> Vec<Statement> {
        let mut settings = vec![Statement::set_integer(Setting::MinParallelTableScanSize, 1)];

        if let Some(mem) = &self.config.maintenance_work_mem {
            settings.push(Statement::set_text(Setting::MaintenanceWorkMem, mem.clone()));
        }
        if let Some(workers) = self.config.max_parallel_maintenance_workers {
            settings.push(Statement::set_integer(
                Setting::MaxParallelMaintenanceWorkers,
                i64::from(workers),
            ));
        }

        settings
    }

    fn build_index(&self, session: &mut dyn Session) -> AnnResult<()> {
        let settings = self.build_settings();
        for statement in &settings {
            session.execute(statement)?;
        }

        info!(
            metric = %self.metric,
            m = self.params.m,
            ef_construction = self.params.ef_construction,
            "creating index"
        );
        let start = Instant::now();
        session.execute(&Statement::CreateIndex {
            table: self.table.clone(),
            metric: self.metric,
            params: self.params,
        })?;
        info!(elapsed_s = start.elapsed().as_secs_f64(), "created index");

        for statement in &settings {
            if let Statement::Set { setting, .. } = statement {
                session.execute(&Statement::Reset { setting: *setting })?;
            }
        }

        info!("vacuum and checkpoint");
        session.execute(&Statement::VacuumAnalyze {
            table: self.table.clone(),
        })?;
        session.execute(&Statement::Checkpoint)?;

        info!("warm cache");
        session.execute(&Statement::Prewarm {
            table: self.table.clone(),
            index: false,
        })?;
        session.execute(&Statement::Prewarm {
            table: self.table.clone(),
            index: true,
        })?;

        Ok(())
    }
}

impl AnnAlgorithm for PgVector {
    fn fit(&mut self, dataset: &Dataset) -> AnnResult<()> {
        match self.state {
            State::Unfitted => {}
            State::Fitted(_) => return Err(AnnError::AlreadyFitted),
            State::Done => return Err(AnnError::Done),
        }

        info!(server = %self.connector.describe(), table = self.table.table(), "fitting");
        let mut session = self.connector.connect()?;

        let built = self
            .load(session.as_mut(), dataset)
            .and_then(|()| self.build_index(session.as_mut()));
        if let Err(e) = built {
            // A retry must not append to rows left by this attempt
            warn!(error = %e, table = self.table.table(), "fit failed; dropping table");
            if let Err(drop_err) = session.execute(&Statement::DropTable {
                table: self.table.clone(),
            }) {
                warn!(error = %drop_err, "could not drop table");
            }
            return Err(e);
        }
        info!("done!");

        self.state = State::Fitted(Fitted {
            session,
            dimensions: dataset.dimensions(),
        });
        Ok(())
    }

    fn set_query_arguments(&mut self, ef_search: u32) -> AnnResult<()> {
        if ef_search == 0 {
            return Err(AnnError::InvalidParameter {
                name: "ef_search",
                reason: "must be positive".to_string(),
            });
        }

        let fitted = require_fitted(&mut self.state)?;
        fitted
            .session
            .execute(&Statement::set_integer(Setting::HnswEfSearch, i64::from(ef_search)))?;
        fitted
            .session
            .execute(&Statement::set_text(Setting::WorkMem, self.config.work_mem.clone()))?;

        debug!(ef_search, "query arguments set");
        self.ef_search = Some(ef_search);
        Ok(())
    }

    fn query(&mut self, vector: &[f32], k: usize) -> AnnResult<Vec<usize>> {
        if k == 0 {
            return Err(AnnError::InvalidParameter {
                name: "k",
                reason: "must be at least 1".to_string(),
            });
        }

        let fitted = require_fitted(&mut self.state)?;
        if vector.len() != fitted.dimensions {
            return Err(AnnError::DimensionalityMismatch {
                expected: fitted.dimensions,
                got: vector.len(),
            });
        }

        let limit = i64::try_from(k).map_err(|_| AnnError::InvalidParameter {
            name: "k",
            reason: format!("{} does not fit a LIMIT", k),
        })?;

        fitted
            .session
            .nearest(&self.query, vector, limit)?
            .into_iter()
            .map(|id| {
                usize::try_from(id).map_err(|_| AnnError::Engine(format!("negative id {} in result", id)))
            })
            .collect()
    }

    fn get_memory_usage(&mut self) -> AnnResult<f64> {
        let fitted = match &mut self.state {
            State::Unfitted => return Ok(0.0),
            State::Done => return Err(AnnError::Done),
            State::Fitted(fitted) => fitted,
        };

        let bytes = fitted.session.relation_size(self.table.index())?;
        Ok(bytes as f64 / 1024.0)
    }

    fn done(&mut self) -> AnnResult<()> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::Fitted(mut fitted) => {
                // The session is released when `fitted` goes out of scope,
                // whether or not the drop succeeds
                fitted.session.execute(&Statement::DropTable {
                    table: self.table.clone(),
                })?;
                info!(table = self.table.table(), "dropped table");
                Ok(())
            }
            State::Unfitted => {
                self.state = State::Unfitted;
                Err(AnnError::NotFitted)
            }
            State::Done => Err(AnnError::Done),
        }
    }

    fn name(&self) -> AnnResult<String> {
        let ef_search = self.ef_search.ok_or(AnnError::QueryArgumentsUnset)?;
        Ok(format!(
            "PGVectorHNSW(m={}, ef_construction={}, ef_search={})",
            self.params.m, self.params.ef_construction, ef_search
        ))
    }
}

impl Drop for PgVector {
    fn drop(&mut self) {
        if let State::Fitted(fitted) = &mut self.state {
            warn!(table = self.table.table(), "adapter dropped without done(); dropping table");
            let statement = Statement::DropTable {
                table: self.table.clone(),
            };
            if let Err(e) = fitted.session.execute(&statement) {
                warn!(error = %e, "could not drop table");
            }
        }
    }
}
