//! # Memory Engine Adapter
//!
//! In-process stand-in for a pgvector server.
//! Interprets typed statements directly and answers k-NN queries by brute
//! force, so results are exact.
//!
//! Good for:
//! - Testing the adapter lifecycle without a database
//! - Ground-truth runs in benchmarks
//!
//! Sessions opened from one `MemoryEngine` (or its clones) share the same
//! tables, like connections to one server. Settings are per session.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::distance::exact_neighbors;
use crate::core::{AnnError, AnnResult, Dataset, HnswParams, Metric};
use crate::ports::{Connector, Session};
use crate::sql::{NearestQuery, Setting, SettingValue, Statement, TableRef};

/// Page size used for relation size estimates
const PAGE_SIZE: usize = 8192;

/// Per-row overhead: tuple header plus line pointer
const TUPLE_OVERHEAD: usize = 32;

/// Size of one neighbour reference in an index element
const NEIGHBOR_SIZE: usize = 6;

struct MemoryIndex {
    name: String,
    metric: Metric,
    params: HnswParams,
}

struct MemoryTable {
    dimensions: usize,
    storage_plain: bool,
    rows: Vec<(i32, Vec<f32>)>,
    indexes: Vec<MemoryIndex>,
}

impl MemoryTable {
    /// Estimated heap size: id + varlena header + floats per row
    fn size_bytes(&self) -> usize {
        let row = TUPLE_OVERHEAD + 4 + 8 + self.dimensions * 4;
        pages(self.rows.len() * row) * PAGE_SIZE
    }

    /// Estimated index size: vector + layer-0 neighbour list per row, plus a metapage
    fn index_size_bytes(&self, index: &MemoryIndex) -> usize {
        let element = TUPLE_OVERHEAD + self.dimensions * 4 + 2 * index.params.m as usize * NEIGHBOR_SIZE;
        (1 + pages(self.rows.len() * element)) * PAGE_SIZE
    }
}

fn pages(bytes: usize) -> usize {
    (bytes + PAGE_SIZE - 1) / PAGE_SIZE
}

#[derive(Default)]
struct EngineState {
    tables: HashMap<String, MemoryTable>,
    executed: Vec<String>,
    failures: Vec<String>,
    sessions_opened: usize,
}

impl EngineState {
    fn record(&mut self, sql: String) -> AnnResult<()> {
        let injected = self.failures.iter().any(|prefix| sql.starts_with(prefix.as_str()));
        self.executed.push(sql.clone());

        if injected {
            return Err(AnnError::Engine(format!("injected failure: {}", sql)));
        }
        Ok(())
    }

    fn table(&self, name: &str) -> AnnResult<&MemoryTable> {
        self.tables
            .get(name)
            .ok_or_else(|| AnnError::Engine(format!("relation \"{}\" does not exist", name)))
    }

    fn table_mut(&mut self, name: &str) -> AnnResult<&mut MemoryTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| AnnError::Engine(format!("relation \"{}\" does not exist", name)))
    }

    fn relation_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
            || self
                .tables
                .values()
                .any(|t| t.indexes.iter().any(|i| i.name == name))
    }

    /// Next free index name: `<base>`, `<base>1`, `<base>2`, ...
    fn unique_index_name(&self, base: &str) -> String {
        if !self.relation_exists(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{}{}", base, n))
            .find(|name| !self.relation_exists(name))
            .unwrap_or_else(|| base.to_string())
    }
}

/// Connector whose sessions share one in-process store
#[derive(Clone, Default)]
pub struct MemoryEngine {
    state: Arc<Mutex<EngineState>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every statement whose SQL starts with `prefix` fail
    pub fn inject_failure(&self, prefix: &str) {
        self.state.lock().failures.push(prefix.to_string());
    }

    /// Forget every injected failure
    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// SQL of every statement attempted so far, in order
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state.lock().tables.contains_key(table)
    }

    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.state.lock().tables.get(table).map(|t| t.rows.len())
    }

    /// Whether the table's vector column was switched to plain storage
    pub fn is_storage_plain(&self, table: &str) -> Option<bool> {
        self.state.lock().tables.get(table).map(|t| t.storage_plain)
    }

    /// `(name, operator class, m, ef_construction)` of each index on `table`
    pub fn indexes(&self, table: &str) -> Vec<(String, &'static str, u32, u32)> {
        self.state
            .lock()
            .tables
            .get(table)
            .map(|t| {
                t.indexes
                    .iter()
                    .map(|i| (i.name.clone(), i.metric.operator_class(), i.params.m, i.params.ef_construction))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.lock().sessions_opened
    }
}

impl Connector for MemoryEngine {
    fn connect(&self) -> AnnResult<Box<dyn Session>> {
        self.state.lock().sessions_opened += 1;
        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
            settings: HashMap::new(),
        }))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// One session on a `MemoryEngine`
pub struct MemorySession {
    state: Arc<Mutex<EngineState>>,
    settings: HashMap<Setting, SettingValue>,
}

impl MemorySession {
    /// Current value of a session setting, if one was `SET`
    pub fn setting(&self, setting: Setting) -> Option<&SettingValue> {
        self.settings.get(&setting)
    }
}

impl Session for MemorySession {
    fn execute(&mut self, statement: &Statement) -> AnnResult<()> {
        let mut state = self.state.lock();
        state.record(statement.sql())?;

        match statement {
            Statement::CreateTable { table, dimensions } => {
                state
                    .tables
                    .entry(table.table().to_string())
                    .or_insert_with(|| MemoryTable {
                        dimensions: *dimensions,
                        storage_plain: false,
                        rows: Vec::new(),
                        indexes: Vec::new(),
                    });
            }
            Statement::SetStoragePlain { table } => {
                state.table_mut(table.table())?.storage_plain = true;
            }
            Statement::Set { setting, value } => {
                self.settings.insert(*setting, value.clone());
            }
            Statement::Reset { setting } => {
                self.settings.remove(setting);
            }
            Statement::CreateIndex { table, metric, params } => {
                state.table(table.table())?;
                let name = state.unique_index_name(table.index());
                state.table_mut(table.table())?.indexes.push(MemoryIndex {
                    name,
                    metric: *metric,
                    params: *params,
                });
            }
            Statement::VacuumAnalyze { table } => {
                state.table(table.table())?;
            }
            Statement::Checkpoint => {}
            Statement::Prewarm { table, index } => {
                let relation = if *index { table.index() } else { table.table() };
                if !state.relation_exists(relation) {
                    return Err(AnnError::Engine(format!("relation \"{}\" does not exist", relation)));
                }
            }
            Statement::DropTable { table } => {
                if state.tables.remove(table.table()).is_none() {
                    return Err(AnnError::Engine(format!(
                        "table \"{}\" does not exist",
                        table.table()
                    )));
                }
            }
        }

        Ok(())
    }

    fn copy_dataset(&mut self, table: &TableRef, dataset: &Dataset) -> AnnResult<u64> {
        let mut state = self.state.lock();
        state.record(table.copy_in())?;

        let target = state.table_mut(table.table())?;
        if dataset.dimensions() != target.dimensions {
            return Err(AnnError::Engine(format!(
                "expected {} dimensions, not {}",
                target.dimensions,
                dataset.dimensions()
            )));
        }

        let mut written = 0u64;
        for (id, row) in dataset.iter() {
            let id = i32::try_from(id)
                .map_err(|_| AnnError::Engine(format!("integer out of range: {}", id)))?;
            target.rows.push((id, row.to_vec()));
            written += 1;
        }
        Ok(written)
    }

    fn nearest(&mut self, query: &NearestQuery, vector: &[f32], limit: i64) -> AnnResult<Vec<i32>> {
        let mut state = self.state.lock();
        state.record(query.sql().to_string())?;

        let limit = usize::try_from(limit)
            .map_err(|_| AnnError::Engine("LIMIT must not be negative".to_string()))?;
        let table = state.table(query.table().table())?;
        if vector.len() != table.dimensions {
            return Err(AnnError::Engine(format!(
                "different vector dimensions {} and {}",
                table.dimensions,
                vector.len()
            )));
        }

        let rows = table
            .rows
            .iter()
            .enumerate()
            .map(|(pos, (_, v))| (pos, v.as_slice()));

        Ok(exact_neighbors(query.metric(), rows, vector, limit)
            .into_iter()
            .map(|(pos, _)| table.rows[pos].0)
            .collect())
    }

    fn relation_size(&mut self, relation: &str) -> AnnResult<i64> {
        let mut state = self.state.lock();
        state.record(crate::sql::relation_size_sql(relation))?;

        if let Some(table) = state.tables.get(relation) {
            return Ok(table.size_bytes() as i64);
        }
        for table in state.tables.values() {
            if let Some(index) = table.indexes.iter().find(|i| i.name == relation) {
                return Ok(table.index_size_bytes(index) as i64);
            }
        }

        Err(AnnError::Engine(format!("relation \"{}\" does not exist", relation)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> TableRef {
        TableRef::new("items").unwrap()
    }

    fn session_with_rows(engine: &MemoryEngine, rows: &[Vec<f32>]) -> Box<dyn Session> {
        let mut session = engine.connect().unwrap();
        let dataset = Dataset::from_rows(rows).unwrap();
        session
            .execute(&Statement::CreateTable { table: items(), dimensions: dataset.dimensions() })
            .unwrap();
        session.copy_dataset(&items(), &dataset).unwrap();
        session
    }

    #[test]
    fn test_memory_engine_create_is_idempotent() {
        let engine = MemoryEngine::new();
        let mut session = engine.connect().unwrap();

        let create = Statement::CreateTable { table: items(), dimensions: 3 };
        session.execute(&create).unwrap();
        session.execute(&create).unwrap();

        assert!(engine.has_table("items"));
        assert_eq!(engine.row_count("items"), Some(0));
    }

    #[test]
    fn test_memory_engine_copy_checks_dimensions() {
        let engine = MemoryEngine::new();
        let mut session = engine.connect().unwrap();
        session
            .execute(&Statement::CreateTable { table: items(), dimensions: 3 })
            .unwrap();

        let dataset = Dataset::from_rows(&[vec![1.0, 2.0]]).unwrap();
        let result = session.copy_dataset(&items(), &dataset);

        assert!(matches!(result, Err(AnnError::Engine(_))));
        assert_eq!(engine.row_count("items"), Some(0));
    }

    #[test]
    fn test_memory_engine_nearest_is_exact() {
        let engine = MemoryEngine::new();
        let mut session = session_with_rows(
            &engine,
            &[vec![0.0, 0.0], vec![3.0, 0.0], vec![1.0, 0.0], vec![2.0, 0.0]],
        );

        let query = NearestQuery::new(items(), Metric::Euclidean);
        let ids = session.nearest(&query, &[0.0, 0.0], 3).unwrap();

        assert_eq!(ids, vec![0, 2, 3]);
    }

    #[test]
    fn test_memory_engine_nearest_rejects_wrong_dimensions() {
        let engine = MemoryEngine::new();
        let mut session = session_with_rows(&engine, &[vec![0.0, 0.0]]);

        let query = NearestQuery::new(items(), Metric::Angular);
        assert!(session.nearest(&query, &[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_memory_engine_index_naming_and_size() {
        let engine = MemoryEngine::new();
        let rows: Vec<Vec<f32>> = (0..100).map(|i| vec![i as f32; 8]).collect();
        let mut session = session_with_rows(&engine, &rows);

        let params = HnswParams::new(16, 64).unwrap();
        let index = Statement::CreateIndex { table: items(), metric: Metric::Angular, params };
        session.execute(&index).unwrap();
        session.execute(&index).unwrap();

        let names: Vec<String> = engine.indexes("items").into_iter().map(|i| i.0).collect();
        assert_eq!(names, vec!["items_embedding_idx", "items_embedding_idx1"]);

        // 100 * (32 + 32 + 192) = 25600 bytes = 4 pages, plus the metapage
        assert_eq!(session.relation_size("items_embedding_idx").unwrap(), 5 * 8192);
        assert!(session.relation_size("items").unwrap() > 0);
        assert!(session.relation_size("missing_idx").is_err());
    }

    #[test]
    fn test_memory_engine_drop_removes_indexes() {
        let engine = MemoryEngine::new();
        let mut session = session_with_rows(&engine, &[vec![1.0, 0.0]]);
        let params = HnswParams::new(4, 8).unwrap();
        session
            .execute(&Statement::CreateIndex { table: items(), metric: Metric::Euclidean, params })
            .unwrap();

        session.execute(&Statement::DropTable { table: items() }).unwrap();

        assert!(!engine.has_table("items"));
        assert!(session.relation_size("items_embedding_idx").is_err());
        assert!(session.execute(&Statement::DropTable { table: items() }).is_err());
    }

    #[test]
    fn test_memory_session_settings() {
        let engine = MemoryEngine::new();
        let mut session = MemorySession {
            state: Arc::clone(&engine.state),
            settings: HashMap::new(),
        };

        session
            .execute(&Statement::set_integer(Setting::HnswEfSearch, 40))
            .unwrap();
        assert_eq!(session.setting(Setting::HnswEfSearch), Some(&SettingValue::Integer(40)));

        session
            .execute(&Statement::Reset { setting: Setting::HnswEfSearch })
            .unwrap();
        assert_eq!(session.setting(Setting::HnswEfSearch), None);
    }

    #[test]
    fn test_memory_engine_injected_failure() {
        let engine = MemoryEngine::new();
        engine.inject_failure("CHECKPOINT");
        let mut session = engine.connect().unwrap();

        let result = session.execute(&Statement::Checkpoint);
        assert!(matches!(result, Err(AnnError::Engine(_))));
        assert_eq!(engine.executed(), vec!["CHECKPOINT"]);
    }
}
