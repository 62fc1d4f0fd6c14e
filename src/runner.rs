//! # Runner
//!
//! Drives any `AnnAlgorithm` through one harness run: fit once, then for
//! each `ef_search` value set query arguments, time every query and score
//! recall against brute-force ground truth. `done` is always called, even
//! when a step fails.

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::core::distance::ground_truth;
use crate::core::{AnnError, AnnResult, Dataset, Metric};
use crate::ports::AnnAlgorithm;

/// Results for one `ef_search` setting
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub name: String,
    pub ef_search: u32,
    pub k: usize,
    pub queries: usize,
    pub build_time_s: f64,
    pub index_size_kib: f64,
    pub mean_query_ms: f64,
    pub p50_query_ms: f64,
    pub p99_query_ms: f64,
    pub qps: f64,
    pub recall: f64,
}

/// What to run
pub struct Sweep<'a> {
    pub metric: Metric,
    pub train: &'a Dataset,
    pub queries: &'a [Vec<f32>],
    pub k: usize,
    pub ef_search: &'a [u32],
}

/// Fraction of `truth` present in `found`
pub fn recall(found: &[usize], truth: &[usize]) -> f64 {
    if truth.is_empty() {
        return 1.0;
    }
    let truth: HashSet<usize> = truth.iter().copied().collect();
    let hits = found.iter().filter(|id| truth.contains(id)).count();
    hits as f64 / truth.len() as f64
}

/// Value at percentile `p` (0..=100) of an ascending slice
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Run a sweep, then call `done` on the algorithm
pub fn run_sweep(algo: &mut dyn AnnAlgorithm, sweep: &Sweep<'_>) -> AnnResult<Vec<RunReport>> {
    if sweep.queries.is_empty() {
        return Err(AnnError::InvalidParameter {
            name: "queries",
            reason: "at least one query is required".to_string(),
        });
    }
    if sweep.ef_search.is_empty() {
        return Err(AnnError::InvalidParameter {
            name: "ef_search",
            reason: "at least one value is required".to_string(),
        });
    }

    let result = run_fitted(algo, sweep);
    // NotFitted: fit failed before a session was kept
    let finished = match algo.done() {
        Ok(()) | Err(AnnError::NotFitted) => Ok(()),
        Err(e) => Err(e),
    };

    let reports = result?;
    finished?;
    Ok(reports)
}

fn run_fitted(algo: &mut dyn AnnAlgorithm, sweep: &Sweep<'_>) -> AnnResult<Vec<RunReport>> {
    let truth = ground_truth(sweep.metric, sweep.train, sweep.queries, sweep.k);

    let start = Instant::now();
    algo.fit(sweep.train)?;
    let build_time_s = start.elapsed().as_secs_f64();
    let index_size_kib = algo.get_memory_usage()?;
    info!(build_time_s, index_size_kib, "index built");

    let mut reports = Vec::with_capacity(sweep.ef_search.len());
    for &ef_search in sweep.ef_search {
        algo.set_query_arguments(ef_search)?;

        let mut latencies_ms = Vec::with_capacity(sweep.queries.len());
        let mut total_recall = 0.0;
        let run_start = Instant::now();
        for (query, expected) in sweep.queries.iter().zip(truth.iter()) {
            let q_start = Instant::now();
            let found = algo.query(query, sweep.k)?;
            latencies_ms.push(q_start.elapsed().as_secs_f64() * 1000.0);
            total_recall += recall(&found, expected);
        }
        let run_time_s = run_start.elapsed().as_secs_f64();

        latencies_ms.sort_by(|a, b| a.total_cmp(b));
        let n = sweep.queries.len() as f64;
        let report = RunReport {
            name: algo.name()?,
            ef_search,
            k: sweep.k,
            queries: sweep.queries.len(),
            build_time_s,
            index_size_kib,
            mean_query_ms: latencies_ms.iter().sum::<f64>() / n,
            p50_query_ms: percentile(&latencies_ms, 50.0),
            p99_query_ms: percentile(&latencies_ms, 99.0),
            qps: if run_time_s > 0.0 { n / run_time_s } else { f64::INFINITY },
            recall: total_recall / n,
        };
        info!(name = %report.name, recall = report.recall, qps = report.qps, "run finished");
        reports.push(report);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryEngine;
    use crate::core::config::PgVectorConfig;
    use crate::core::HnswParams;
    use crate::engine::PgVector;

    #[test]
    fn test_recall() {
        assert_eq!(recall(&[1, 2, 3], &[3, 2, 1]), 1.0);
        assert_eq!(recall(&[1, 9], &[1, 2]), 0.5);
        assert_eq!(recall(&[], &[1]), 0.0);
        assert_eq!(recall(&[], &[]), 1.0);
    }

    #[test]
    fn test_percentile() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 50.0), 3.0);
        assert_eq!(percentile(&sorted, 100.0), 5.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_sweep_on_exact_engine() {
        let engine = MemoryEngine::new();
        let mut adapter = PgVector::with_connector(
            "euclidean",
            HnswParams::new(16, 64).unwrap(),
            PgVectorConfig::default(),
            Box::new(engine.clone()),
        )
        .unwrap();

        let rows: Vec<Vec<f32>> = (0..50).map(|i| vec![i as f32, (i % 7) as f32]).collect();
        let train = Dataset::from_rows(&rows).unwrap();
        let queries = vec![vec![3.2, 1.0], vec![40.0, 6.0]];

        let reports = run_sweep(
            &mut adapter,
            &Sweep {
                metric: Metric::Euclidean,
                train: &train,
                queries: &queries,
                k: 5,
                ef_search: &[10, 40],
            },
        )
        .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "PGVectorHNSW(m=16, ef_construction=64, ef_search=10)");
        assert_eq!(reports[1].ef_search, 40);
        for report in &reports {
            assert_eq!(report.recall, 1.0);
            assert!(report.index_size_kib > 0.0);
        }
        // done() ran
        assert!(!engine.has_table("items"));
    }

    #[test]
    fn test_sweep_calls_done_on_failure() {
        let engine = MemoryEngine::new();
        engine.inject_failure("SET hnsw.ef_search");
        let mut adapter = PgVector::with_connector(
            "angular",
            HnswParams::new(4, 16).unwrap(),
            PgVectorConfig::default(),
            Box::new(engine.clone()),
        )
        .unwrap();

        let train = Dataset::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let queries = vec![vec![1.0, 0.0]];
        let result = run_sweep(
            &mut adapter,
            &Sweep {
                metric: Metric::Angular,
                train: &train,
                queries: &queries,
                k: 1,
                ef_search: &[10],
            },
        );

        assert!(matches!(result, Err(AnnError::Engine(_))));
        assert!(!engine.has_table("items"));
    }
}
