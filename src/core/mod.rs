//! # Core
//!
//! Pure domain types: no I/O beyond reading a config file.
//!
//! - `Metric` - which distance the benchmark runs under
//! - `HnswParams` - build-time index parameters
//! - `Dataset` - the immutable training vectors
//! - `distance` - brute-force distances for ground truth
//! - `config` - connection and table settings
//! - `error` - the crate error type

pub mod config;
pub mod distance;
pub mod error;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use error::{AnnError, AnnResult};

// ============================================================================
// METRIC
// ============================================================================

/// Similarity metric, fixed for the lifetime of an adapter
///
/// Selects both the ordering operator used by queries and the operator
/// class the index is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine distance
    Angular,
    /// L2 distance
    Euclidean,
}

impl Metric {
    /// Name used by the benchmark harness
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Angular => "angular",
            Metric::Euclidean => "euclidean",
        }
    }

    /// pgvector ordering operator
    pub fn operator(&self) -> &'static str {
        match self {
            Metric::Angular => "<=>",
            Metric::Euclidean => "<->",
        }
    }

    /// pgvector operator class for an HNSW index
    pub fn operator_class(&self) -> &'static str {
        match self {
            Metric::Angular => "vector_cosine_ops",
            Metric::Euclidean => "vector_l2_ops",
        }
    }
}

impl FromStr for Metric {
    type Err = AnnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "angular" => Ok(Metric::Angular),
            "euclidean" => Ok(Metric::Euclidean),
            other => Err(AnnError::UnsupportedMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// HNSW PARAMETERS
// ============================================================================

/// Build-time HNSW parameters
///
/// Deserialises from the harness's `{"M": 16, "efConstruction": 64}` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Max connections per graph node
    #[serde(rename = "M")]
    pub m: u32,

    /// Candidate list size during build
    #[serde(rename = "efConstruction")]
    pub ef_construction: u32,
}

impl HnswParams {
    /// Create parameters, rejecting zeros
    pub fn new(m: u32, ef_construction: u32) -> AnnResult<Self> {
        let params = Self { m, ef_construction };
        params.validate()?;
        Ok(params)
    }

    /// Parse the harness's JSON parameter object
    pub fn from_json(json: &str) -> AnnResult<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> AnnResult<()> {
        if self.m == 0 {
            return Err(AnnError::InvalidParameter {
                name: "M",
                reason: "must be positive".to_string(),
            });
        }
        if self.ef_construction == 0 {
            return Err(AnnError::InvalidParameter {
                name: "efConstruction",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// DATASET
// ============================================================================

/// Immutable training set; a row's id is its position
///
/// Rows are stored contiguously: `[r0_d0, r0_d1, ..., r1_d0, ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    dimensions: usize,
    data: Vec<f32>,
}

impl Dataset {
    /// Build from row vectors, checking they are non-empty and equal length
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> AnnResult<Self> {
        let first = rows.first().ok_or(AnnError::EmptyDataset)?;
        let dimensions = first.as_ref().len();

        let mut data = Vec::with_capacity(rows.len() * dimensions);
        for row in rows {
            let row = row.as_ref();
            if row.len() != dimensions {
                return Err(AnnError::DimensionalityMismatch {
                    expected: dimensions,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }

        Self::from_flat(dimensions, data)
    }

    /// Build from a flat row-major buffer
    pub fn from_flat(dimensions: usize, data: Vec<f32>) -> AnnResult<Self> {
        if dimensions == 0 {
            return Err(AnnError::InvalidParameter {
                name: "dimensions",
                reason: "must be positive".to_string(),
            });
        }
        if data.is_empty() {
            return Err(AnnError::EmptyDataset);
        }
        if data.len() % dimensions != 0 {
            return Err(AnnError::InvalidParameter {
                name: "data",
                reason: format!("length {} is not a multiple of {}", data.len(), dimensions),
            });
        }

        let rows = data.len() / dimensions;
        if i32::try_from(rows).is_err() {
            return Err(AnnError::InvalidParameter {
                name: "data",
                reason: format!("{} rows do not fit an int id column", rows),
            });
        }

        Ok(Self { dimensions, data })
    }

    /// Vector dimensionality
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.data.len() / self.dimensions
    }

    /// Always false for a constructed dataset
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row by id
    pub fn row(&self, id: usize) -> Option<&[f32]> {
        let start = id.checked_mul(self.dimensions)?;
        let end = start.checked_add(self.dimensions)?;
        self.data.get(start..end)
    }

    /// `(id, row)` pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[f32])> + '_ {
        self.data.chunks_exact(self.dimensions).enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_parse() {
        assert_eq!("angular".parse::<Metric>().unwrap(), Metric::Angular);
        assert_eq!("euclidean".parse::<Metric>().unwrap(), Metric::Euclidean);

        match "manhattan".parse::<Metric>() {
            Err(AnnError::UnsupportedMetric(m)) => assert_eq!(m, "manhattan"),
            other => panic!("Expected UnsupportedMetric, got {:?}", other),
        }
    }

    #[test]
    fn test_metric_operators() {
        assert_eq!(Metric::Angular.operator(), "<=>");
        assert_eq!(Metric::Angular.operator_class(), "vector_cosine_ops");
        assert_eq!(Metric::Euclidean.operator(), "<->");
        assert_eq!(Metric::Euclidean.operator_class(), "vector_l2_ops");
    }

    #[test]
    fn test_hnsw_params_from_harness_json() {
        let params = HnswParams::from_json(r#"{"M": 16, "efConstruction": 200}"#).unwrap();
        assert_eq!(params, HnswParams { m: 16, ef_construction: 200 });
    }

    #[test]
    fn test_hnsw_params_reject_zero() {
        assert!(matches!(
            HnswParams::new(0, 100),
            Err(AnnError::InvalidParameter { name: "M", .. })
        ));
        assert!(matches!(
            HnswParams::from_json(r#"{"M": 8, "efConstruction": 0}"#),
            Err(AnnError::InvalidParameter { name: "efConstruction", .. })
        ));
    }

    #[test]
    fn test_dataset_from_rows() {
        let ds = Dataset::from_rows(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();

        assert_eq!(ds.dimensions(), 2);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.row(1), Some(&[1.0, 0.0][..]));
        assert_eq!(ds.row(3), None);
        assert_eq!(ds.row(usize::MAX / 2), None);
        assert_eq!(ds.row(usize::MAX), None);

        let ids: Vec<usize> = ds.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_dataset_rejects_ragged_and_empty() {
        let empty: Vec<Vec<f32>> = Vec::new();
        assert!(matches!(Dataset::from_rows(&empty), Err(AnnError::EmptyDataset)));

        match Dataset::from_rows(&[vec![1.0, 2.0], vec![1.0]]) {
            Err(AnnError::DimensionalityMismatch { expected, got }) => {
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            other => panic!("Expected DimensionalityMismatch, got {:?}", other),
        }

        assert!(Dataset::from_flat(3, vec![1.0; 4]).is_err());
    }
}
