//! # Distance
//!
//! The two distances pgvector orders by, and a brute-force k-NN used for
//! ground truth and by the in-memory engine.

use std::cmp::Ordering;

use super::{Dataset, Metric};

/// Euclidean distance, as pgvector's `<->`
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Cosine distance, as pgvector's `<=>`
///
/// `1 - cos(a, b)`. A zero vector has no direction, so the distance is NaN,
/// which is what the server returns too.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = (norm_a * norm_b).sqrt();
    if denom == 0.0 {
        return f32::NAN;
    }

    // Clamp so rounding never yields a distance outside [0, 2]
    1.0 - (dot / denom).clamp(-1.0, 1.0)
}

/// Distance under a metric
pub fn distance(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Angular => cosine_distance(a, b),
        Metric::Euclidean => l2_distance(a, b),
    }
}

/// Exact k nearest rows of `rows` to `query`, nearest first
///
/// Ties keep insertion order; NaN distances sort last.
pub fn exact_neighbors<'a, I>(metric: Metric, rows: I, query: &[f32], k: usize) -> Vec<(usize, f32)>
where
    I: IntoIterator<Item = (usize, &'a [f32])>,
{
    let mut scored: Vec<(usize, f32)> = rows
        .into_iter()
        .map(|(id, row)| (id, distance(metric, row, query)))
        .collect();

    scored.sort_by(|a, b| compare_distance(a.1, b.1));
    scored.truncate(k);
    scored
}

/// Ground truth for a whole query set against a dataset
pub fn ground_truth(metric: Metric, dataset: &Dataset, queries: &[Vec<f32>], k: usize) -> Vec<Vec<usize>> {
    queries
        .iter()
        .map(|q| {
            exact_neighbors(metric, dataset.iter(), q, k)
                .into_iter()
                .map(|(id, _)| id)
                .collect()
        })
        .collect()
}

fn compare_distance(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_distance() {
        let d = l2_distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_range() {
        assert!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_zero_vector_is_nan() {
        assert!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]).is_nan());
    }

    #[test]
    fn test_exact_neighbors_order_and_ties() {
        let rows: Vec<Vec<f32>> = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0], vec![5.0, 5.0]];
        let found = exact_neighbors(
            Metric::Euclidean,
            rows.iter().enumerate().map(|(i, r)| (i, r.as_slice())),
            &[0.0, 0.0],
            3,
        );

        let ids: Vec<usize> = found.iter().map(|(id, _)| *id).collect();
        // 1 and 2 are equidistant; insertion order decides
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_exact_neighbors_nan_last() {
        let rows: Vec<Vec<f32>> = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let found = exact_neighbors(
            Metric::Angular,
            rows.iter().enumerate().map(|(i, r)| (i, r.as_slice())),
            &[1.0, 0.0],
            2,
        );

        assert_eq!(found[0].0, 1);
        assert!(found[1].1.is_nan());
    }
}
