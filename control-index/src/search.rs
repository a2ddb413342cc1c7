//! Nearest-neighbour lookup over a loaded collection
//!
//! Small collections are scanned exactly. Larger ones get an HNSW graph
//! built once per load; queries asking for more neighbours than the graph
//! search width fall back to the exact scan.

use std::cmp::Ordering;

use instant_distance::{Builder, HnswMap, Point, Search};

use crate::embedding::cosine_similarity;

/// Candidate list width used for both construction and search
pub const HNSW_EF_SEARCH: usize = 100;

const HNSW_EF_CONSTRUCTION: usize = 100;
const HNSW_SEED: u64 = 0x5eed;

/// HNSW point wrapper, cosine distance
#[derive(Clone, Debug)]
struct VectorPoint(Vec<f32>);

impl Point for VectorPoint {
    fn distance(&self, other: &Self) -> f32 {
        // Cosine distance = 1 - similarity (HNSW finds minimum)
        cosine_distance(&self.0, &other.0)
    }
}

/// One lookup hit: position in the indexed sequence plus its distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Exact or approximate search over a fixed set of vectors
pub struct VectorIndex {
    vectors: Vec<Vec<f32>>,
    hnsw: Option<HnswMap<VectorPoint, usize>>,
}

impl VectorIndex {
    /// Index the given vectors; an HNSW graph is only built above `exact_limit`
    pub fn build(vectors: Vec<Vec<f32>>, exact_limit: usize) -> Self {
        let hnsw = if vectors.len() > exact_limit {
            let points: Vec<VectorPoint> = vectors.iter().cloned().map(VectorPoint).collect();
            let values: Vec<usize> = (0..vectors.len()).collect();
            log::info!("Building HNSW index over {} vectors", vectors.len());
            Some(
                Builder::default()
                    .ef_construction(HNSW_EF_CONSTRUCTION)
                    .ef_search(HNSW_EF_SEARCH)
                    .seed(HNSW_SEED)
                    .build(points, values),
            )
        } else {
            None
        };

        Self { vectors, hnsw }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn is_approximate(&self) -> bool {
        self.hnsw.is_some()
    }

    /// Up to `top_k` neighbours, closest first, ties by position
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<Neighbor> {
        if top_k == 0 || self.vectors.is_empty() {
            return Vec::new();
        }

        let mut hits = match &self.hnsw {
            Some(hnsw) if top_k <= HNSW_EF_SEARCH => {
                let query_point = VectorPoint(query.to_vec());
                let mut search = Search::default();
                hnsw.search(&query_point, &mut search)
                    .take(top_k)
                    .map(|item| Neighbor {
                        position: *item.value,
                        distance: item.distance,
                    })
                    .collect()
            }
            _ => self.linear_search(query),
        };

        hits.sort_by(compare);
        hits.truncate(top_k);
        hits
    }

    fn linear_search(&self, query: &[f32]) -> Vec<Neighbor> {
        self.vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: cosine_distance(query, vector),
            })
            .collect()
    }
}

/// 1 - cosine similarity, in [0, 2]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

fn compare(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .partial_cmp(&b.distance)
        .unwrap_or(Ordering::Equal)
        .then(a.position.cmp(&b.position))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(angle: f32) -> Vec<f32> {
        vec![angle.cos(), angle.sin()]
    }

    #[test]
    fn test_exact_search_orders_by_distance() {
        let index = VectorIndex::build(vec![unit(1.0), unit(0.0), unit(0.5)], 10);
        assert!(!index.is_approximate());

        let hits = index.search(&unit(0.1), 3);
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![1, 2, 0]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_ties_broken_by_position() {
        let index = VectorIndex::build(vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]], 10);
        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits[0].position, 0);
        assert_eq!(hits[1].position, 1);
    }

    #[test]
    fn test_top_k_limits_and_zero() {
        let index = VectorIndex::build(vec![unit(0.0), unit(1.0)], 10);
        assert_eq!(index.search(&unit(0.0), 1).len(), 1);
        assert_eq!(index.search(&unit(0.0), 5).len(), 2);
        assert!(index.search(&unit(0.0), 0).is_empty());
    }

    #[test]
    fn test_hnsw_finds_exact_match() {
        let vectors: Vec<Vec<f32>> = (0..300).map(|i| unit(i as f32 * 0.01)).collect();
        let index = VectorIndex::build(vectors, 16);
        assert!(index.is_approximate());

        let hits = index.search(&unit(1.5), 3);
        assert_eq!(hits[0].position, 150);
        assert!(hits[0].distance < 1e-4);
    }

    #[test]
    fn test_large_top_k_uses_exact_scan() {
        let vectors: Vec<Vec<f32>> = (0..300).map(|i| unit(i as f32 * 0.01)).collect();
        let index = VectorIndex::build(vectors, 16);
        let hits = index.search(&unit(0.0), 250);
        assert_eq!(hits.len(), 250);
        assert_eq!(hits[0].position, 0);
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }
}
