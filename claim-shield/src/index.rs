use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::{
    error::{FraudError, Result},
    model::SimilarCase,
};

/// An embedded case narrative. Owned by the index that stores it.
#[derive(Debug, Clone)]
struct CaseRecord {
    text: String,
    embedding: Vec<f32>,
}

/// Append-only nearest-neighbour store over case embeddings.
///
/// Results are ordered by ascending distance with ties resolved in insertion
/// order. Implementations are free to be approximate; callers rely only on
/// that ordering and on `similarity = 1 / (1 + distance)`.
pub trait SimilarityIndex: Send + Sync {
    /// Dimension every stored and queried embedding must have.
    fn dimension(&self) -> usize;

    fn insert(&self, text: String, embedding: Vec<f32>) -> Result<()>;

    fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SimilarCase>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Brute-force index: every query scans every stored vector.
pub struct ExactIndex {
    dimension: usize,
    records: RwLock<Vec<CaseRecord>>,
}

impl ExactIndex {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(FraudError::InvalidDimension {
                expected: 1,
                actual: 0,
            });
        }
        Ok(Self {
            dimension,
            records: RwLock::new(Vec::new()),
        })
    }

    fn check_embedding(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(FraudError::InvalidDimension {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        if let Some(position) = embedding.iter().position(|x| !x.is_finite()) {
            return Err(FraudError::NonFiniteEmbedding { position });
        }
        Ok(())
    }
}

impl SimilarityIndex for ExactIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn insert(&self, text: String, embedding: Vec<f32>) -> Result<()> {
        self.check_embedding(&embedding)?;
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.push(CaseRecord { text, embedding });
        debug!(total = records.len(), "Inserted case into similarity index");
        Ok(())
    }

    fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SimilarCase>> {
        self.check_embedding(embedding)?;
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);

        let mut scored: Vec<(f64, &CaseRecord)> = records
            .iter()
            .map(|record| (euclidean_distance(embedding, &record.embedding), record))
            .collect();

        // Stable sort keeps insertion order among equal distances.
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, record)| SimilarCase {
                case_text: record.text.clone(),
                similarity: distance_to_similarity(distance),
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Maps a distance onto `(0, 1]`, strictly decreasing in distance.
pub fn distance_to_similarity(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn index_with(cases: &[(&str, [f32; 2])]) -> ExactIndex {
        let index = ExactIndex::new(2).unwrap();
        for (text, embedding) in cases {
            index.insert(text.to_string(), embedding.to_vec()).unwrap();
        }
        index
    }

    #[test]
    fn test_query_orders_by_distance() {
        let index = index_with(&[
            ("far", [10.0, 0.0]),
            ("near", [1.0, 0.0]),
            ("exact", [0.0, 0.0]),
        ]);

        let results = index.query(&[0.0, 0.0], 3).unwrap();
        let texts: Vec<_> = results.iter().map(|r| r.case_text.as_str()).collect();
        assert_eq!(texts, vec!["exact", "near", "far"]);

        assert_eq!(results[0].similarity, 1.0);
        assert_eq!(results[1].similarity, 0.5);
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = index_with(&[("first", [1.0, 0.0]), ("second", [0.0, 1.0])]);
        let results = index.query(&[0.0, 0.0], 2).unwrap();
        assert_eq!(results[0].case_text, "first");
        assert_eq!(results[1].case_text, "second");
        assert_eq!(results[0].similarity, results[1].similarity);
    }

    #[test]
    fn test_fewer_records_than_k() {
        let empty = ExactIndex::new(2).unwrap();
        assert!(empty.query(&[0.0, 0.0], 5).unwrap().is_empty());
        assert!(empty.is_empty());

        let index = index_with(&[("a", [0.0, 0.0]), ("b", [1.0, 1.0])]);
        assert_eq!(index.query(&[0.0, 0.0], 5).unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_inserts_are_both_returned() {
        let index = index_with(&[("other", [5.0, 5.0])]);
        index.insert("dup".to_string(), vec![1.0, 1.0]).unwrap();
        index.insert("dup".to_string(), vec![1.0, 1.0]).unwrap();
        assert_eq!(index.len(), 3);

        let results = index.query(&[1.0, 1.0], 10).unwrap();
        assert_eq!(results.iter().filter(|r| r.case_text == "dup").count(), 2);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let index = index_with(&[("a", [0.0, 0.0])]);
        assert!(matches!(
            index.query(&[0.0, 0.0, 0.0], 1),
            Err(FraudError::InvalidDimension {
                expected: 2,
                actual: 3
            })
        ));
        assert!(matches!(
            index.query(&[], 1),
            Err(FraudError::InvalidDimension { actual: 0, .. })
        ));
        assert!(index.insert("bad".to_string(), vec![1.0]).is_err());
        assert_eq!(index.len(), 1);
        assert!(ExactIndex::new(0).is_err());
    }

    #[test]
    fn test_non_finite_embedding_is_rejected() {
        let index = index_with(&[("a", [0.0, 0.0])]);
        assert!(matches!(
            index.insert("nan".to_string(), vec![0.0, f32::NAN]),
            Err(FraudError::NonFiniteEmbedding { position: 1 })
        ));
        assert!(matches!(
            index.query(&[f32::INFINITY, 0.0], 1),
            Err(FraudError::NonFiniteEmbedding { position: 0 })
        ));
        assert_eq!(index.len(), 1);

        let results = index.query(&[0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].similarity, 1.0);
    }

    #[test]
    fn test_similarity_is_strictly_decreasing() {
        let distances = [0.0, 0.1, 1.0, 2.5, 100.0];
        for pair in distances.windows(2) {
            assert!(distance_to_similarity(pair[0]) > distance_to_similarity(pair[1]));
        }
    }

    #[test]
    fn test_concurrent_queries() {
        let index = Arc::new(index_with(&[("a", [0.0, 0.0]), ("b", [3.0, 4.0])]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let index = index.clone();
                std::thread::spawn(move || index.query(&[3.0, 4.0], 1).unwrap())
            })
            .collect();
        for handle in handles {
            let results = handle.join().unwrap();
            assert_eq!(results[0].case_text, "b");
        }
    }
}
