//! Cosine similarity and the dense, symmetric all-pairs matrix.

use serde::{Deserialize, Serialize};

use crate::vectorizer::{FeatureMatrix, SparseVector};

/// Cosine similarity of two sparse vectors, clamped to `[0, 1]`.
///
/// Zero vectors have similarity 0 with everything.
pub fn cosine(a: &SparseVector, b: &SparseVector) -> f32 {
    let denom = a.norm() * b.norm();
    if denom == 0.0 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(0.0, 1.0) as f32
}

/// Similarity of `vector` against every row of `features`.
pub fn similarity_row(vector: &SparseVector, features: &FeatureMatrix) -> Vec<f32> {
    features.rows().iter().map(|row| cosine(vector, row)).collect()
}

/// Dense square matrix; `(i, j) == (j, i)` and the diagonal is always 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatrix {
    size: usize,
    data: Vec<f32>,
}

impl SimilarityMatrix {
    /// Computes every pair once and mirrors it across the diagonal.
    pub fn from_features(features: &FeatureMatrix) -> Self {
        let size = features.len();
        let rows = features.rows();
        let mut data = vec![0.0f32; size * size];
        for i in 0..size {
            data[i * size + i] = 1.0;
            for j in (i + 1)..size {
                let score = cosine(&rows[i], &rows[j]);
                data[i * size + j] = score;
                data[j * size + i] = score;
            }
        }
        Self { size, data }
    }

    /// Number of rows (and columns).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Entry `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        (i < self.size && j < self.size).then(|| self.data[i * self.size + j])
    }

    /// Row `i`.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        (i < self.size).then(|| &self.data[i * self.size..(i + 1) * self.size])
    }

    /// Writes `scores` into row `i` and column `i`, forcing `(i, i)` to 1.0.
    ///
    /// `scores.len()` must equal `size()`.
    pub(crate) fn set_row_and_column(&mut self, i: usize, scores: &[f32]) {
        debug_assert_eq!(scores.len(), self.size);
        for (j, score) in scores.iter().copied().enumerate() {
            let score = if i == j { 1.0 } else { score };
            self.data[i * self.size + j] = score;
            self.data[j * self.size + i] = score;
        }
    }

    /// Grows the matrix by one row and column; `scores` holds the similarity
    /// against every existing row. The new diagonal entry is 1.0.
    pub(crate) fn push(&mut self, scores: &[f32]) {
        debug_assert_eq!(scores.len(), self.size);
        let old = self.size;
        let size = old + 1;
        let mut data = Vec::with_capacity(size * size);
        for i in 0..old {
            data.extend_from_slice(&self.data[i * old..(i + 1) * old]);
            data.push(scores[i]);
        }
        data.extend_from_slice(scores);
        data.push(1.0);
        self.size = size;
        self.data = data;
    }

    /// Whether every `(i, j)` equals `(j, i)` exactly.
    pub fn is_symmetric(&self) -> bool {
        (0..self.size)
            .all(|i| (i + 1..self.size).all(|j| self.data[i * self.size + j] == self.data[j * self.size + i]))
    }
}
