//! The trained recommender artifact and its lifecycle operations.
//!
//! A model is the tuple (vectorizer, feature matrix, similarity matrix, corpus table).
//! Row `i` of both matrices always describes row `i` of the corpus table.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::{CorpusTable, ProductRecord};
use crate::similarity::{similarity_row, SimilarityMatrix};
use crate::vectorizer::{FeatureMatrix, TfidfVectorizer, Vectorizer};

/// One ranked neighbor returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Product identifier.
    pub id: String,
    /// Product display name.
    pub title: String,
    /// Category label.
    pub category: String,
    /// Cosine similarity to the queried product.
    pub score: f32,
}

/// How [`RecommenderModel::upsert`] applied a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertKind {
    /// An existing row was overwritten.
    Updated,
    /// A new row was appended.
    Appended,
}

/// Fitted vectorizer plus the matrices derived from the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommenderModel<V = TfidfVectorizer> {
    vectorizer: V,
    features: FeatureMatrix,
    similarity: SimilarityMatrix,
    corpus: CorpusTable,
}

impl<V: Vectorizer> RecommenderModel<V> {
    /// Fits `vectorizer` on `records` and computes the full similarity matrix.
    ///
    /// Returns `None` for an empty corpus instead of training on zero rows.
    pub fn train(records: Vec<ProductRecord>, mut vectorizer: V) -> Option<Self> {
        let corpus = CorpusTable::from_records(records);
        if corpus.is_empty() {
            return None;
        }
        let features = vectorizer.fit_transform(&corpus.documents());
        let similarity = SimilarityMatrix::from_features(&features);
        debug!(
            products = corpus.len(),
            vocabulary = vectorizer.vocabulary_len(),
            "trained recommender model"
        );
        Some(Self {
            vectorizer,
            features,
            similarity,
            corpus,
        })
    }

    /// Applies one changed or new product without refitting the vocabulary.
    ///
    /// Terms the vectorizer has never seen are dropped from the product's vector.
    pub fn upsert(&mut self, record: ProductRecord) -> UpsertKind {
        let vector = self.vectorizer.transform(&record.combined_features);
        match self.corpus.position(&record.id) {
            Some(row) => {
                // The stale self entry is overwritten with 1.0 below.
                let scores = similarity_row(&vector, &self.features);
                self.similarity.set_row_and_column(row, &scores);
                self.features.set_row(row, vector);
                self.corpus.replace(record);
                UpsertKind::Updated
            }
            None => {
                let scores = similarity_row(&vector, &self.features);
                self.similarity.push(&scores);
                self.features.push(vector);
                self.corpus.push(record);
                UpsertKind::Appended
            }
        }
    }
}

impl<V> RecommenderModel<V> {
    /// Top `n` neighbors of `product_id` by descending similarity.
    ///
    /// Ties keep corpus row order. The queried product is excluded by identity, so
    /// another row scoring 1.0 is still returned. Unknown ids yield an empty list.
    pub fn recommend(&self, product_id: &str, n: usize) -> Vec<Recommendation> {
        let Some(row) = self.corpus.position(product_id) else {
            return Vec::new();
        };
        let Some(scores) = self.similarity.row(row) else {
            return Vec::new();
        };
        let mut ranked: Vec<(usize, f32)> = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(idx, _)| *idx != row)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
            .into_iter()
            .take(n)
            .filter_map(|(idx, score)| {
                self.corpus.get(idx).map(|record| Recommendation {
                    id: record.id.clone(),
                    title: record.title.clone(),
                    category: record.category.clone(),
                    score,
                })
            })
            .collect()
    }

    /// Number of products in the model.
    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    /// Whether the model holds no products.
    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    /// Corpus table.
    pub fn corpus(&self) -> &CorpusTable {
        &self.corpus
    }

    /// Feature matrix.
    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    /// Similarity matrix.
    pub fn similarity(&self) -> &SimilarityMatrix {
        &self.similarity
    }

    /// Fitted vectorizer.
    pub fn vectorizer(&self) -> &V {
        &self.vectorizer
    }
}
