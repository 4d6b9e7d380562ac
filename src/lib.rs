#![warn(missing_docs)]
//! Content-based product recommendations: TF-IDF features over product text,
//! cosine similarity ranking, snapshot persistence and incremental updates.

pub mod api;
pub mod catalog;
pub mod config;
pub mod corpus;
pub mod model;
pub mod normalizer;
pub mod service;
pub mod similarity;
pub mod store;
pub mod vectorizer;

pub use api::{router, AppState};
pub use catalog::{CategorySource, MemoryProductSource, PgProductSource, ProductSource};
pub use corpus::{CorpusTable, ProductRecord};
pub use model::{Recommendation, RecommenderModel, UpsertKind};
pub use normalizer::{clean_text, combine_features, join_comments, ProductFields};
pub use service::{
    InitOutcome, ProductUpdate, Recommender, RecommenderSettings, RetrainOutcome, UpdateOutcome,
};
pub use store::{ModelStore, StoreError};
pub use vectorizer::{SparseVector, TfidfVectorizer, Vectorizer};
