//! Model lifecycle service: initialize, query, incremental update, full retrain.
//!
//! The live model sits behind an `RwLock` so queries never wait on disk I/O. Every
//! mutation runs under a single writer mutex: load the snapshot, mutate it, persist it,
//! then publish it. A failed save leaves memory and disk on the old model.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::catalog::ProductSource;
use crate::corpus::ProductRecord;
use crate::model::{Recommendation, RecommenderModel, UpsertKind};
use crate::normalizer::ProductFields;
use crate::store::ModelStore;
use crate::vectorizer::{TfidfVectorizer, Vectorizer, DEFAULT_MAX_FEATURES};

/// Tunables for [`Recommender`].
#[derive(Debug, Clone, Copy)]
pub struct RecommenderSettings {
    /// Neighbor count used when a caller asks for none (or zero).
    pub default_neighbors: usize,
    /// Upper bound on neighbors per query.
    pub max_neighbors: usize,
    /// Vocabulary cap for retraining.
    pub max_features: usize,
}

impl Default for RecommenderSettings {
    fn default() -> Self {
        Self {
            default_neighbors: 5,
            max_neighbors: 50,
            max_features: DEFAULT_MAX_FEATURES,
        }
    }
}

/// Changed product fields submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    /// Product identifier.
    pub id: String,
    /// New title.
    pub title: String,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New category label.
    #[serde(default)]
    pub category: Option<String>,
}

/// Result of [`Recommender::update_product`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// Existing row overwritten.
    Updated,
    /// New row appended.
    Appended,
    /// No trained model exists yet; a full retrain is required.
    NoModel,
    /// The product source does not know the id.
    ProductNotFound,
}

impl From<UpsertKind> for UpdateOutcome {
    fn from(kind: UpsertKind) -> Self {
        match kind {
            UpsertKind::Updated => Self::Updated,
            UpsertKind::Appended => Self::Appended,
        }
    }
}

/// Result of [`Recommender::retrain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrainOutcome {
    /// A new model was trained and persisted.
    Trained {
        /// Products in the model.
        products: usize,
        /// Fitted vocabulary size.
        vocabulary: usize,
    },
    /// The source returned no products; the live model was cleared.
    EmptyCorpus,
}

/// Result of [`Recommender::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Snapshot loaded from disk.
    Loaded {
        /// Products in the model.
        products: usize,
    },
    /// No snapshot; trained from the source.
    Trained(RetrainOutcome),
}

/// Point-in-time description of the live model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelStatus {
    /// Products in the model (0 when absent).
    pub products: usize,
    /// Fitted vocabulary size (0 when absent).
    pub vocabulary: usize,
    /// Whether a model is loaded.
    pub ready: bool,
}

/// Owns the live model and serializes every mutation of it.
pub struct Recommender {
    source: Arc<dyn ProductSource>,
    store: ModelStore,
    settings: RecommenderSettings,
    live: RwLock<Option<Arc<RecommenderModel>>>,
    writer: Mutex<()>,
}

impl Recommender {
    /// Builds a service with no live model; call [`Recommender::initialize`] next.
    pub fn new(
        source: Arc<dyn ProductSource>,
        store: ModelStore,
        settings: RecommenderSettings,
    ) -> Self {
        Self {
            source,
            store,
            settings,
            live: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    /// Effective settings.
    pub fn settings(&self) -> RecommenderSettings {
        self.settings
    }

    /// Loads the snapshot, or trains from the source when there is none.
    pub async fn initialize(&self) -> Result<InitOutcome> {
        if let Some(products) = self.reload().await? {
            return Ok(InitOutcome::Loaded { products });
        }
        info!("no snapshot found; training from product source");
        Ok(InitOutcome::Trained(self.retrain().await?))
    }

    /// Replaces the live model with the on-disk snapshot.
    ///
    /// Returns the product count, or `None` (live model untouched) when no snapshot exists.
    pub async fn reload(&self) -> Result<Option<usize>> {
        let _guard = self.writer.lock().await;
        let Some(model) = self.load_snapshot().await? else {
            return Ok(None);
        };
        let products = model.len();
        *self.live.write().await = Some(Arc::new(model));
        info!(products, "loaded recommender snapshot");
        Ok(Some(products))
    }

    /// Ranked neighbors of `product_id`.
    ///
    /// `n` defaults when absent or zero and is capped by the settings. Returns an empty
    /// list when there is no model or the id is unknown.
    pub async fn recommend(&self, product_id: &str, n: Option<usize>) -> Vec<Recommendation> {
        let n = match n {
            Some(n) if n > 0 => n,
            _ => self.settings.default_neighbors,
        }
        .min(self.settings.max_neighbors);
        match self.current().await {
            Some(model) => model.recommend(product_id, n),
            None => Vec::new(),
        }
    }

    /// Applies one product change to the persisted model without refitting the vocabulary.
    ///
    /// The snapshot on disk is the base, so a model written by another process (for
    /// example `recommender-train`) is updated rather than overwritten. Review comments
    /// are read from the product source; the other fields come from `update`.
    pub async fn update_product(&self, update: ProductUpdate) -> Result<UpdateOutcome> {
        let _guard = self.writer.lock().await;
        let Some(mut model) = self.load_snapshot().await? else {
            warn!(product_id = %update.id, "update rejected: no persisted model");
            return Ok(UpdateOutcome::NoModel);
        };
        let Some(stored) = self.source.fetch_one(&update.id).await? else {
            warn!(product_id = %update.id, "update rejected: product not found");
            return Ok(UpdateOutcome::ProductNotFound);
        };
        let record = ProductRecord::from_fields(
            update.id,
            ProductFields {
                title: update.title,
                description: update.description,
                category: update.category,
                comments: stored.comments,
            },
        );
        let product_id = record.id.clone();
        let store = self.store.clone();
        let (model, kind) = tokio::task::spawn_blocking(move || {
            let kind = model.upsert(record);
            store.save(&model).map(|()| (model, kind))
        })
        .await
        .map_err(|err| anyhow!("update task join error: {err}"))?
        .context("failed to persist updated model")?;
        *self.live.write().await = Some(Arc::new(model));
        info!(%product_id, ?kind, "applied incremental update");
        Ok(kind.into())
    }

    /// Refetches the whole corpus, rebuilds the model and overwrites the snapshot.
    pub async fn retrain(&self) -> Result<RetrainOutcome> {
        let _guard = self.writer.lock().await;
        let records = self
            .source
            .fetch_all()
            .await
            .context("failed to fetch product corpus")?;
        let max_features = self.settings.max_features;
        let store = self.store.clone();
        let trained = tokio::task::spawn_blocking(move || -> Result<Option<RecommenderModel>> {
            let Some(model) = RecommenderModel::train(records, TfidfVectorizer::new(max_features))
            else {
                store.clear().context("failed to remove stale snapshot")?;
                return Ok(None);
            };
            store.save(&model).context("failed to persist trained model")?;
            Ok(Some(model))
        })
        .await
        .map_err(|err| anyhow!("training task join error: {err}"))??;

        let outcome = match trained {
            Some(model) => {
                let outcome = RetrainOutcome::Trained {
                    products: model.len(),
                    vocabulary: model.vectorizer().vocabulary_len(),
                };
                *self.live.write().await = Some(Arc::new(model));
                outcome
            }
            None => {
                warn!("product source is empty; no model trained");
                *self.live.write().await = None;
                RetrainOutcome::EmptyCorpus
            }
        };
        info!(?outcome, "retrain finished");
        Ok(outcome)
    }

    /// Size of the live model.
    pub async fn status(&self) -> ModelStatus {
        match self.current().await {
            Some(model) => ModelStatus {
                products: model.len(),
                vocabulary: model.vectorizer().vocabulary_len(),
                ready: true,
            },
            None => ModelStatus {
                products: 0,
                vocabulary: 0,
                ready: false,
            },
        }
    }

    async fn load_snapshot(&self) -> Result<Option<RecommenderModel>> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.load::<TfidfVectorizer>())
            .await
            .map_err(|err| anyhow!("snapshot load task join error: {err}"))?
            .with_context(|| format!("failed to load snapshot {}", self.store.path().display()))
    }

    async fn current(&self) -> Option<Arc<RecommenderModel>> {
        self.live.read().await.clone()
    }
}
