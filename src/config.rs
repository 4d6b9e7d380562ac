//! Command-line/environment configuration shared by the binaries.

use std::path::PathBuf;

use clap::{Args, Parser};
use tracing_subscriber::{fmt, EnvFilter};

use crate::catalog::{CatalogTables, CategorySource};
use crate::service::RecommenderSettings;
use crate::store::DEFAULT_MODEL_PATH;
use crate::vectorizer::DEFAULT_MAX_FEATURES;

/// Postgres connection and table layout.
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Postgres connection string (postgres://...).
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Schema holding the product tables.
    #[arg(long, env = "RECOMMENDER_SCHEMA", default_value = "public")]
    pub schema: String,

    /// Products table.
    #[arg(long, env = "RECOMMENDER_PRODUCTS_TABLE", default_value = "Product")]
    pub products_table: String,

    /// Reviews table (joined on productId).
    #[arg(long, env = "RECOMMENDER_REVIEWS_TABLE", default_value = "Review")]
    pub reviews_table: String,

    /// Categories table, read when --category-source=name.
    #[arg(long, env = "RECOMMENDER_CATEGORIES_TABLE", default_value = "Category")]
    pub categories_table: String,

    /// Use the raw category id or the joined category name as the category label.
    #[arg(long, env = "RECOMMENDER_CATEGORY_SOURCE", value_enum, default_value_t = CategorySource::Id)]
    pub category_source: CategorySource,
}

impl DatabaseArgs {
    /// Table names as consumed by the Postgres source.
    pub fn tables(&self) -> CatalogTables {
        CatalogTables {
            schema: self.schema.clone(),
            products: self.products_table.clone(),
            reviews: self.reviews_table.clone(),
            categories: self.categories_table.clone(),
        }
    }
}

/// Snapshot location and training knobs.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Snapshot file holding the trained model.
    #[arg(long, env = "RECOMMENDER_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    /// Vocabulary cap for the TF-IDF vectorizer.
    #[arg(long, env = "RECOMMENDER_MAX_FEATURES", default_value_t = DEFAULT_MAX_FEATURES)]
    pub max_features: usize,
}

/// HTTP server configuration.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "recommender-api",
    about = "HTTP API serving content-based product recommendations"
)]
pub struct ServerCli {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "RECOMMENDER_BIND", default_value = "0.0.0.0:5000")]
    pub bind: String,

    /// Postgres connection and table layout.
    #[command(flatten)]
    pub database: DatabaseArgs,

    /// Snapshot location and training knobs.
    #[command(flatten)]
    pub model: ModelArgs,

    /// Neighbor count when the client does not specify one.
    #[arg(long, default_value_t = 5)]
    pub default_neighbors: usize,

    /// Maximum neighbor count allowed per request.
    #[arg(long, default_value_t = 50)]
    pub max_neighbors: usize,

    /// Shared secret for /update, /retrain and /reload (routes are disabled when unset).
    #[arg(long, env = "RECOMMENDER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Always retrain from Postgres at start-up instead of loading the snapshot.
    #[arg(long, env = "RECOMMENDER_TRAIN_ON_START", default_value_t = false)]
    pub train_on_start: bool,
}

impl ServerCli {
    /// Service settings derived from the flags.
    pub fn settings(&self) -> RecommenderSettings {
        RecommenderSettings {
            default_neighbors: self.default_neighbors.max(1),
            max_neighbors: self.max_neighbors.max(1),
            max_features: self.model.max_features.max(1),
        }
    }
}

/// Installs the global `tracing` subscriber (`RUST_LOG`, default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
