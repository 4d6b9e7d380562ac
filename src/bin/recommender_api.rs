use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use product_recommender::config::{init_tracing, ServerCli};
use product_recommender::{
    router, AppState, InitOutcome, ModelStore, PgProductSource, Recommender, RetrainOutcome,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = ServerCli::parse();
    let settings = cli.settings();

    let source = PgProductSource::connect(
        &cli.database.database_url,
        &cli.database.tables(),
        cli.database.category_source,
    )
    .await?;
    let recommender = Arc::new(Recommender::new(
        Arc::new(source),
        ModelStore::new(&cli.model.model_path),
        settings,
    ));

    if cli.train_on_start {
        let outcome = recommender.retrain().await.context("start-up retrain failed")?;
        info!(?outcome, "trained at start-up");
    } else {
        match recommender.initialize().await.context("model initialization failed")? {
            InitOutcome::Loaded { products } => info!(products, "serving snapshot"),
            InitOutcome::Trained(RetrainOutcome::EmptyCorpus) => {
                warn!("no products in source; recommendations stay empty until /retrain")
            }
            InitOutcome::Trained(outcome) => info!(?outcome, "trained at start-up"),
        }
    }
    if cli.api_key.is_none() {
        warn!("RECOMMENDER_API_KEY not set; /update, /retrain and /reload are disabled");
    }

    let app = router(AppState::new(recommender, cli.api_key));
    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("recommender-api listening on http://{addr}");
    axum::serve(listener, app).await.context("server shutdown")?;
    Ok(())
}
