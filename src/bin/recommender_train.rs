use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use product_recommender::config::{init_tracing, DatabaseArgs, ModelArgs};
use product_recommender::{
    ModelStore, PgProductSource, Recommender, RecommenderSettings, RetrainOutcome,
};

#[derive(Parser, Debug)]
#[command(
    name = "recommender-train",
    about = "Rebuild the recommendation model from Postgres and overwrite the snapshot"
)]
struct TrainCli {
    #[command(flatten)]
    database: DatabaseArgs,

    #[command(flatten)]
    model: ModelArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = TrainCli::parse();
    let source = PgProductSource::connect(
        &cli.database.database_url,
        &cli.database.tables(),
        cli.database.category_source,
    )
    .await?;
    let recommender = Recommender::new(
        Arc::new(source),
        ModelStore::new(&cli.model.model_path),
        RecommenderSettings {
            max_features: cli.model.max_features.max(1),
            ..RecommenderSettings::default()
        },
    );

    match recommender.retrain().await? {
        RetrainOutcome::Trained {
            products,
            vocabulary,
        } => println!(
            "Trained on {} product{} ({} vocabulary terms) -> {}",
            products,
            if products == 1 { "" } else { "s" },
            vocabulary,
            cli.model.model_path.display()
        ),
        RetrainOutcome::EmptyCorpus => {
            println!("No products found; snapshot removed, nothing to train.")
        }
    }
    Ok(())
}
