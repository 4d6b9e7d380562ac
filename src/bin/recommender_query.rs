use anyhow::{Context, Result};
use clap::Parser;
use product_recommender::config::{init_tracing, ModelArgs};
use product_recommender::{ModelStore, RecommenderModel};

#[derive(Parser, Debug)]
#[command(
    name = "recommender-query",
    about = "Print recommendations for a product straight from the model snapshot"
)]
struct QueryCli {
    /// Product identifier to find neighbors for.
    product_id: String,

    /// Number of neighbors to print.
    #[arg(short = 'n', long, default_value_t = 5)]
    num_recommendations: usize,

    /// Emit JSON instead of a table.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    model: ModelArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = QueryCli::parse();
    let store = ModelStore::new(&cli.model.model_path);
    let Some(model): Option<RecommenderModel> = store
        .load()
        .with_context(|| format!("failed to read {}", cli.model.model_path.display()))?
    else {
        println!(
            "No model at {}; run recommender-train first.",
            cli.model.model_path.display()
        );
        return Ok(());
    };

    let recs = model.recommend(&cli.product_id, cli.num_recommendations.max(1));
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&recs)?);
        return Ok(());
    }
    if recs.is_empty() {
        println!("No recommendations for {}.", cli.product_id);
        return Ok(());
    }
    for (rank, rec) in recs.iter().enumerate() {
        println!(
            "{:>2}. {:<24} {:.4}  {} [{}]",
            rank + 1,
            rec.id,
            rec.score,
            rec.title,
            rec.category
        );
    }
    Ok(())
}
