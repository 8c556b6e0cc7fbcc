//! `feedmix [config.yaml]`
//!
//! Reads one `BlendRequest` as JSON from stdin, runs it against the configured
//! Elasticsearch cluster and writes the blended candidates as JSON to stdout.
//! Logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use feedmix::{build_backend, build_blender, BlendRequest, FeedmixConfig};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = FeedmixConfig::load(path.as_deref()).context("loading configuration")?;
    init_tracing(&config.log_level);

    let backend = build_backend(&config)?;
    let blender = build_blender(&config)?;

    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("reading request from stdin")?;
    let request: BlendRequest =
        serde_json::from_str(&input).context("parsing blend request JSON")?;

    tracing::info!(
        user_did = %request.user_did,
        generators = request.generators.len(),
        num_candidates = request.num_candidates,
        "blend request received"
    );

    let result = match blender.blend(&backend, &request).await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(kind = ?err.kind(), error = %err, "blend failed");
            return Err(err.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&result.candidates)?);
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .json()
        .init();
}
