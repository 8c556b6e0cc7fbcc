//! Workspace umbrella crate for feedmix.
//!
//! Re-exports the public surface of the workspace crates and wires them
//! together from a [`FeedmixConfig`]: the default generator registry, the
//! blender and the Elasticsearch backend.
//!
//! ```no_run
//! use feedmix::{build_backend, build_blender, BlendRequest, FeedmixConfig, GeneratorSpec};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FeedmixConfig::load(None)?;
//! let backend = build_backend(&config)?;
//! let blender = build_blender(&config)?;
//!
//! let request = BlendRequest::new(
//!     "did:plc:example",
//!     vec![
//!         GeneratorSpec::new("post_similarity", 3.0),
//!         GeneratorSpec::new("popularity", 1.0),
//!     ],
//! )
//! .with_num_candidates(40)
//! .with_infill("popularity");
//!
//! let result = blender.blend(&backend, &request).await?;
//! println!("{} candidates", result.candidates.len());
//! # Ok(())
//! # }
//! ```

pub mod config;

use std::sync::Arc;

use thiserror::Error;

pub use blend::{
    allocate, dedup_candidates, Allocation, BlendConfig, BlendError, BlendRequest, BlendResult,
    Blender, ErrorKind, ExecutionMode, GeneratorSpec, InfillReport,
};
pub use candidates::{
    search_posts, Candidate, CandidateError, CandidateGenerator, CandidateResult,
    GeneratorRegistry, PopularityConfig, PopularityGenerator, PopularityModel, PostSearch,
    SimilarityConfig, SimilarityGenerator, TextSearchConfig, POPULARITY, POST_SIMILARITY,
    TEXT_SEARCH,
};
pub use codec::{decode_f32_b64, encode_f32_b64, CodecError};
pub use config::{ConfigLoadError, FeedmixConfig};
pub use search::{
    ElasticsearchBackend, ElasticsearchConfig, Hit, Query, SearchBackend, SearchError,
    SearchRequest,
};

/// Errors raised while assembling the service from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigLoadError),
    #[error("generator setup failed: {0}")]
    Generator(#[from] CandidateError),
    #[error("backend setup failed: {0}")]
    Backend(#[from] SearchError),
    #[error("blender setup failed: {0}")]
    Blend(#[from] BlendError),
}

/// Registry holding the built-in `post_similarity` and `popularity`
/// generators, tuned from `config`.
pub fn build_registry(config: &FeedmixConfig) -> Result<GeneratorRegistry, SetupError> {
    let mut registry = GeneratorRegistry::new();
    registry.register(SimilarityGenerator::new(config.similarity_config())?)?;
    registry.register(PopularityGenerator::new(config.popularity_config())?)?;
    tracing::debug!(generators = ?registry.names(), "generator registry built");
    Ok(registry)
}

/// Blender over [`build_registry`] with the configured blend settings.
pub fn build_blender(config: &FeedmixConfig) -> Result<Blender, SetupError> {
    let registry = Arc::new(build_registry(config)?);
    Ok(Blender::new(registry, config.blend.clone())?)
}

/// Free-text post search over the configured posts index.
pub fn build_post_search(config: &FeedmixConfig) -> Result<PostSearch, SetupError> {
    Ok(PostSearch::new(config.text_search_config())?)
}

pub fn build_backend(config: &FeedmixConfig) -> Result<ElasticsearchBackend, SetupError> {
    Ok(ElasticsearchBackend::new(
        config.backend.to_elasticsearch_config(),
    )?)
}
