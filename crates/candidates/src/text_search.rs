//! Free-text search over post content.
//!
//! Not a generator: the caller picks the query and gets matching posts back in
//! backend relevance order, shaped as [`Candidate`]s so the embedding travels
//! with the same base64 encoding.

use search::{fields, Query, SearchBackend, SearchRequest};

use crate::candidate::Candidate;
use crate::error::CandidateError;

/// Provenance stamped on text search results.
pub const TEXT_SEARCH: &str = "text_search";

/// Default page size when the caller does not pick one.
pub const DEFAULT_SEARCH_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSearchConfig {
    pub posts_index: String,
    /// Largest accepted page size.
    pub max_size: usize,
}

impl Default for TextSearchConfig {
    fn default() -> Self {
        Self {
            posts_index: "posts".into(),
            max_size: 100,
        }
    }
}

impl TextSearchConfig {
    pub fn validate(&self) -> Result<(), CandidateError> {
        if self.posts_index.trim().is_empty() {
            return Err(CandidateError::InvalidConfig(
                "text search posts_index must not be empty".into(),
            ));
        }
        if self.max_size == 0 {
            return Err(CandidateError::InvalidConfig(
                "text search max_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Query-string search over the `content` field of posts.
#[derive(Debug, Clone, Default)]
pub struct PostSearch {
    config: TextSearchConfig,
}

impl PostSearch {
    pub fn new(config: TextSearchConfig) -> Result<Self, CandidateError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TextSearchConfig {
        &self.config
    }

    /// The search issued for `query`, or why it is rejected.
    pub fn request(&self, query: &str, size: usize) -> Result<SearchRequest, CandidateError> {
        if query.trim().is_empty() {
            return Err(CandidateError::InvalidQuery("query must not be empty".into()));
        }
        if size == 0 || size > self.config.max_size {
            return Err(CandidateError::InvalidQuery(format!(
                "size must be between 1 and {}, got {size}",
                self.config.max_size
            )));
        }
        Ok(SearchRequest::new(
            self.config.posts_index.clone(),
            Query::query_string(query, [fields::CONTENT]),
            size,
        ))
    }

    #[tracing::instrument(name = "text_search", skip(self, backend))]
    pub async fn search(
        &self,
        backend: &dyn SearchBackend,
        query: &str,
        size: usize,
    ) -> Result<Vec<Candidate>, CandidateError> {
        let request = self.request(query, size)?;
        let hits = backend.search(&request).await?;
        let posts = hits
            .iter()
            .take(size)
            .map(|hit| Candidate::from_hit(hit, TEXT_SEARCH))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(returned = posts.len(), "text search results");
        Ok(posts)
    }
}

/// [`PostSearch::search`] with the default `posts` index and size limit.
pub async fn search_posts(
    backend: &dyn SearchBackend,
    query: &str,
    size: usize,
) -> Result<Vec<Candidate>, CandidateError> {
    PostSearch::default().search(backend, query, size).await
}
