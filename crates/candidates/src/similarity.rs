//! Similarity candidates: nearest neighbours of the user's taste vector.
//!
//! Pipeline:
//! 1. the user's most recent likes (newest first) give a list of post URIs;
//! 2. the stored MiniLM-L12 embedding of each liked post is looked up, posts
//!    without one are dropped;
//! 3. the embeddings are averaged elementwise into a taste vector;
//! 4. a kNN search over post embeddings with the taste vector returns the
//!    candidates.
//!
//! Stages 2-4 are skipped when the previous stage comes back empty.

use std::collections::HashSet;

use async_trait::async_trait;
use search::{fields, LikeRecord, PostRecord, Query, SearchBackend, SearchRequest, SortOrder};

use crate::candidate::{Candidate, CandidateResult};
use crate::error::CandidateError;
use crate::generator::CandidateGenerator;

/// Registry name of [`SimilarityGenerator`].
pub const POST_SIMILARITY: &str = "post_similarity";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityConfig {
    pub posts_index: String,
    pub likes_index: String,
    /// How many of the user's most recent likes form the taste vector.
    pub like_lookback: usize,
    /// Lower bound on the kNN candidate pool.
    pub min_knn_candidates: usize,
    /// The kNN pool is at least `count * knn_oversample`.
    pub knn_oversample: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            posts_index: "posts".into(),
            likes_index: "likes".into(),
            like_lookback: 50,
            min_knn_candidates: 100,
            knn_oversample: 10,
        }
    }
}

impl SimilarityConfig {
    pub fn validate(&self) -> Result<(), CandidateError> {
        if self.posts_index.trim().is_empty() || self.likes_index.trim().is_empty() {
            return Err(CandidateError::InvalidConfig(
                "similarity indexes must not be empty".into(),
            ));
        }
        if self.like_lookback == 0 {
            return Err(CandidateError::InvalidConfig(
                "similarity like_lookback must be positive".into(),
            ));
        }
        if self.knn_oversample == 0 {
            return Err(CandidateError::InvalidConfig(
                "similarity knn_oversample must be positive".into(),
            ));
        }
        Ok(())
    }

    /// kNN pool size for a request of `count` results.
    pub fn num_candidates(&self, count: usize) -> usize {
        self.min_knn_candidates
            .max(count.saturating_mul(self.knn_oversample))
    }
}

/// Elementwise arithmetic mean of `vectors`.
///
/// All vectors must share the dimension of the first one.
pub fn mean_vector(vectors: &[Vec<f32>]) -> Result<Vec<f32>, CandidateError> {
    let first = vectors.first().ok_or(CandidateError::EmptyAverage)?;
    let dim = first.len();

    let mut sum = vec![0f64; dim];
    for vector in vectors {
        if vector.len() != dim {
            return Err(CandidateError::DimensionMismatch {
                expected: dim,
                found: vector.len(),
            });
        }
        for (acc, &value) in sum.iter_mut().zip(vector) {
            *acc += f64::from(value);
        }
    }

    let n = vectors.len() as f64;
    Ok(sum.into_iter().map(|acc| (acc / n) as f32).collect())
}

/// Retrieves posts close to what the user recently liked.
#[derive(Debug, Clone, Default)]
pub struct SimilarityGenerator {
    config: SimilarityConfig,
}

impl SimilarityGenerator {
    pub fn new(config: SimilarityConfig) -> Result<Self, CandidateError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Subjects of the user's most recent likes, newest first, without
    /// repeats.
    pub async fn fetch_recent_liked_uris(
        &self,
        backend: &dyn SearchBackend,
        user_did: &str,
    ) -> Result<Vec<String>, CandidateError> {
        let request = SearchRequest::new(
            self.config.likes_index.clone(),
            Query::term(fields::AUTHOR_DID, user_did),
            self.config.like_lookback,
        )
        .sort_by(fields::CREATED_AT, SortOrder::Desc)
        .with_fields([fields::SUBJECT_URI]);

        let hits = backend.search(&request).await?;
        let mut seen = HashSet::new();
        let mut uris = Vec::with_capacity(hits.len());
        for hit in &hits {
            let like: LikeRecord = hit.decode()?;
            if let Some(uri) = like.subject() {
                if seen.insert(uri.to_string()) {
                    uris.push(uri.to_string());
                }
            }
        }
        Ok(uris)
    }

    /// Stored embeddings for `uris`; posts without one are skipped.
    pub async fn fetch_embeddings(
        &self,
        backend: &dyn SearchBackend,
        uris: &[String],
    ) -> Result<Vec<Vec<f32>>, CandidateError> {
        if uris.is_empty() {
            return Ok(Vec::new());
        }
        let request = SearchRequest::new(
            self.config.posts_index.clone(),
            Query::terms(fields::AT_URI, uris.iter().cloned()),
            uris.len(),
        )
        .with_fields([fields::EMBEDDING]);

        let hits = backend.search(&request).await?;
        let mut vectors = Vec::with_capacity(hits.len());
        for hit in &hits {
            let post: PostRecord = hit.decode()?;
            if let Some(embedding) = post.embedding() {
                vectors.push(embedding.to_vec());
            }
        }
        Ok(vectors)
    }

    /// The kNN request for `count` neighbours of `vector`.
    pub fn knn_request(&self, vector: Vec<f32>, count: usize, video_only: bool) -> SearchRequest {
        let knn = Query::knn(
            fields::EMBEDDING,
            vector,
            count,
            self.config.num_candidates(count),
        );
        let filter = if video_only {
            vec![Query::term(fields::CONTAINS_VIDEO, true)]
        } else {
            Vec::new()
        };
        SearchRequest::new(
            self.config.posts_index.clone(),
            Query::Bool {
                must: vec![knn],
                filter,
            },
            count,
        )
    }

    pub async fn knn_search(
        &self,
        backend: &dyn SearchBackend,
        vector: Vec<f32>,
        count: usize,
        video_only: bool,
    ) -> Result<Vec<Candidate>, CandidateError> {
        let hits = backend
            .search(&self.knn_request(vector, count, video_only))
            .await?;
        hits.iter()
            .take(count)
            .map(|hit| Candidate::from_hit(hit, POST_SIMILARITY).map_err(CandidateError::from))
            .collect()
    }
}

#[async_trait]
impl CandidateGenerator for SimilarityGenerator {
    fn name(&self) -> &str {
        POST_SIMILARITY
    }

    #[tracing::instrument(name = "post_similarity", skip(self, backend))]
    async fn generate(
        &self,
        backend: &dyn SearchBackend,
        user_did: &str,
        count: usize,
        video_only: bool,
    ) -> Result<CandidateResult, CandidateError> {
        if count == 0 {
            return Ok(CandidateResult::empty(POST_SIMILARITY));
        }

        let uris = self.fetch_recent_liked_uris(backend, user_did).await?;
        if uris.is_empty() {
            tracing::info!("no likes found, returning empty similarity result");
            return Ok(CandidateResult::empty(POST_SIMILARITY));
        }

        let vectors = self.fetch_embeddings(backend, &uris).await?;
        if vectors.is_empty() {
            tracing::info!(likes = uris.len(), "no embeddings for liked posts");
            return Ok(CandidateResult::empty(POST_SIMILARITY));
        }

        let taste = mean_vector(&vectors)?;
        tracing::debug!(likes = uris.len(), embeddings = vectors.len(), dim = taste.len(), "built taste vector");

        let candidates = self.knn_search(backend, taste, count, video_only).await?;
        tracing::info!(returned = candidates.len(), "similarity candidates");
        Ok(CandidateResult::new(POST_SIMILARITY, candidates))
    }
}
