//! Popularity candidates: recent content ranked by recency decay times
//! engagement.
//!
//! The ranking is a pure function of the corpus and the clock. The requesting
//! user has no influence on the result.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use search::{fields, PostRecord, Query, ScoreFunction, SearchBackend, SearchRequest};

use crate::candidate::{Candidate, CandidateResult};
use crate::error::CandidateError;
use crate::generator::CandidateGenerator;

/// Registry name of [`PopularityGenerator`].
pub const POPULARITY: &str = "popularity";

const HOUR: Duration = Duration::from_secs(3600);

/// Scoring model: `recency(age) * engagement(likes)`.
///
/// Recency is a Gaussian decay anchored at now,
/// `decay ^ (max(0, age - offset) / scale)^2`, so anything younger than
/// `decay_offset` scores 1.0 and content exactly `decay_scale` past the offset
/// scores `decay`. Engagement is `1 + like_factor * ln(1 + likes)` with a
/// missing like count treated as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct PopularityModel {
    pub decay_scale: Duration,
    pub decay_offset: Duration,
    pub decay: f64,
    pub like_factor: f64,
}

impl Default for PopularityModel {
    fn default() -> Self {
        Self {
            decay_scale: 6 * HOUR,
            decay_offset: HOUR,
            decay: 0.5,
            like_factor: 1.5,
        }
    }
}

impl PopularityModel {
    pub fn validate(&self) -> Result<(), CandidateError> {
        if self.decay_scale.is_zero() {
            return Err(CandidateError::InvalidConfig(
                "popularity decay_scale must be positive".into(),
            ));
        }
        if !(self.decay > 0.0 && self.decay < 1.0) {
            return Err(CandidateError::InvalidConfig(format!(
                "popularity decay must be in (0, 1), got {}",
                self.decay
            )));
        }
        if !self.like_factor.is_finite() || self.like_factor < 0.0 {
            return Err(CandidateError::InvalidConfig(format!(
                "popularity like_factor must be finite and >= 0, got {}",
                self.like_factor
            )));
        }
        Ok(())
    }

    pub fn recency_factor(&self, age: Duration) -> f64 {
        let effective = age.saturating_sub(self.decay_offset).as_secs_f64();
        let ratio = effective / self.decay_scale.as_secs_f64();
        self.decay.powf(ratio * ratio)
    }

    pub fn engagement_factor(&self, likes: Option<u64>) -> f64 {
        1.0 + self.like_factor * (likes.unwrap_or(0) as f64).ln_1p()
    }

    pub fn score(&self, age: Duration, likes: Option<u64>) -> f64 {
        self.recency_factor(age) * self.engagement_factor(likes)
    }

    /// Score a stored post as of `now`. Posts without a timestamp are
    /// unscoreable; timestamps in the future count as age zero.
    pub fn score_post(&self, post: &PostRecord, now: DateTime<Utc>) -> Option<f64> {
        let created_at = post.created_at?;
        let age = (now - created_at).to_std().unwrap_or(Duration::ZERO);
        Some(self.score(age, post.like_count))
    }

    /// The model as backend score functions over the post fields.
    pub fn functions(&self) -> Vec<ScoreFunction> {
        vec![
            ScoreFunction::GaussDecay {
                field: fields::CREATED_AT.into(),
                scale: self.decay_scale,
                offset: self.decay_offset,
                decay: self.decay,
            },
            ScoreFunction::LogEngagement {
                field: fields::LIKE_COUNT.into(),
                factor: self.like_factor,
                missing: 0.0,
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopularityConfig {
    /// Collection holding posts.
    pub posts_index: String,
    /// Only content created within this trailing window is considered.
    pub window: Duration,
    pub model: PopularityModel,
}

impl Default for PopularityConfig {
    fn default() -> Self {
        Self {
            posts_index: "posts".into(),
            window: 24 * HOUR,
            model: PopularityModel::default(),
        }
    }
}

impl PopularityConfig {
    pub fn validate(&self) -> Result<(), CandidateError> {
        if self.posts_index.trim().is_empty() {
            return Err(CandidateError::InvalidConfig(
                "popularity posts_index must not be empty".into(),
            ));
        }
        if self.window.is_zero() {
            return Err(CandidateError::InvalidConfig(
                "popularity window must be positive".into(),
            ));
        }
        self.model.validate()
    }
}

/// Ranks recent content by [`PopularityModel`].
#[derive(Debug, Clone, Default)]
pub struct PopularityGenerator {
    config: PopularityConfig,
}

impl PopularityGenerator {
    pub fn new(config: PopularityConfig) -> Result<Self, CandidateError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PopularityConfig {
        &self.config
    }

    /// The search this generator issues for `count` items.
    pub fn request(&self, count: usize, video_only: bool) -> SearchRequest {
        let mut filter = vec![Query::within(fields::CREATED_AT, self.config.window)];
        if video_only {
            filter.push(Query::term(fields::CONTAINS_VIDEO, true));
        }
        let query = Query::FunctionScore {
            query: Box::new(Query::filtered(filter)),
            functions: self.config.model.functions(),
        };
        SearchRequest::new(self.config.posts_index.clone(), query, count)
    }
}

#[async_trait]
impl CandidateGenerator for PopularityGenerator {
    fn name(&self) -> &str {
        POPULARITY
    }

    #[tracing::instrument(name = "popularity", skip(self, backend))]
    async fn generate(
        &self,
        backend: &dyn SearchBackend,
        user_did: &str,
        count: usize,
        video_only: bool,
    ) -> Result<CandidateResult, CandidateError> {
        if count == 0 {
            return Ok(CandidateResult::empty(POPULARITY));
        }

        let hits = backend.search(&self.request(count, video_only)).await?;
        let mut candidates = Vec::with_capacity(hits.len().min(count));
        if hits.iter().all(|hit| hit.score.is_some()) {
            for hit in hits.iter().take(count) {
                let post: PostRecord = hit.decode()?;
                candidates.push(Candidate::from_post(post, hit.score, POPULARITY));
            }
        } else {
            // one unscored hit means the backend did not rank: score all locally
            let now = Utc::now();
            for hit in &hits {
                let post: PostRecord = hit.decode()?;
                let score = self.config.model.score_post(&post, now).map(|s| s as f32);
                candidates.push(Candidate::from_post(post, score, POPULARITY));
            }
            sort_by_score_desc(&mut candidates);
            candidates.truncate(count);
            tracing::debug!(hits = hits.len(), "ranked popularity hits locally");
        }

        tracing::info!(returned = candidates.len(), "popularity candidates");
        Ok(CandidateResult::new(POPULARITY, candidates))
    }
}

/// Stable descending sort; unscored candidates go last.
fn sort_by_score_desc(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}
