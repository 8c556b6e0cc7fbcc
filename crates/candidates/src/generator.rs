use async_trait::async_trait;
use search::SearchBackend;

use crate::candidate::CandidateResult;
use crate::error::CandidateError;

/// A named candidate-generation strategy.
///
/// `name` must be non-empty and stable for the lifetime of the instance; it
/// is both the registry key and the provenance stamped on every candidate.
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Produce at most `count` candidates for `user_did`.
    ///
    /// Returning fewer (or zero) candidates is a normal outcome.
    async fn generate(
        &self,
        backend: &dyn SearchBackend,
        user_did: &str,
        count: usize,
        video_only: bool,
    ) -> Result<CandidateResult, CandidateError>;
}
