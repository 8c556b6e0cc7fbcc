//! Canned generators and candidates for tests and examples.

use std::sync::Mutex;

use async_trait::async_trait;
use candidates::{Candidate, CandidateError, CandidateGenerator, CandidateResult};
use search::{Query, SearchBackend, SearchError, SearchRequest};

/// A minimal candidate with only identity and provenance set.
pub fn candidate(at_uri: &str, generator: &str) -> Candidate {
    Candidate {
        at_uri: Some(at_uri.to_string()),
        content: None,
        embedding: None,
        score: None,
        generator_name: generator.to_string(),
    }
}

/// Generator returning a fixed list of URIs.
///
/// Each call issues one search against the backend (collection = generator
/// name) so tests can count backend traffic, then returns the first `count`
/// canned candidates. With `overfill` set it ignores `count` and returns the
/// whole list.
#[derive(Debug)]
pub struct StubGenerator {
    name: String,
    uris: Vec<String>,
    overfill: bool,
    requested: Mutex<Vec<usize>>,
}

impl StubGenerator {
    pub fn new(name: &str, uris: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            uris: uris.iter().map(|u| u.to_string()).collect(),
            overfill: false,
            requested: Mutex::new(Vec::new()),
        }
    }

    /// `count` fresh URIs of the form `at://{name}/{i}`.
    pub fn numbered(name: &str, count: usize) -> Self {
        let uris: Vec<String> = (0..count).map(|i| format!("at://{name}/{i}")).collect();
        let refs: Vec<&str> = uris.iter().map(String::as_str).collect();
        Self::new(name, &refs)
    }

    pub fn overfilling(mut self) -> Self {
        self.overfill = true;
        self
    }

    /// Counts this generator was asked for, in call order.
    pub fn requested(&self) -> Vec<usize> {
        self.requested
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

#[async_trait]
impl CandidateGenerator for StubGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        backend: &dyn SearchBackend,
        _user_did: &str,
        count: usize,
        _video_only: bool,
    ) -> Result<CandidateResult, CandidateError> {
        self.requested
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(count);
        backend
            .search(&SearchRequest::new(self.name.clone(), Query::MatchAll, count))
            .await?;

        let take = if self.overfill { self.uris.len() } else { count };
        let candidates = self
            .uris
            .iter()
            .take(take)
            .map(|uri| candidate(uri, &self.name))
            .collect();
        Ok(CandidateResult::new(self.name.clone(), candidates))
    }
}

/// Generator that always fails with a backend transport error.
#[derive(Debug)]
pub struct FailingGenerator {
    name: String,
}

impl FailingGenerator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl CandidateGenerator for FailingGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        _backend: &dyn SearchBackend,
        _user_did: &str,
        _count: usize,
        _video_only: bool,
    ) -> Result<CandidateResult, CandidateError> {
        Err(CandidateError::Backend(SearchError::Transport(format!(
            "{} unavailable",
            self.name
        ))))
    }
}
