use candidates::{Candidate, CandidateError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One weighted entry of a blend request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorSpec {
    /// Registry name of the generator.
    pub name: String,
    /// Relative share of the requested count; must be finite and > 0.
    #[serde(default = "GeneratorSpec::default_weight")]
    pub weight: f64,
}

impl GeneratorSpec {
    pub(crate) fn default_weight() -> f64 {
        1.0
    }

    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// A single blend call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlendRequest {
    /// Generators in priority order. Earlier entries win deduplication and
    /// allocation ties.
    pub generators: Vec<GeneratorSpec>,
    pub user_did: String,
    /// Exact number of candidates wanted.
    #[serde(default = "BlendRequest::default_num_candidates")]
    pub num_candidates: usize,
    /// Generator asked to cover any shortfall left after deduplication.
    #[serde(default)]
    pub infill: Option<String>,
    #[serde(default)]
    pub video_only: bool,
}

impl BlendRequest {
    pub(crate) fn default_num_candidates() -> usize {
        100
    }

    pub fn new(user_did: impl Into<String>, generators: Vec<GeneratorSpec>) -> Self {
        Self {
            generators,
            user_did: user_did.into(),
            num_candidates: Self::default_num_candidates(),
            infill: None,
            video_only: false,
        }
    }

    pub fn with_num_candidates(mut self, n: usize) -> Self {
        self.num_candidates = n;
        self
    }

    pub fn with_infill(mut self, name: impl Into<String>) -> Self {
        self.infill = Some(name.into());
        self
    }

    pub fn with_video_only(mut self, video_only: bool) -> Self {
        self.video_only = video_only;
        self
    }

    /// Shape checks that need no registry or backend access.
    pub fn validate(&self, max_num_candidates: usize) -> Result<(), BlendError> {
        if self.generators.is_empty() {
            return Err(BlendError::InvalidRequest(
                "at least one generator is required".into(),
            ));
        }
        for spec in &self.generators {
            if !spec.weight.is_finite() || spec.weight <= 0.0 {
                return Err(BlendError::InvalidRequest(format!(
                    "weight for generator '{}' must be finite and > 0, got {}",
                    spec.name, spec.weight
                )));
            }
        }
        if self.user_did.trim().is_empty() {
            return Err(BlendError::InvalidRequest(
                "user_did must not be empty".into(),
            ));
        }
        if self.num_candidates > max_num_candidates {
            return Err(BlendError::InvalidRequest(format!(
                "num_candidates {} exceeds maximum {max_num_candidates}",
                self.num_candidates
            )));
        }
        Ok(())
    }
}

/// How primary generators are driven.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One after another in request order.
    #[default]
    Sequential,
    /// All at once; results are still merged in request order.
    Concurrent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlendConfig {
    /// Upper bound on `num_candidates`.
    #[serde(default = "BlendConfig::default_max_num_candidates")]
    pub max_num_candidates: usize,
    /// The infill generator is asked for `shortfall * infill_multiplier`.
    #[serde(default = "BlendConfig::default_infill_multiplier")]
    pub infill_multiplier: usize,
    #[serde(default)]
    pub execution: ExecutionMode,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            max_num_candidates: Self::default_max_num_candidates(),
            infill_multiplier: Self::default_infill_multiplier(),
            execution: ExecutionMode::default(),
        }
    }
}

impl BlendConfig {
    pub(crate) fn default_max_num_candidates() -> usize {
        1000
    }

    pub(crate) fn default_infill_multiplier() -> usize {
        2
    }

    pub fn validate(&self) -> Result<(), BlendError> {
        if self.max_num_candidates == 0 {
            return Err(BlendError::InvalidConfig(
                "max_num_candidates must be greater than zero".into(),
            ));
        }
        if self.infill_multiplier == 0 {
            return Err(BlendError::InvalidConfig(
                "infill_multiplier must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// What one primary generator was asked for and what it contributed before
/// deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation {
    pub generator: String,
    pub requested: usize,
    pub returned: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InfillReport {
    pub generator: String,
    pub requested: usize,
    pub returned: usize,
}

/// Outcome of a blend call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BlendResult {
    /// Deduplicated candidates, at most `num_candidates` long.
    pub candidates: Vec<Candidate>,
    /// One entry per request generator, in request order.
    pub allocations: Vec<Allocation>,
    /// Present only when the infill generator actually ran.
    pub infill: Option<InfillReport>,
}

impl BlendResult {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Coarse classification of a [`BlendError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Backend,
    Validation,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BlendError {
    #[error("unknown generator: {0}")]
    UnknownGenerator(String),
    #[error("generator '{generator}' failed: {source}")]
    Generator {
        generator: String,
        #[source]
        source: CandidateError,
    },
    #[error("invalid blend request: {0}")]
    InvalidRequest(String),
    #[error("invalid blend config: {0}")]
    InvalidConfig(String),
}

impl BlendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlendError::UnknownGenerator(_) => ErrorKind::NotFound,
            BlendError::Generator {
                source: CandidateError::Backend(_),
                ..
            } => ErrorKind::Backend,
            BlendError::Generator { .. }
            | BlendError::InvalidRequest(_)
            | BlendError::InvalidConfig(_) => ErrorKind::Validation,
        }
    }
}
