//! # feed-candidates (`candidates`)
//!
//! Candidate model and the generators that produce candidate lists.
//!
//! ## Core types
//!
//! - [`Candidate`] / [`CandidateResult`]: what generators produce. A
//!   candidate's identity is its `at_uri`; candidates without one are never
//!   deduplicated against each other.
//! - [`CandidateGenerator`]: async, object-safe strategy trait. Generators
//!   receive the [`search::SearchBackend`] per call and hold no connection
//!   state of their own.
//! - [`GeneratorRegistry`]: name → generator map, built once and shared.
//!
//! ## Built-in generators
//!
//! - [`PopularityGenerator`] (`"popularity"`): content from a trailing window
//!   ranked by Gaussian recency decay times log engagement.
//! - [`SimilarityGenerator`] (`"post_similarity"`): kNN around the mean
//!   embedding of the user's recent likes.
//!
//! [`PostSearch`] / [`search_posts`] run a free-text query over post content
//! and return the matches as candidates.
//!
//! ```
//! use candidates::{GeneratorRegistry, PopularityGenerator, SimilarityGenerator};
//!
//! let mut registry = GeneratorRegistry::new();
//! registry.register(SimilarityGenerator::default()).unwrap();
//! registry.register(PopularityGenerator::default()).unwrap();
//! assert_eq!(registry.names(), vec!["popularity", "post_similarity"]);
//! ```

mod candidate;
mod error;
mod generator;
pub mod popularity;
mod registry;
pub mod similarity;
pub mod text_search;

pub use candidate::{Candidate, CandidateResult};
pub use error::CandidateError;
pub use generator::CandidateGenerator;
pub use popularity::{PopularityConfig, PopularityGenerator, PopularityModel, POPULARITY};
pub use registry::GeneratorRegistry;
pub use similarity::{mean_vector, SimilarityConfig, SimilarityGenerator, POST_SIMILARITY};
pub use text_search::{search_posts, PostSearch, TextSearchConfig, DEFAULT_SEARCH_SIZE, TEXT_SEARCH};
