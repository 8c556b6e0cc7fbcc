//! # feed-blend (`blend`)
//!
//! Turns a weighted list of generator names into one exact-size,
//! deduplicated candidate list.
//!
//! ## Flow
//!
//! 1. [`BlendRequest::validate`] checks weights, user and count bounds.
//! 2. Every primary and infill name is resolved in the
//!    [`candidates::GeneratorRegistry`]; an unknown name fails the request
//!    before any backend traffic.
//! 3. [`allocate`] splits `num_candidates` across generators by weight
//!    (largest remainder, ties to earlier generators).
//! 4. Generators run with their counts, sequentially or concurrently per
//!    [`ExecutionMode`], and their outputs are concatenated in request order.
//! 5. [`dedup_candidates`] keeps the first occurrence of each `at_uri`.
//! 6. If still short and an infill generator is named, it is asked for
//!    `shortfall * infill_multiplier` more, merged and deduplicated again.
//! 7. The list is truncated to `num_candidates`.
//!
//! ## Errors
//!
//! [`BlendError::kind`] classifies failures as [`ErrorKind::NotFound`]
//! (unknown generator), [`ErrorKind::Backend`] (search failure inside a
//! generator) or [`ErrorKind::Validation`]. Any failure aborts the request and
//! no partial result is returned.

mod allocation;
mod dedup;
mod engine;
mod types;

#[doc(hidden)]
pub mod demo_utils;

pub use allocation::allocate;
pub use dedup::dedup_candidates;
pub use engine::Blender;
pub use types::{
    Allocation, BlendConfig, BlendError, BlendRequest, BlendResult, ErrorKind, ExecutionMode,
    GeneratorSpec, InfillReport,
};
