//! # feed-search (`search`)
//!
//! Abstraction over the document store that holds posts and likes.
//!
//! Callers describe what they want with a backend-neutral [`Query`] descriptor
//! wrapped in a [`SearchRequest`], and get back raw [`Hit`]s they decode into
//! [`PostRecord`] or [`LikeRecord`]. The [`SearchBackend`] trait is the only
//! seam: generators never see HTTP, DSL, or index layout details.
//!
//! The `elasticsearch` feature (on by default) provides [`ElasticsearchBackend`],
//! which translates descriptors into Elasticsearch query DSL.

mod backend;
pub mod query;
pub mod records;

#[cfg(feature = "elasticsearch")]
mod elasticsearch;

#[doc(hidden)]
pub mod mock;

pub use backend::{Hit, SearchBackend, SearchError, SearchRequest, SortField, SortOrder};
pub use query::{Query, ScoreFunction};
pub use records::{fields, LikeRecord, PostEmbeddings, PostRecord};

#[cfg(feature = "elasticsearch")]
pub use elasticsearch::{query_dsl, ElasticsearchBackend, ElasticsearchConfig};
