use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::query::Query;

/// Errors raised by a [`SearchBackend`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SearchError {
    /// The request never produced a response (connection, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),
    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body could not be decoded.
    #[error("malformed backend response: {0}")]
    Decode(String),
    /// The backend client is misconfigured.
    #[error("invalid backend config: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Decode(err.to_string())
    }
}

/// Sort direction for a [`SortField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// A single sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

/// One search call against a named collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Collection (index) to search.
    pub collection: String,
    /// Query descriptor.
    pub query: Query,
    /// Maximum number of hits to return.
    pub size: usize,
    /// Explicit ordering; empty means backend relevance order.
    pub sort: Vec<SortField>,
    /// Source fields to return; `None` returns the whole record.
    pub fields: Option<Vec<String>>,
}

impl SearchRequest {
    pub fn new(collection: impl Into<String>, query: Query, size: usize) -> Self {
        Self {
            collection: collection.into(),
            query,
            size,
            sort: Vec::new(),
            fields: None,
        }
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push(SortField {
            field: field.into(),
            order,
        });
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// A search hit: the stored record plus the backend's relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub source: Value,
    pub score: Option<f32>,
}

impl Hit {
    pub fn new(source: Value, score: Option<f32>) -> Self {
        Self { source, score }
    }

    /// Decode the source record into one of the typed record shapes.
    ///
    /// A missing or `null` source decodes as an empty record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, SearchError> {
        let source = match &self.source {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        Ok(serde_json::from_value(source)?)
    }
}

/// Capability to run a query descriptor against a document store.
///
/// Implementations own transport concerns (timeouts, retries, auth). Any error
/// returned here aborts the caller's whole request.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Hit>, SearchError>;
}
