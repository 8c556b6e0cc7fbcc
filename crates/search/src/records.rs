//! Typed views of the two record shapes stored in the backend.
//!
//! Decoding is lenient at the field level: a field with an unexpected type is
//! treated as absent instead of failing the whole hit, so a schema drift in one
//! attribute never takes a generator down.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Field names used when building query descriptors.
pub mod fields {
    pub const AT_URI: &str = "at_uri";
    pub const CONTENT: &str = "content";
    pub const LIKE_COUNT: &str = "like_count";
    pub const CREATED_AT: &str = "created_at";
    pub const CONTAINS_VIDEO: &str = "contains_video";
    pub const EMBEDDING: &str = "embeddings.all_MiniLM_L12_v2";
    pub const SUBJECT_URI: &str = "subject_uri";
    pub const AUTHOR_DID: &str = "author_did";
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// A like: `author_did` liked the post at `subject_uri`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LikeRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub subject_uri: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub author_did: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub created_at: Option<DateTime<Utc>>,
}

impl LikeRecord {
    /// The liked post, if the record names a non-empty one.
    pub fn subject(&self) -> Option<&str> {
        self.subject_uri.as_deref().filter(|uri| !uri.is_empty())
    }
}

/// Stored embeddings of a post, keyed by model.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PostEmbeddings {
    #[serde(rename = "all_MiniLM_L12_v2", default, deserialize_with = "lenient")]
    pub minilm_l12: Option<Vec<f32>>,
}

/// A content item.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PostRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub at_uri: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub like_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub contains_video: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub embeddings: Option<PostEmbeddings>,
}

impl PostRecord {
    /// The MiniLM-L12 embedding, if stored and non-empty.
    pub fn embedding(&self) -> Option<&[f32]> {
        self.embeddings
            .as_ref()
            .and_then(|e| e.minilm_l12.as_deref())
            .filter(|v| !v.is_empty())
    }
}
