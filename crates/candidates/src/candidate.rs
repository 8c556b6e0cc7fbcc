use search::{Hit, PostRecord, SearchError};
use serde::{Deserialize, Serialize};

/// One recommendable item produced by a generator.
///
/// The embedding travels as base64 little-endian `f32` in the
/// `minilm_l12_embedding` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub at_uri: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "minilm_l12_embedding", with = "embedding_serde", default)]
    pub embedding: Option<Vec<f32>>,
    pub score: Option<f32>,
    pub generator_name: String,
}

impl Candidate {
    /// Build a candidate from a decoded post and the hit score.
    pub fn from_post(post: PostRecord, score: Option<f32>, generator_name: &str) -> Self {
        let embedding = post.embedding().map(<[f32]>::to_vec);
        Self {
            at_uri: post.at_uri,
            content: post.content,
            embedding,
            score,
            generator_name: generator_name.to_string(),
        }
    }

    /// Decode a raw search hit; the hit score becomes the candidate score.
    pub fn from_hit(hit: &Hit, generator_name: &str) -> Result<Self, SearchError> {
        let post: PostRecord = hit.decode()?;
        Ok(Self::from_post(post, hit.score, generator_name))
    }

    /// Dedup key. `None` means the candidate has no identity and is never
    /// collapsed with another.
    pub fn identity(&self) -> Option<&str> {
        self.at_uri.as_deref()
    }
}

/// Ordered output of one generator call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub generator_name: String,
    pub candidates: Vec<Candidate>,
}

impl CandidateResult {
    pub fn new(generator_name: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            generator_name: generator_name.into(),
            candidates,
        }
    }

    pub fn empty(generator_name: impl Into<String>) -> Self {
        Self::new(generator_name, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

mod embedding_serde {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<f32>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(vector) => serializer.serialize_str(&codec::encode_f32_b64(vector)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<f32>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|text| codec::decode_f32_b64(&text).map_err(D::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_hit_keeps_provenance_and_score() {
        let hit = Hit::new(
            json!({
                "at_uri": "at://post/1",
                "content": "hello",
                "embeddings": {"all_MiniLM_L12_v2": [0.5, 0.25]}
            }),
            Some(3.5),
        );
        let candidate = Candidate::from_hit(&hit, "popularity").unwrap();
        assert_eq!(candidate.identity(), Some("at://post/1"));
        assert_eq!(candidate.content.as_deref(), Some("hello"));
        assert_eq!(candidate.embedding, Some(vec![0.5, 0.25]));
        assert_eq!(candidate.score, Some(3.5));
        assert_eq!(candidate.generator_name, "popularity");
    }

    #[test]
    fn missing_embedding_is_none_not_error() {
        let hit = Hit::new(json!({"at_uri": "at://post/2", "embeddings": "bogus"}), None);
        let candidate = Candidate::from_hit(&hit, "post_similarity").unwrap();
        assert!(candidate.embedding.is_none());
        assert!(candidate.score.is_none());
    }

    #[test]
    fn serializes_embedding_as_base64() {
        let candidate = Candidate {
            at_uri: Some("at://post/1".into()),
            content: None,
            embedding: Some(vec![1.0, -2.5]),
            score: Some(1.0),
            generator_name: "popularity".into(),
        };
        let value = serde_json::to_value(&candidate).unwrap();
        assert_eq!(value["minilm_l12_embedding"], "AACAPwAAIMA=");
        assert!(value.get("embedding").is_none());

        let back: Candidate = serde_json::from_value(value).unwrap();
        assert_eq!(back, candidate);
    }

    #[test]
    fn null_embedding_serializes_as_null() {
        let candidate = Candidate {
            at_uri: None,
            content: None,
            embedding: None,
            score: None,
            generator_name: "popularity".into(),
        };
        let value = serde_json::to_value(&candidate).unwrap();
        assert!(value["minilm_l12_embedding"].is_null());
    }

    #[test]
    fn malformed_wire_embedding_is_rejected() {
        let err = serde_json::from_value::<Candidate>(json!({
            "at_uri": "at://post/1",
            "content": null,
            "minilm_l12_embedding": "AQID",
            "score": null,
            "generator_name": "popularity"
        }))
        .expect_err("three-byte payload must fail");
        assert!(err.to_string().contains("multiple of 4"));
    }
}
