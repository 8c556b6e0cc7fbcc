//! Elasticsearch client for [`SearchBackend`].
//!
//! Query descriptors are translated into the Elasticsearch query DSL and sent
//! to `POST {url}/{collection}/_search`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::backend::{Hit, SearchBackend, SearchError, SearchRequest};
use crate::query::{Query, ScoreFunction};

/// Painless source for [`ScoreFunction::LogEngagement`].
const LOG_ENGAGEMENT_SCRIPT: &str = "double v = doc[params.field].size() == 0 ? params.missing : doc[params.field].value; return 1 + params.factor * Math.log(1 + v);";

/// Connection settings for an Elasticsearch cluster.
#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    /// Base URL, e.g. `http://localhost:9200`.
    pub url: String,
    /// Optional API key sent as `Authorization: ApiKey <key>`.
    pub api_key: Option<String>,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl ElasticsearchConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`SearchBackend`] backed by an Elasticsearch cluster over HTTP.
#[derive(Debug, Clone)]
pub struct ElasticsearchBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ElasticsearchBackend {
    pub fn new(cfg: ElasticsearchConfig) -> Result<Self, SearchError> {
        let base_url = cfg.url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SearchError::InvalidConfig("url must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SearchError::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key: cfg.api_key,
        })
    }

    /// Full `_search` request body for `request`.
    pub fn request_body(request: &SearchRequest) -> Value {
        let mut body = Map::new();
        body.insert("query".into(), query_dsl(&request.query));
        body.insert("size".into(), json!(request.size));
        if !request.sort.is_empty() {
            let sort: Vec<Value> = request
                .sort
                .iter()
                .map(|s| json!({ s.field.as_str(): s.order.as_str() }))
                .collect();
            body.insert("sort".into(), Value::Array(sort));
        }
        if let Some(fields) = &request.fields {
            body.insert("_source".into(), json!(fields));
        }
        Value::Object(body)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: HitsEnvelope,
}

#[derive(Debug, Default, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_source", default)]
    source: Value,
    #[serde(rename = "_score", default)]
    score: Option<f32>,
}

#[async_trait]
impl SearchBackend for ElasticsearchBackend {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Hit>, SearchError> {
        let url = format!("{}/{}/_search", self.base_url, request.collection);
        let body = Self::request_body(request);
        tracing::debug!(collection = %request.collection, size = request.size, "elasticsearch search");

        let mut http = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            http = http.header("Authorization", format!("ApiKey {key}"));
        }

        let response = http
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(collection = %request.collection, status = status.as_u16(), "elasticsearch search failed");
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|h| Hit::new(h.source, h.score))
            .collect())
    }
}

/// Translate a descriptor into Elasticsearch query DSL.
pub fn query_dsl(query: &Query) -> Value {
    match query {
        Query::MatchAll => json!({ "match_all": {} }),
        Query::Term { field, value } => json!({ "term": { field.as_str(): value } }),
        Query::Terms { field, values } => json!({ "terms": { field.as_str(): values } }),
        Query::Within { field, window } => json!({
            "range": { field.as_str(): { "gte": format!("now-{}", date_math(*window)) } }
        }),
        Query::Bool { must, filter } => {
            let mut clauses = Map::new();
            if !must.is_empty() {
                clauses.insert("must".into(), Value::Array(must.iter().map(query_dsl).collect()));
            }
            clauses.insert("filter".into(), Value::Array(filter.iter().map(query_dsl).collect()));
            json!({ "bool": clauses })
        }
        Query::FunctionScore { query, functions } => json!({
            "function_score": {
                "query": query_dsl(query),
                "functions": functions.iter().map(function_dsl).collect::<Vec<_>>(),
                "score_mode": "multiply",
                "boost_mode": "replace",
            }
        }),
        Query::QueryString { query, fields } => json!({
            "query_string": { "query": query, "fields": fields }
        }),
        Query::Knn {
            field,
            vector,
            k,
            num_candidates,
        } => json!({
            "knn": {
                "field": field,
                "query_vector": vector,
                "k": k,
                "num_candidates": num_candidates,
            }
        }),
    }
}

fn function_dsl(function: &ScoreFunction) -> Value {
    match function {
        ScoreFunction::GaussDecay {
            field,
            scale,
            offset,
            decay,
        } => json!({
            "gauss": {
                field.as_str(): {
                    "origin": "now",
                    "scale": date_math(*scale),
                    "offset": date_math(*offset),
                    "decay": decay,
                }
            }
        }),
        ScoreFunction::LogEngagement {
            field,
            factor,
            missing,
        } => json!({
            "script_score": {
                "script": {
                    "source": LOG_ENGAGEMENT_SCRIPT,
                    "params": { "field": field, "factor": factor, "missing": missing },
                }
            }
        }),
    }
}

/// Render a duration in the coarsest whole Elasticsearch time unit.
fn date_math(d: Duration) -> String {
    let secs = d.as_secs();
    if d.subsec_millis() != 0 || secs == 0 {
        return format!("{}ms", d.as_millis());
    }
    if secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SortOrder;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn date_math_picks_coarsest_unit() {
        assert_eq!(date_math(Duration::from_secs(86_400)), "1d");
        assert_eq!(date_math(Duration::from_secs(6 * 3600)), "6h");
        assert_eq!(date_math(Duration::from_secs(90 * 60)), "90m");
        assert_eq!(date_math(Duration::from_secs(45)), "45s");
        assert_eq!(date_math(Duration::from_millis(1500)), "1500ms");
        assert_eq!(date_math(Duration::ZERO), "0ms");
    }

    #[test]
    fn function_score_translates_to_replace_boost() {
        let query = Query::FunctionScore {
            query: Box::new(Query::filtered(vec![Query::within(
                "created_at",
                Duration::from_secs(24 * 3600),
            )])),
            functions: vec![
                ScoreFunction::GaussDecay {
                    field: "created_at".into(),
                    scale: Duration::from_secs(6 * 3600),
                    offset: Duration::from_secs(3600),
                    decay: 0.5,
                },
                ScoreFunction::LogEngagement {
                    field: "like_count".into(),
                    factor: 1.5,
                    missing: 0.0,
                },
            ],
        };
        let dsl = query_dsl(&query);
        let fs = &dsl["function_score"];
        assert_eq!(fs["score_mode"], "multiply");
        assert_eq!(fs["boost_mode"], "replace");
        assert_eq!(
            fs["query"]["bool"]["filter"][0],
            json!({"range": {"created_at": {"gte": "now-1d"}}})
        );
        assert_eq!(
            fs["functions"][0],
            json!({"gauss": {"created_at": {"origin": "now", "scale": "6h", "offset": "1h", "decay": 0.5}}})
        );
        assert_eq!(fs["functions"][1]["script_score"]["script"]["params"]["factor"], 1.5);
        assert!(fs["query"]["bool"].get("must").is_none());
    }

    #[test]
    fn knn_inside_bool_keeps_empty_filter() {
        let query = Query::Bool {
            must: vec![Query::knn("embeddings.all_MiniLM_L12_v2", vec![0.5, 0.25], 5, 100)],
            filter: vec![],
        };
        let dsl = query_dsl(&query);
        assert_eq!(dsl["bool"]["filter"], json!([]));
        assert_eq!(
            dsl["bool"]["must"][0]["knn"],
            json!({
                "field": "embeddings.all_MiniLM_L12_v2",
                "query_vector": [0.5, 0.25],
                "k": 5,
                "num_candidates": 100
            })
        );
    }

    #[test]
    fn query_string_targets_listed_fields() {
        let dsl = query_dsl(&Query::query_string("cats OR dogs", ["content"]));
        assert_eq!(
            dsl,
            json!({"query_string": {"query": "cats OR dogs", "fields": ["content"]}})
        );
    }

    #[test]
    fn request_body_includes_sort_and_source() {
        let req = SearchRequest::new("likes", Query::term("author_did", "did:plc:u"), 50)
            .sort_by("created_at", SortOrder::Desc)
            .with_fields(["subject_uri"]);
        let body = ElasticsearchBackend::request_body(&req);
        assert_eq!(
            body,
            json!({
                "query": {"term": {"author_did": "did:plc:u"}},
                "size": 50,
                "sort": [{"created_at": "desc"}],
                "_source": ["subject_uri"]
            })
        );
    }

    #[test]
    fn empty_url_is_rejected() {
        let err = ElasticsearchBackend::new(ElasticsearchConfig::new("/"))
            .expect_err("empty url must fail");
        assert!(matches!(err, SearchError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn search_posts_body_and_parses_hits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts/_search"))
            .and(header("authorization", "ApiKey secret"))
            .and(body_partial_json(json!({"size": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {"hits": [
                    {"_score": 12.5, "_source": {"at_uri": "at://popular/1"}},
                    {"_score": null, "_source": {"at_uri": "at://popular/2"}},
                    {"_id": "no-source"}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend =
            ElasticsearchBackend::new(ElasticsearchConfig::new(server.uri()).with_api_key("secret"))
                .unwrap();
        let hits = backend
            .search(&SearchRequest::new("posts", Query::MatchAll, 2))
            .await
            .unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].score, Some(12.5));
        assert_eq!(hits[0].source["at_uri"], "at://popular/1");
        assert_eq!(hits[1].score, None);
        assert_eq!(hits[2].source, Value::Null);
    }

    #[tokio::test]
    async fn query_string_search_reaches_the_posts_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts/_search"))
            .and(body_partial_json(json!({
                "query": {"query_string": {"query": "sunset", "fields": ["content"]}},
                "size": 10
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {"hits": [
                    {"_score": 2.0, "_source": {"at_uri": "at://a/1", "content": "sunset over the bay"}}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = ElasticsearchBackend::new(ElasticsearchConfig::new(server.uri())).unwrap();
        let hits = backend
            .search(&SearchRequest::new(
                "posts",
                Query::query_string("sunset", ["content"]),
                10,
            ))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source["content"], "sunset over the bay");
    }

    #[tokio::test]
    async fn missing_hits_envelope_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"took": 1})))
            .mount(&server)
            .await;

        let backend = ElasticsearchBackend::new(ElasticsearchConfig::new(server.uri())).unwrap();
        let hits = backend
            .search(&SearchRequest::new("posts", Query::MatchAll, 10))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn error_status_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("cluster unavailable"))
            .mount(&server)
            .await;

        let backend = ElasticsearchBackend::new(ElasticsearchConfig::new(server.uri())).unwrap();
        let err = backend
            .search(&SearchRequest::new("posts", Query::MatchAll, 10))
            .await
            .expect_err("503 must fail");
        assert_eq!(
            err,
            SearchError::Status {
                status: 503,
                body: "cluster unavailable".into()
            }
        );
    }
}
