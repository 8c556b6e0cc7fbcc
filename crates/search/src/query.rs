use std::time::Duration;

use serde_json::Value;

/// Backend-neutral query descriptor.
///
/// Descriptors only say *what* to match and how to score; each backend
/// translates them into its own query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Every record in the collection.
    MatchAll,
    /// Field equals `value`.
    Term { field: String, value: Value },
    /// Field equals any of `values`.
    Terms { field: String, values: Vec<Value> },
    /// Timestamp field is no older than `window` relative to now.
    Within { field: String, window: Duration },
    /// Scoring clauses in `must`, non-scoring clauses in `filter`.
    Bool { must: Vec<Query>, filter: Vec<Query> },
    /// Rescore `query` matches with the product of `functions`.
    ///
    /// The wrapped query only selects documents; the final score is exactly
    /// the product of the function values.
    FunctionScore {
        query: Box<Query>,
        functions: Vec<ScoreFunction>,
    },
    /// Lucene-style query string matched against the text `fields`.
    QueryString { query: String, fields: Vec<String> },
    /// Approximate nearest neighbours of `vector` on a dense vector field.
    ///
    /// `num_candidates` is the per-shard pool the backend examines before
    /// keeping the best `k`.
    Knn {
        field: String,
        vector: Vec<f32>,
        k: usize,
        num_candidates: usize,
    },
}

/// A scoring function applied inside [`Query::FunctionScore`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreFunction {
    /// Gaussian decay on a timestamp anchored at now:
    /// `decay ^ (max(0, age - offset) / scale)^2`.
    GaussDecay {
        field: String,
        scale: Duration,
        offset: Duration,
        decay: f64,
    },
    /// Sub-linear engagement boost on a numeric field:
    /// `1 + factor * ln(1 + value)`, with `missing` substituted for absent values.
    LogEngagement {
        field: String,
        factor: f64,
        missing: f64,
    },
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Query::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn within(field: impl Into<String>, window: Duration) -> Self {
        Query::Within {
            field: field.into(),
            window,
        }
    }

    /// A bool query made only of non-scoring filters.
    pub fn filtered(filter: Vec<Query>) -> Self {
        Query::Bool {
            must: Vec::new(),
            filter,
        }
    }

    pub fn query_string<I, S>(query: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query::QueryString {
            query: query.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn knn(field: impl Into<String>, vector: Vec<f32>, k: usize, num_candidates: usize) -> Self {
        Query::Knn {
            field: field.into(),
            vector,
            k,
            num_candidates,
        }
    }

    /// True if this descriptor or any nested clause satisfies `pred`.
    pub fn any_clause(&self, pred: &dyn Fn(&Query) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        match self {
            Query::Bool { must, filter } => must
                .iter()
                .chain(filter.iter())
                .any(|clause| clause.any_clause(pred)),
            Query::FunctionScore { query, .. } => query.any_clause(pred),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builders_fill_fields() {
        assert_eq!(
            Query::term("contains_video", true),
            Query::Term {
                field: "contains_video".into(),
                value: json!(true)
            }
        );
        assert_eq!(
            Query::terms("at_uri", ["at://a", "at://b"]),
            Query::Terms {
                field: "at_uri".into(),
                values: vec![json!("at://a"), json!("at://b")]
            }
        );
        assert_eq!(
            Query::query_string("rust AND async", ["content"]),
            Query::QueryString {
                query: "rust AND async".into(),
                fields: vec!["content".into()]
            }
        );
    }

    #[test]
    fn any_clause_descends_into_nested_queries() {
        let query = Query::FunctionScore {
            query: Box::new(Query::filtered(vec![
                Query::term("contains_video", true),
                Query::within("created_at", Duration::from_secs(3600)),
            ])),
            functions: Vec::new(),
        };
        assert!(query.any_clause(&|q| matches!(q, Query::Within { .. })));
        assert!(query.any_clause(&|q| *q == Query::term("contains_video", true)));
        assert!(!query.any_clause(&|q| matches!(q, Query::Knn { .. })));
    }
}
