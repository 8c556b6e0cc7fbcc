use super::*;
use crate::demo_utils::{FailingGenerator, StubGenerator};
use crate::types::{ErrorKind, GeneratorSpec};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use candidates::{CandidateError, CandidateGenerator, CandidateResult};
use search::mock::RecordingBackend;
use search::SearchBackend;

macro_rules! blender {
    ($mode:expr; $($generator:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut registry = GeneratorRegistry::new();
        $(registry.register_arc($generator).unwrap();)*
        Blender::new(
            Arc::new(registry),
            BlendConfig {
                execution: $mode,
                ..Default::default()
            },
        )
        .unwrap()
    }};
}

/// Wraps a stub, sleeps before answering and records when it finished.
struct Delayed {
    inner: StubGenerator,
    delay: Duration,
    finished: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl CandidateGenerator for Delayed {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(
        &self,
        backend: &dyn SearchBackend,
        user_did: &str,
        count: usize,
        video_only: bool,
    ) -> Result<CandidateResult, CandidateError> {
        tokio::time::sleep(self.delay).await;
        let result = self
            .inner
            .generate(backend, user_did, count, video_only)
            .await;
        self.finished.lock().unwrap().push(self.name().to_string());
        result
    }
}

fn delayed(
    inner: StubGenerator,
    millis: u64,
    finished: &Arc<Mutex<Vec<String>>>,
) -> Arc<Delayed> {
    Arc::new(Delayed {
        inner,
        delay: Duration::from_millis(millis),
        finished: finished.clone(),
    })
}

fn uris(result: &BlendResult) -> Vec<&str> {
    result
        .candidates
        .iter()
        .map(|c| c.identity().unwrap_or("<none>"))
        .collect()
}

fn request(specs: &[(&str, f64)], n: usize) -> BlendRequest {
    BlendRequest::new(
        "did:plc:user",
        specs
            .iter()
            .map(|(name, weight)| GeneratorSpec::new(*name, *weight))
            .collect(),
    )
    .with_num_candidates(n)
}

#[tokio::test]
async fn weighted_allocation_drives_generator_counts() {
    let similar = Arc::new(StubGenerator::numbered("post_similarity", 20));
    let popular = Arc::new(StubGenerator::numbered("popularity", 20));
    let blender = blender!(ExecutionMode::Sequential; similar.clone(), popular.clone());
    let backend = RecordingBackend::empty();

    let result = blender
        .blend(
            &backend,
            &request(&[("post_similarity", 3.0), ("popularity", 1.0)], 8),
        )
        .await
        .unwrap();

    assert_eq!(similar.requested(), vec![6]);
    assert_eq!(popular.requested(), vec![2]);
    assert_eq!(result.len(), 8);
    assert_eq!(
        result.allocations,
        vec![
            Allocation {
                generator: "post_similarity".into(),
                requested: 6,
                returned: 6
            },
            Allocation {
                generator: "popularity".into(),
                requested: 2,
                returned: 2
            },
        ]
    );
    // request order: every similarity result precedes popularity
    assert_eq!(&uris(&result)[5..7], &["at://post_similarity/5", "at://popularity/0"]);
    assert!(result.infill.is_none());
}

#[tokio::test]
async fn duplicates_keep_first_generator() {
    let a = Arc::new(StubGenerator::new("a", &["at://x", "at://a1", "at://a2"]));
    let b = Arc::new(StubGenerator::new("b", &["at://x", "at://b1", "at://b2"]));
    let blender = blender!(ExecutionMode::Sequential; a, b);

    let result = blender
        .blend(&RecordingBackend::empty(), &request(&[("a", 1.0), ("b", 1.0)], 5))
        .await
        .unwrap();

    assert!(result.len() <= 5);
    assert_eq!(uris(&result), vec!["at://x", "at://a1", "at://a2", "at://b1"]);
    let x: Vec<_> = result
        .candidates
        .iter()
        .filter(|c| c.identity() == Some("at://x"))
        .collect();
    assert_eq!(x.len(), 1);
    assert_eq!(x[0].generator_name, "a");
}

#[tokio::test]
async fn infill_covers_shortfall_with_double_count() {
    let sparse = Arc::new(StubGenerator::new("post_similarity", &["at://only"]));
    let popular = Arc::new(StubGenerator::numbered("popularity", 20));
    let blender = blender!(ExecutionMode::Sequential; sparse.clone(), popular.clone());

    let req = request(&[("post_similarity", 1.0)], 5).with_infill("popularity");
    let result = blender.blend(&RecordingBackend::empty(), &req).await.unwrap();

    assert_eq!(sparse.requested(), vec![5]);
    assert_eq!(popular.requested(), vec![8]);
    assert_eq!(result.len(), 5);
    assert_eq!(result.candidates[0].generator_name, "post_similarity");
    assert!(result.candidates[1..]
        .iter()
        .all(|c| c.generator_name == "popularity"));
    assert_eq!(
        result.infill,
        Some(InfillReport {
            generator: "popularity".into(),
            requested: 8,
            returned: 8
        })
    );
}

#[tokio::test]
async fn infill_dedups_against_primaries() {
    let primary = Arc::new(StubGenerator::new("a", &["at://1", "at://2"]));
    let infill = Arc::new(StubGenerator::new("fill", &["at://2", "at://1", "at://3", "at://4"]));
    let blender = blender!(ExecutionMode::Sequential; primary, infill);

    let req = request(&[("a", 1.0)], 4).with_infill("fill");
    let result = blender.blend(&RecordingBackend::empty(), &req).await.unwrap();

    assert_eq!(uris(&result), vec!["at://1", "at://2", "at://3", "at://4"]);
    assert_eq!(result.candidates[0].generator_name, "a");
    assert_eq!(result.candidates[2].generator_name, "fill");
}

#[tokio::test]
async fn infill_not_called_when_primaries_suffice() {
    let primary = Arc::new(StubGenerator::numbered("a", 10));
    let infill = Arc::new(StubGenerator::numbered("fill", 10));
    let blender = blender!(ExecutionMode::Sequential; primary, infill.clone());

    let req = request(&[("a", 1.0)], 4).with_infill("fill");
    let result = blender.blend(&RecordingBackend::empty(), &req).await.unwrap();

    assert_eq!(result.len(), 4);
    assert!(infill.requested().is_empty());
    assert!(result.infill.is_none());
}

#[tokio::test]
async fn shortfall_without_infill_is_not_an_error() {
    let blender = blender!(ExecutionMode::Sequential; Arc::new(StubGenerator::new("a", &["at://1"])));
    let result = blender
        .blend(&RecordingBackend::empty(), &request(&[("a", 1.0)], 10))
        .await
        .unwrap();
    assert_eq!(uris(&result), vec!["at://1"]);
}

#[tokio::test]
async fn unknown_generator_fails_before_any_backend_call() {
    let known = Arc::new(StubGenerator::numbered("popularity", 5));
    let blender = blender!(ExecutionMode::Sequential; known.clone());
    let backend = RecordingBackend::empty();

    let err = blender
        .blend(&backend, &request(&[("popularity", 1.0), ("nonexistent", 1.0)], 5))
        .await
        .unwrap_err();

    assert_eq!(err, BlendError::UnknownGenerator("nonexistent".into()));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(backend.call_count(), 0);
    assert!(known.requested().is_empty());
}

#[tokio::test]
async fn unknown_infill_fails_up_front() {
    let known = Arc::new(StubGenerator::numbered("popularity", 5));
    let blender = blender!(ExecutionMode::Sequential; known.clone());
    let backend = RecordingBackend::empty();

    let req = request(&[("popularity", 1.0)], 5).with_infill("missing");
    let err = blender.blend(&backend, &req).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn invalid_request_is_rejected_before_lookup() {
    let blender = blender!(ExecutionMode::Sequential;);
    let backend = RecordingBackend::empty();

    let err = blender
        .blend(&backend, &request(&[("nonexistent", 0.0)], 5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = blender
        .blend(&backend, &request(&[("nonexistent", 1.0)], 5000))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn zero_candidates_calls_nothing() {
    let a = Arc::new(StubGenerator::numbered("a", 5));
    let blender = blender!(ExecutionMode::Sequential; a.clone());
    let backend = RecordingBackend::empty();

    let result = blender
        .blend(&backend, &request(&[("a", 1.0)], 0))
        .await
        .unwrap();
    assert!(result.is_empty());
    assert!(a.requested().is_empty());
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn zero_allocation_skips_generator() {
    let big = Arc::new(StubGenerator::numbered("big", 10));
    let tiny = Arc::new(StubGenerator::numbered("tiny", 10));
    let blender = blender!(ExecutionMode::Sequential; big.clone(), tiny.clone());

    let result = blender
        .blend(
            &RecordingBackend::empty(),
            &request(&[("big", 100.0), ("tiny", 1.0)], 10),
        )
        .await
        .unwrap();

    assert_eq!(big.requested(), vec![10]);
    assert!(tiny.requested().is_empty());
    assert_eq!(result.allocations[1].requested, 0);
    assert_eq!(result.allocations[1].returned, 0);
}

#[tokio::test]
async fn overfilling_generator_is_capped_at_its_allocation() {
    let greedy = Arc::new(StubGenerator::numbered("greedy", 10).overfilling());
    let other = Arc::new(StubGenerator::numbered("other", 10));
    let blender = blender!(ExecutionMode::Sequential; greedy, other);

    let result = blender
        .blend(
            &RecordingBackend::empty(),
            &request(&[("greedy", 1.0), ("other", 1.0)], 4),
        )
        .await
        .unwrap();

    assert_eq!(
        uris(&result),
        vec!["at://greedy/0", "at://greedy/1", "at://other/0", "at://other/1"]
    );
}

#[tokio::test]
async fn generator_failure_aborts_request() {
    let ok = Arc::new(StubGenerator::numbered("ok", 5));
    let blender = blender!(ExecutionMode::Sequential; ok, Arc::new(FailingGenerator::new("broken")));

    let err = blender
        .blend(
            &RecordingBackend::empty(),
            &request(&[("ok", 1.0), ("broken", 1.0)], 4),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Backend);
    match err {
        BlendError::Generator { generator, source } => {
            assert_eq!(generator, "broken");
            assert!(matches!(source, CandidateError::Backend(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_mode_merges_in_request_order() {
    let finished = Arc::new(Mutex::new(Vec::new()));
    // earlier in the request means slower to answer
    let a = delayed(StubGenerator::new("a", &["at://x", "at://a1"]), 120, &finished);
    let b = delayed(StubGenerator::new("b", &["at://x", "at://b1"]), 60, &finished);
    let c = delayed(StubGenerator::new("c", &["at://c1", "at://c2"]), 0, &finished);
    let blender = blender!(ExecutionMode::Concurrent; c, b, a);

    let result = blender
        .blend(
            &RecordingBackend::empty(),
            &request(&[("a", 1.0), ("b", 1.0), ("c", 1.0)], 6),
        )
        .await
        .unwrap();

    assert_eq!(*finished.lock().unwrap(), vec!["c", "b", "a"]);
    assert_eq!(
        uris(&result),
        vec!["at://x", "at://a1", "at://b1", "at://c1", "at://c2"]
    );
    assert_eq!(result.candidates[0].generator_name, "a");
}

#[tokio::test]
async fn sequential_mode_runs_in_request_order() {
    let finished = Arc::new(Mutex::new(Vec::new()));
    let blender = blender!(
        ExecutionMode::Sequential;
        delayed(StubGenerator::numbered("slow", 3), 50, &finished),
        delayed(StubGenerator::numbered("fast", 3), 0, &finished),
    );

    blender
        .blend(
            &RecordingBackend::empty(),
            &request(&[("slow", 1.0), ("fast", 1.0)], 4),
        )
        .await
        .unwrap();

    assert_eq!(*finished.lock().unwrap(), vec!["slow", "fast"]);
}

#[tokio::test]
async fn concurrent_failure_still_aborts() {
    let blender = blender!(ExecutionMode::Concurrent; Arc::new(StubGenerator::numbered("ok", 5)), Arc::new(FailingGenerator::new("broken")));
    let err = blender
        .blend(
            &RecordingBackend::empty(),
            &request(&[("ok", 1.0), ("broken", 1.0)], 4),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
}

#[test]
fn zero_infill_multiplier_is_rejected() {
    let err = Blender::new(
        Arc::new(GeneratorRegistry::new()),
        BlendConfig {
            infill_multiplier: 0,
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
