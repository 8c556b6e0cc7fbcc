use std::sync::Arc;

use candidates::{CandidateGenerator, CandidateResult, GeneratorRegistry};
use futures::future::try_join_all;
use search::SearchBackend;

use crate::allocation::allocate;
use crate::dedup::dedup_candidates;
use crate::types::{
    Allocation, BlendConfig, BlendError, BlendRequest, BlendResult, ExecutionMode, InfillReport,
};

#[cfg(test)]
mod tests;

/// Blends weighted generator outputs into one deduplicated candidate list.
///
/// A `Blender` is cheap to clone and holds no per-request state; the registry
/// is shared read-only across every request.
#[derive(Debug, Clone)]
pub struct Blender {
    registry: Arc<GeneratorRegistry>,
    config: BlendConfig,
}

/// A resolved primary generator and the count allocated to it.
struct Planned {
    generator: Arc<dyn CandidateGenerator>,
    count: usize,
}

impl Blender {
    pub fn new(registry: Arc<GeneratorRegistry>, config: BlendConfig) -> Result<Self, BlendError> {
        config.validate()?;
        Ok(Self { registry, config })
    }

    /// Blender with [`BlendConfig::default`].
    pub fn with_registry(registry: Arc<GeneratorRegistry>) -> Self {
        Self {
            registry,
            config: BlendConfig::default(),
        }
    }

    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &BlendConfig {
        &self.config
    }

    fn lookup(&self, name: &str) -> Result<Arc<dyn CandidateGenerator>, BlendError> {
        self.registry
            .get(name)
            .ok_or_else(|| BlendError::UnknownGenerator(name.to_string()))
    }

    /// Run `request` against `backend`.
    ///
    /// Every generator name (primary and infill) is resolved before the first
    /// backend call. Any generator failure aborts the whole request.
    #[tracing::instrument(
        skip(self, backend, request),
        fields(user_did = %request.user_did, num_candidates = request.num_candidates)
    )]
    pub async fn blend(
        &self,
        backend: &dyn SearchBackend,
        request: &BlendRequest,
    ) -> Result<BlendResult, BlendError> {
        request.validate(self.config.max_num_candidates)?;

        let mut resolved = Vec::with_capacity(request.generators.len());
        for spec in &request.generators {
            resolved.push(self.lookup(&spec.name)?);
        }
        let infill = request
            .infill
            .as_deref()
            .map(|name| self.lookup(name))
            .transpose()?;

        let total = request.num_candidates;
        let weights: Vec<f64> = request.generators.iter().map(|s| s.weight).collect();
        let counts = allocate(&weights, total);
        let plan: Vec<Planned> = resolved
            .into_iter()
            .zip(counts)
            .map(|(generator, count)| Planned { generator, count })
            .collect();
        tracing::debug!(
            allocation = ?plan.iter().map(|p| (p.generator.name(), p.count)).collect::<Vec<_>>(),
            "allocated candidates"
        );

        let results = self.run_primaries(backend, request, &plan).await?;

        let allocations: Vec<Allocation> = plan
            .iter()
            .zip(&results)
            .map(|(planned, result)| Allocation {
                generator: planned.generator.name().to_string(),
                requested: planned.count,
                returned: result.len(),
            })
            .collect();

        let merged = results.into_iter().flat_map(|r| r.candidates).collect();
        let mut candidates = dedup_candidates(merged);

        let mut infill_report = None;
        if candidates.len() < total {
            match infill {
                Some(generator) => {
                    let shortfall = total - candidates.len();
                    let requested = shortfall.saturating_mul(self.config.infill_multiplier);
                    tracing::info!(
                        generator = generator.name(),
                        shortfall,
                        requested,
                        "infilling shortfall"
                    );
                    let extra = invoke(generator.as_ref(), backend, request, requested).await?;
                    infill_report = Some(InfillReport {
                        generator: generator.name().to_string(),
                        requested,
                        returned: extra.len(),
                    });
                    candidates.extend(extra.candidates);
                    candidates = dedup_candidates(candidates);
                }
                None => {
                    tracing::debug!(
                        returned = candidates.len(),
                        "short of requested count, no infill configured"
                    );
                }
            }
        }
        candidates.truncate(total);

        tracing::info!(returned = candidates.len(), "blend complete");
        Ok(BlendResult {
            candidates,
            allocations,
            infill: infill_report,
        })
    }

    async fn run_primaries(
        &self,
        backend: &dyn SearchBackend,
        request: &BlendRequest,
        plan: &[Planned],
    ) -> Result<Vec<CandidateResult>, BlendError> {
        match self.config.execution {
            ExecutionMode::Sequential => {
                let mut results = Vec::with_capacity(plan.len());
                for planned in plan {
                    results.push(run_planned(planned, backend, request).await?);
                }
                Ok(results)
            }
            ExecutionMode::Concurrent => {
                // try_join_all yields results in input order
                try_join_all(
                    plan.iter()
                        .map(|planned| run_planned(planned, backend, request)),
                )
                .await
            }
        }
    }
}

async fn run_planned(
    planned: &Planned,
    backend: &dyn SearchBackend,
    request: &BlendRequest,
) -> Result<CandidateResult, BlendError> {
    if planned.count == 0 {
        return Ok(CandidateResult::empty(planned.generator.name()));
    }
    invoke(planned.generator.as_ref(), backend, request, planned.count).await
}

/// Call one generator, capping its output at `count`.
async fn invoke(
    generator: &dyn CandidateGenerator,
    backend: &dyn SearchBackend,
    request: &BlendRequest,
    count: usize,
) -> Result<CandidateResult, BlendError> {
    let mut result = generator
        .generate(backend, &request.user_did, count, request.video_only)
        .await
        .map_err(|source| {
            tracing::warn!(generator = generator.name(), error = %source, "generator failed");
            BlendError::Generator {
                generator: generator.name().to_string(),
                source,
            }
        })?;
    result.candidates.truncate(count);
    tracing::debug!(
        generator = generator.name(),
        requested = count,
        returned = result.len(),
        "generator returned"
    );
    Ok(result)
}
