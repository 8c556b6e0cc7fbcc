use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::CandidateError;
use crate::generator::CandidateGenerator;

/// Name → generator lookup.
///
/// Built once with `&mut` access, then shared read-only (typically behind an
/// `Arc`) by every request.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: BTreeMap<String, Arc<dyn CandidateGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `generator` under its own name.
    ///
    /// Names must be non-blank and free of surrounding whitespace.
    ///
    /// A later registration with the same name replaces the earlier one, which
    /// is returned.
    pub fn register<G>(
        &mut self,
        generator: G,
    ) -> Result<Option<Arc<dyn CandidateGenerator>>, CandidateError>
    where
        G: CandidateGenerator + 'static,
    {
        self.register_arc(Arc::new(generator))
    }

    pub fn register_arc(
        &mut self,
        generator: Arc<dyn CandidateGenerator>,
    ) -> Result<Option<Arc<dyn CandidateGenerator>>, CandidateError> {
        let name = generator.name();
        if name.trim().is_empty() {
            return Err(CandidateError::InvalidConfig(
                "generator name must not be empty".into(),
            ));
        }
        // the key must be exactly the provenance stamped on candidates
        if name.trim() != name {
            return Err(CandidateError::InvalidConfig(format!(
                "generator name {name:?} has surrounding whitespace"
            )));
        }
        let name = name.to_string();
        let previous = self.generators.insert(name.clone(), generator);
        if previous.is_some() {
            tracing::debug!(generator = %name, "replaced registered generator");
        }
        Ok(previous)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CandidateGenerator>> {
        self.generators.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.generators.contains_key(name)
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> Vec<&str> {
        self.generators.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("names", &self.names())
            .finish()
    }
}
