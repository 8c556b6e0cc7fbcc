use std::collections::HashSet;

use candidates::Candidate;

/// Keep the first candidate for each identity, preserving order.
///
/// Candidates without an identity are all kept.
pub fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());
    candidates
        .into_iter()
        .filter(|candidate| match candidate.identity() {
            Some(id) => seen.insert(id.to_string()),
            None => true,
        })
        .collect()
}
