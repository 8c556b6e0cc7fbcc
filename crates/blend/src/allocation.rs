//! Largest-remainder (Hamilton) apportionment of a total count across
//! weighted slots.

/// Split `total` across `weights` in proportion, summing exactly to `total`.
///
/// Each slot first gets `floor(w / sum(w) * total)`; the units left over go
/// one each to the slots with the largest fractional parts, earlier slots
/// winning ties. Weights are expected to be finite and positive.
pub fn allocate(weights: &[f64], total: usize) -> Vec<usize> {
    if weights.is_empty() {
        return Vec::new();
    }
    // scale into (0, 1] first so the sum and the products stay finite
    let max = weights.iter().copied().fold(0.0f64, f64::max);
    let normalised: Vec<f64> = if max > 0.0 && max.is_finite() {
        weights.iter().map(|w| w / max).collect()
    } else {
        vec![1.0; weights.len()]
    };
    let sum: f64 = normalised.iter().sum();
    let raw: Vec<f64> = normalised
        .iter()
        .map(|w| (w / sum) * total as f64)
        .collect();

    let mut counts: Vec<usize> = raw
        .iter()
        .map(|r| (r.floor() as usize).min(total))
        .collect();
    let mut assigned = counts
        .iter()
        .fold(0usize, |acc, &c| acc.saturating_add(c));
    // only float error could push the floors past the total; trim from the back
    for count in counts.iter_mut().rev() {
        if assigned <= total {
            break;
        }
        let cut = (assigned - total).min(*count);
        *count -= cut;
        assigned -= cut;
    }
    let remaining = total - assigned;

    let mut order: Vec<usize> = (0..weights.len()).collect();
    // stable sort keeps request order among equal remainders
    order.sort_by(|&a, &b| {
        let fa = raw[a] - raw[a].floor();
        let fb = raw[b] - raw[b].floor();
        fb.total_cmp(&fa)
    });
    for &slot in order.iter().cycle().take(remaining) {
        counts[slot] += 1;
    }
    counts
}
