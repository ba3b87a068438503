//! Picks one weighted candidate per screen slot.

use kiosk_model::WeightedCandidate;
use rand::Rng;

/// Logarithmic dampening applied to a bucket's size before sampling.
///
/// Keeps a 10 000-item bucket from permanently drowning out a 10-item one:
/// `max(1, ln(weight + 1))`.
pub fn dampened_weight(weight: u64) -> f64 {
    (weight as f64 + 1.0).ln().max(1.0)
}

/// Chooses a candidate.
///
/// Zero-weight entries are ignored. With nothing left the unconstrained
/// sentinel is returned; a single survivor is returned without touching
/// `rng`.
pub fn pick<R: Rng>(
    candidates: &[WeightedCandidate],
    weighting: bool,
    rng: &mut R,
) -> WeightedCandidate {
    let live: Vec<&WeightedCandidate> =
        candidates.iter().filter(|c| c.weight > 0).collect();

    match live.as_slice() {
        [] => WeightedCandidate::unconstrained(),
        [only] => (*only).clone(),
        _ if !weighting => live[rng.random_range(0..live.len())].clone(),
        _ => {
            let weights: Vec<f64> =
                live.iter().map(|c| dampened_weight(c.weight)).collect();
            let total: f64 = weights.iter().sum();
            let mut target = rng.random_range(0.0..total);

            for (candidate, weight) in live.iter().zip(&weights) {
                if target < *weight {
                    return (*candidate).clone();
                }
                target -= weight;
            }
            // Float rounding can leave `target` a hair past the last bucket.
            live[live.len() - 1].clone()
        }
    }
}
