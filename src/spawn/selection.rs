//! Random tier and candidate selection. Every function takes its random
//! source as a parameter so callers can pass a seeded generator.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::Tier;

/// Draw a tier: first an independent roll for S, then a weighted pick over 1..=6.
///
/// All-zero weights fall back to the lowest tier.
pub fn draw_tier<R: Rng + ?Sized>(rng: &mut R, weights: &[u32; 6], s_tier_chance: f64) -> Tier {
    if s_tier_chance > 0.0 && rng.gen_bool(s_tier_chance.min(1.0)) {
        return Tier::S;
    }
    match WeightedIndex::new(weights.iter().copied()) {
        Ok(dist) => Tier::WEIGHTED[dist.sample(rng)],
        Err(_) => Tier::lowest(),
    }
}

/// Uniform random permutation of a candidate pool
pub fn shuffled<T: Clone, R: Rng + ?Sized>(rng: &mut R, pool: &[T]) -> Vec<T> {
    let mut order = pool.to_vec();
    order.shuffle(rng);
    order
}
