pub mod dag;
pub mod error;
pub mod priors;
pub mod proposal;
pub mod substitution;
pub mod tree;

/// dimensional analysis types
pub type Probability = f64;
pub type LogProbability = f64;
pub type Age = f64;
pub type BranchLength = f64;

/// MCMC tuning parameters (§6)
pub const TARGET_ACCEPTANCE: Probability = 0.44;
pub const TUNE_MIN: f64 = 0.0;
pub const TUNE_MAX: f64 = 10_000.0;

/// numerical sanity bound used by the pruning kernel (§4.E)
pub const PARTIAL_LIKELIHOOD_EPSILON: f64 = 1e-11;

/// trait for random generation, mainly (strictly?) for testing
pub trait Arbitrary {
    fn random() -> Self;
}

/// multiply `scale` by the standard Robbins-Monro tuning update and clamp
/// it to `[TUNE_MIN, TUNE_MAX]` (§6). A fixed point at `acceptance_rate ==
/// TARGET_ACCEPTANCE` is guaranteed by construction (invariant #8).
pub fn tune_scale(scale: f64, acceptance_rate: Probability) -> f64 {
    let updated = if acceptance_rate > TARGET_ACCEPTANCE {
        scale * (1.0 + (acceptance_rate - TARGET_ACCEPTANCE) / 0.56)
    } else {
        scale / (2.0 - acceptance_rate / TARGET_ACCEPTANCE)
    };
    updated.clamp(TUNE_MIN, TUNE_MAX)
}
