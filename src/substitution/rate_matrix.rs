use serde::{Deserialize, Serialize};

/// The interface the pruning kernel needs from a substitution model: given a
/// branch's start/end ages and an instantaneous rate, produce the flattened
/// row-major C×C transition-probability matrix `P(t) = exp((start-end)·rate·R)`.
/// General rate-matrix construction and eigendecomposition are external
/// collaborators (§1, out of scope); this crate ships exactly the one
/// closed-form generator needed to test the kernel (invariant #3).
pub trait RateGenerator: std::fmt::Debug {
    fn num_states(&self) -> usize;
    fn transition_probabilities(&self, start_age: f64, end_age: f64, rate: f64) -> Vec<f64>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RateMatrix {
    JukesCantor { num_states: usize },
}

impl RateMatrix {
    pub fn jc69() -> Self {
        RateMatrix::JukesCantor { num_states: 4 }
    }
}

impl RateGenerator for RateMatrix {
    fn num_states(&self) -> usize {
        match self {
            RateMatrix::JukesCantor { num_states } => *num_states,
        }
    }

    fn transition_probabilities(&self, start_age: f64, end_age: f64, rate: f64) -> Vec<f64> {
        match self {
            RateMatrix::JukesCantor { num_states } => jc_transition_probabilities(
                *num_states,
                (start_age - end_age) * rate,
            ),
        }
    }
}

fn jc_transition_probabilities(c: usize, t: f64) -> Vec<f64> {
    let n = c as f64;
    let u = (-(n / (n - 1.0)) * t).exp();
    let same = 1.0 / n + (n - 1.0) / n * u;
    let diff = 1.0 / n - u / n;
    let mut m = vec![0.0; c * c];
    for i in 0..c {
        for j in 0..c {
            m[i * c + j] = if i == j { same } else { diff };
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jc69_rows_sum_to_one() {
        let jc = RateMatrix::jc69();
        let p = jc.transition_probabilities(1.0, 0.0, 1.0);
        for row in 0..4 {
            let sum: f64 = p[row * 4..row * 4 + 4].iter().sum();
            assert!((sum - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn jc69_matches_closed_form_as_t_grows() {
        // as t -> infinity every entry tends to 1/num_states
        let jc = RateMatrix::jc69();
        let p = jc.transition_probabilities(1e6, 0.0, 1.0);
        for entry in p {
            assert!((entry - 0.25).abs() < 1e-6);
        }
    }
}
