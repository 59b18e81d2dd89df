use crate::LogProbability;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Gamma};

/// One gene tree's lineage history inside a single species branch (§4.F.3):
/// `entering` lineages enter at the branch bottom; `coalescence_times` are
/// ascending times-since-branch-bottom at which two lineages merge.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneLineages {
    pub entering: usize,
    pub coalescence_times: Vec<f64>,
}

/// Accumulates `a_b` (coalescence count) and `b_b` (the `Σ Δτ·k(k−1)`
/// statistic) for one species branch across every gene (§4.F.3).
pub fn branch_statistics(branch_length: f64, is_root_branch: bool, genes: &[GeneLineages]) -> (u64, f64) {
    let mut a_b = 0u64;
    let mut b_b = 0.0;
    for gene in genes {
        let mut k = gene.entering;
        let mut prev = 0.0;
        for &tau in &gene.coalescence_times {
            let dt = tau - prev;
            b_b += dt * (k as f64) * ((k - 1) as f64);
            k -= 1;
            prev = tau;
            a_b += 1;
        }
        if !is_root_branch {
            let dt = branch_length - prev;
            b_b += dt * (k as f64) * ((k - 1) as f64);
        }
    }
    (a_b, b_b)
}

/// `ln p_b` under an inverse-gamma(shape=alpha, rate=beta) prior on the
/// branch's (diploid, ploidy=2) effective population size (§4.F.3).
pub fn branch_log_density(alpha: f64, beta: f64, a_b: u64, b_b: f64) -> LogProbability {
    let a = a_b as f64;
    let mut ln_p = a * 2.0_f64.ln() + alpha * beta.ln() - (alpha + a) * (beta + b_b).ln();
    for i in 0..a_b {
        ln_p += (alpha + i as f64).ln();
    }
    ln_p
}

/// One species branch's full contribution: its own gene histories plus the
/// shared inverse-gamma hyperparameters.
#[derive(Debug, Clone)]
pub struct SpeciesBranch {
    pub branch_length: f64,
    pub is_root_branch: bool,
    pub genes: Vec<GeneLineages>,
}

/// Multispecies-coalescent density with an inverse-gamma prior on each
/// branch's effective population size, summed over every species branch
/// (§4.F.3). Full species-tree-conditioned gene-tree simulation is an
/// external collaborator's concern (§1); this type evaluates the closed-form
/// density given already-reconciled gene-tree coalescence times per branch,
/// and draws per-branch Ne values for simulation.
#[derive(Debug, Clone)]
pub struct MultispeciesCoalescentInverseGamma {
    pub alpha: f64,
    pub beta: f64,
    pub branches: Vec<SpeciesBranch>,
}

impl MultispeciesCoalescentInverseGamma {
    pub fn log_density(&self) -> LogProbability {
        self.branches
            .iter()
            .map(|b| {
                let (a_b, b_b) = branch_statistics(b.branch_length, b.is_root_branch, &b.genes);
                branch_log_density(self.alpha, self.beta, a_b, b_b)
            })
            .sum()
    }

    pub fn simulate_ne(&self, rng: &mut SmallRng) -> f64 {
        simulate_inverse_gamma(self.alpha, self.beta, rng)
    }
}

/// `Ne ~ InverseGamma(alpha, beta)`, sampled as `1 / Gamma(alpha, 1/beta)`.
pub fn simulate_inverse_gamma(alpha: f64, beta: f64, rng: &mut SmallRng) -> f64 {
    let gamma = Gamma::new(alpha, 1.0 / beta).expect("alpha and beta must be positive");
    1.0 / gamma.sample(rng)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S6: one species branch of length t, one gene tree with two lineages
    /// entering and one coalescence at tau.
    #[test]
    fn scenario_s6_single_branch_single_gene() {
        let t = 4.0;
        let tau = 1.5;
        let alpha = 2.0;
        let beta = 3.0;
        let genes = vec![GeneLineages {
            entering: 2,
            coalescence_times: vec![tau],
        }];
        let (a_b, b_b) = branch_statistics(t, false, &genes);
        assert_eq!(a_b, 1);
        assert!((b_b - 2.0 * tau).abs() < 1e-12);
        let ln_p = branch_log_density(alpha, beta, a_b, b_b);
        let expected = 2.0_f64.ln() + alpha * beta.ln() - (alpha + 1.0) * (beta + 2.0 * tau).ln() + alpha.ln();
        assert!((ln_p - expected).abs() < 1e-12);
    }

    #[test]
    fn root_branch_has_no_tail_interval() {
        let genes = vec![GeneLineages {
            entering: 3,
            coalescence_times: vec![1.0, 2.0],
        }];
        let (_, b_b_root) = branch_statistics(10.0, true, &genes);
        let (_, b_b_non_root) = branch_statistics(10.0, false, &genes);
        assert!(b_b_non_root > b_b_root);
    }

    /// invariant #6: the density is symmetric in gene-tree labels, since
    /// a_b/b_b are unordered sums across genes.
    #[test]
    fn invariant_6_symmetric_in_gene_tree_labels() {
        let genes_a = vec![
            GeneLineages {
                entering: 2,
                coalescence_times: vec![0.5],
            },
            GeneLineages {
                entering: 3,
                coalescence_times: vec![0.2, 0.9],
            },
        ];
        let mut genes_b = genes_a.clone();
        genes_b.reverse();
        let (a1, b1) = branch_statistics(5.0, false, &genes_a);
        let (a2, b2) = branch_statistics(5.0, false, &genes_b);
        assert_eq!(a1, a2);
        assert!((b1 - b2).abs() < 1e-12);
    }
}
