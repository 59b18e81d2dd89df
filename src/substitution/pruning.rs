use crate::error::{RbError, RbResult};
use crate::substitution::character::CharacterMatrix;
use crate::substitution::partials::PartialLikelihoodCache;
use crate::substitution::pmatrix::TransitionProbabilityCache;
use crate::substitution::rate_matrix::RateGenerator;
use crate::tree::{Node, Tree};
use crate::LogProbability;

/// Felsenstein pruning over a CTMC substitution model, with site-rate
/// mixture categories and optional per-branch heterotachy (§4.E). A single
/// instance is parameterized once per likelihood evaluation; the tree,
/// character data, and both caches are passed in per call so the kernel
/// itself holds no mutable tree-shaped state.
pub struct PruningKernel<'a> {
    pub rate_generator: &'a dyn RateGenerator,
    pub clock_rate: f64,
    /// one entry per mixture category; defaults to `vec![1.0]` for a
    /// single-category model.
    pub site_rate_multipliers: Vec<f64>,
    /// one entry per heterotachy category; a single entry means H=1 and no
    /// `branch_site_rates_mixture` node is needed (§4.E tie-break).
    pub heterotachy_rate_multipliers: Vec<f64>,
    /// stationary frequencies per mixture category, each of length C.
    pub root_frequencies: Vec<Vec<f64>>,
    /// per-node scalar rate override (`branch_site_rates`); when present
    /// with H>1, P(t) is recomputed live from ages instead of read from
    /// the cache (§4.E).
    pub branch_site_rates: Option<Vec<f64>>,
}

impl<'a> PruningKernel<'a> {
    fn num_states(&self) -> usize {
        self.rate_generator.num_states()
    }

    fn num_heterotachy(&self) -> usize {
        self.heterotachy_rate_multipliers.len().max(1)
    }

    fn p_matrix(&self, v: usize, tree: &Tree, pmat_cache: &TransitionProbabilityCache, m: usize, k: usize) -> Vec<f64> {
        match &self.branch_site_rates {
            Some(rates) if self.heterotachy_rate_multipliers.len() > 1 => {
                let node = Node::from((v, tree));
                let parent = node
                    .parent()
                    .expect("branch_site_rates override requires a non-root node");
                let mut start_age = parent.data().age;
                let mut end_age = node.data().age;
                if !start_age.is_finite() {
                    start_age = 0.0;
                }
                if !end_age.is_finite() {
                    end_age = 0.0;
                }
                let r_m = self.site_rate_multipliers.get(m).copied().unwrap_or(1.0);
                let h_k = self.heterotachy_rate_multipliers.get(k).copied().unwrap_or(1.0);
                let extra = rates.get(v).copied().unwrap_or(1.0);
                self.rate_generator
                    .transition_probabilities(start_age, end_age, self.clock_rate * r_m * h_k * extra)
            }
            _ => pmat_cache.read(v, m, k).to_vec(),
        }
    }

    /// `(1/H) · Σ_k Σ_c2 P_{v,m,k}[c1,c2] · child_factor(c2)`, the shared
    /// shape of the tip and internal recurrences (§4.E).
    fn accumulate_from_p(
        &self,
        v: usize,
        tree: &Tree,
        pmat_cache: &TransitionProbabilityCache,
        m: usize,
        child_factor: impl Fn(usize) -> f64,
    ) -> Vec<f64> {
        let c = self.num_states();
        let h = self.num_heterotachy();
        let mut l = vec![0.0; c];
        for k in 0..h {
            let p = self.p_matrix(v, tree, pmat_cache, m, k);
            for c1 in 0..c {
                let mut acc = 0.0;
                for c2 in 0..c {
                    acc += p[c1 * c + c2] * child_factor(c2);
                }
                l[c1] += acc;
            }
        }
        for x in l.iter_mut() {
            *x /= h as f64;
        }
        l
    }

    fn recompute_tip(
        &self,
        v: usize,
        tree: &Tree,
        characters: &CharacterMatrix,
        pmat_cache: &TransitionProbabilityCache,
        partials: &mut PartialLikelihoodCache,
    ) -> RbResult<()> {
        let c = self.num_states();
        let taxon = Node::from((v, tree))
            .data()
            .taxon
            .clone()
            .ok_or_else(|| RbError::Validation(format!("tip node {v} has no taxon")))?;
        partials.recompute_node(v, |m, s| {
            let ch = characters.get(&taxon, s)?;
            if ch.gap {
                return Ok(vec![1.0; c]);
            }
            let mut weights = vec![0.0; c];
            for (idx, w) in ch.contributing_states(c) {
                weights[idx] += w;
            }
            Ok(self.accumulate_from_p(v, tree, pmat_cache, m, |c2| weights[c2]))
        })
    }

    fn recompute_internal(
        &self,
        v: usize,
        tree: &Tree,
        pmat_cache: &TransitionProbabilityCache,
        partials: &mut PartialLikelihoodCache,
    ) -> RbResult<()> {
        let children = Node::from((v, tree)).children();
        if children.is_empty() || children.len() > 3 {
            return Err(RbError::Validation(format!(
                "node {v} has unsupported child arity {} (must be 1, 2, or 3)",
                children.len()
            )));
        }
        let num_patterns = partials.num_patterns();
        let c = self.num_states();
        let child_snapshots: Vec<Vec<f64>> = children.iter().map(|ch| partials.snapshot_node(ch.index())).collect();
        partials.recompute_node(v, |m, s| {
            check_partial_bounds(self.accumulate_from_p(v, tree, pmat_cache, m, |c2| {
                child_snapshots
                    .iter()
                    .map(|snap| partials_read_snapshot(snap, m, s, c2, c, num_patterns))
                    .product()
            }))
        })
    }

    fn recompute_root(&self, v: usize, tree: &Tree, partials: &mut PartialLikelihoodCache) -> RbResult<()> {
        let children = Node::from((v, tree)).children();
        if children.is_empty() {
            return Err(RbError::Validation(format!("root {v} has no children")));
        }
        let c = self.num_states();
        let num_patterns = partials.num_patterns();
        let child_snapshots: Vec<Vec<f64>> = children.iter().map(|ch| partials.snapshot_node(ch.index())).collect();
        partials.recompute_node(v, |m, s| {
            let freqs = self
                .root_frequencies
                .get(m)
                .ok_or_else(|| RbError::Validation(format!("no root frequencies for mixture {m}")))?;
            let mut l = vec![0.0; c];
            for c1 in 0..c {
                let mut prod = freqs[c1];
                for snap in &child_snapshots {
                    prod *= partials_read_snapshot(snap, m, s, c1, c, num_patterns);
                }
                l[c1] = prod;
            }
            check_partial_bounds(l)
        })
    }

    /// recompute every dirty node (plus ancestors of any recomputed
    /// descendant) in post-order, then return the per-pattern
    /// log-likelihood `log((1/M) · Σ_m Σ_c1 L[root,m,s,c1])` (§4.E). A
    /// non-finite or non-positive marginal surfaces as `-inf`, never as an
    /// error (§7).
    pub fn site_log_likelihoods(
        &self,
        tree: &Tree,
        characters: &CharacterMatrix,
        pmat_cache: &TransitionProbabilityCache,
        partials: &mut PartialLikelihoodCache,
        touched_nodes: &[usize],
    ) -> RbResult<Vec<LogProbability>> {
        log::trace!("site_log_likelihoods: {} nodes marked dirty", touched_nodes.len());
        for &n in touched_nodes {
            partials.mark_dirty(n);
        }
        let mut recomputed = std::collections::HashSet::new();
        for v in tree.post_order() {
            let node = tree.node(v);
            let child_changed = node.children.iter().any(|c| recomputed.contains(c));
            if !partials.is_dirty(v) && !child_changed {
                continue;
            }
            if node.is_root() {
                self.recompute_root(v, tree, partials)?;
            } else if node.is_tip() {
                self.recompute_tip(v, tree, characters, pmat_cache, partials)?;
            } else {
                self.recompute_internal(v, tree, pmat_cache, partials)?;
            }
            recomputed.insert(v);
        }
        log::debug!(
            "site_log_likelihoods: recomputed {}/{} nodes",
            recomputed.len(),
            tree.num_nodes()
        );

        let root = tree.root();
        let num_patterns = partials.num_patterns();
        let m_count = self.root_frequencies.len().max(1) as f64;
        let mut out = Vec::with_capacity(num_patterns);
        for s in 0..num_patterns {
            let mut total = 0.0;
            for mi in 0..self.root_frequencies.len() {
                total += partials.read(root, mi, s).iter().sum::<f64>();
            }
            let avg = total / m_count;
            out.push(if avg.is_finite() && avg > 0.0 {
                avg.ln()
            } else {
                log::trace!("site_log_likelihoods: pattern {s} has non-positive marginal {avg}, -> -inf");
                f64::NEG_INFINITY
            });
        }
        Ok(out)
    }

    /// total log-likelihood, site log-likelihoods weighted by pattern
    /// multiplicity (§4.E, §6).
    pub fn total_log_likelihood(site_ll: &[LogProbability], pattern_weights: &[f64]) -> LogProbability {
        site_ll.iter().zip(pattern_weights).map(|(ll, w)| ll * w).sum()
    }
}

fn partials_read_snapshot(snapshot: &[f64], mixture: usize, pattern: usize, state: usize, c: usize, num_patterns: usize) -> f64 {
    let idx = (mixture * num_patterns + pattern) * c + state;
    snapshot[idx]
}

/// enforces the numerical sanity bound `[0, 1 + PARTIAL_LIKELIHOOD_EPSILON]`
/// (§4.E) on every partial the internal/root recurrences write: both are
/// sums of `P(t)[c1,c2] · child_factor(c2)` with stochastic rows and
/// `child_factor` itself in this range, so the result can only exceed 1 by
/// floating-point slop.
fn check_partial_bounds(values: Vec<f64>) -> RbResult<Vec<f64>> {
    for &x in &values {
        if !(0.0..=1.0 + crate::PARTIAL_LIKELIHOOD_EPSILON).contains(&x) {
            return Err(RbError::Validation(format!(
                "computed partial {x} outside numerical sanity bound [0, 1+{}]",
                crate::PARTIAL_LIKELIHOOD_EPSILON
            )));
        }
    }
    Ok(values)
}
