use crate::error::RbResult;

/// Flat double buffer of transition-probability matrices, one per
/// (node, mixture, heterotachy) triple, addressed as `[active(node)] ·
/// activePmatrixOffset + node · pmatNodeOffset + (mixture·H +
/// heterotachy) · C²` (§3, §4.D). The stride is `mixture·H +
/// heterotachy`, not `mixture + heterotachy` — see DESIGN.md for why.
///
/// `recompute_branch` writes the freshly computed matrices into the
/// inactive slot and flips `active[node]` in the same call, matching
/// §4.D: the flip happens at update time, `keep` only confirms it and
/// `restore` is the one operation that undoes it.
pub struct TransitionProbabilityCache {
    num_nodes: usize,
    num_mixtures: usize,
    num_heterotachy: usize,
    num_states: usize,
    buffer: Vec<f64>,
    active: Vec<bool>,
    pending: Vec<bool>,
}

impl TransitionProbabilityCache {
    pub fn new(num_nodes: usize, num_mixtures: usize, num_heterotachy: usize, num_states: usize) -> Self {
        let per_node = num_mixtures * num_heterotachy * num_states * num_states;
        let per_copy = num_nodes * per_node;
        Self {
            num_nodes,
            num_mixtures,
            num_heterotachy,
            num_states,
            buffer: vec![0.0; 2 * per_copy],
            active: vec![false; num_nodes],
            pending: vec![false; num_nodes],
        }
    }

    fn per_node(&self) -> usize {
        self.num_mixtures * self.num_heterotachy * self.num_states * self.num_states
    }

    fn offset(&self, active_bit: bool, node: usize, mixture: usize, heterotachy: usize) -> usize {
        let per_node = self.per_node();
        let per_copy = self.num_nodes * per_node;
        let c2 = self.num_states * self.num_states;
        (active_bit as usize) * per_copy + node * per_node + (mixture * self.num_heterotachy + heterotachy) * c2
    }

    /// the currently active, row-major C×C matrix for this branch.
    pub fn read(&self, node: usize, mixture: usize, heterotachy: usize) -> &[f64] {
        let off = self.offset(self.active[node], node, mixture, heterotachy);
        &self.buffer[off..off + self.num_states * self.num_states]
    }

    /// recompute every (mixture, heterotachy) matrix for `node` from
    /// `producer(mixture, heterotachy)`, write into the inactive slot, and
    /// tentatively flip the active bit.
    pub fn recompute_branch<F>(&mut self, node: usize, mut producer: F) -> RbResult<()>
    where
        F: FnMut(usize, usize) -> RbResult<Vec<f64>>,
    {
        let new_active = !self.active[node];
        let c2 = self.num_states * self.num_states;
        let mut writes = Vec::with_capacity(self.num_mixtures * self.num_heterotachy);
        for m in 0..self.num_mixtures {
            for k in 0..self.num_heterotachy {
                let matrix = producer(m, k)?;
                debug_assert_eq!(matrix.len(), c2);
                writes.push((m, k, matrix));
            }
        }
        for (m, k, matrix) in writes {
            let off = self.offset(new_active, node, m, k);
            self.buffer[off..off + c2].copy_from_slice(&matrix);
        }
        self.active[node] = new_active;
        self.pending[node] = true;
        Ok(())
    }

    pub fn keep(&mut self, node: usize) {
        self.pending[node] = false;
    }

    pub fn restore(&mut self, node: usize) {
        if self.pending[node] {
            self.active[node] = !self.active[node];
            self.pending[node] = false;
        }
    }
}
