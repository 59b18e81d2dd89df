/// Flat double buffer of per-(node, mixture, pattern) partial likelihood
/// vectors, sized `2 · num_nodes · num_mixtures · num_patterns · C` (§3).
/// Dirty tracking is explicit: `dirty[node]` is set by the caller whenever
/// the node (or one of its parameters) was touched, and cleared the moment
/// the kernel recomputes it; `pending[node]` tracks whether this round's
/// active-bit flip still needs a `keep`/`restore` decision, mirroring
/// `TransitionProbabilityCache`.
pub struct PartialLikelihoodCache {
    num_nodes: usize,
    num_mixtures: usize,
    num_patterns: usize,
    num_states: usize,
    buffer: Vec<f64>,
    active: Vec<bool>,
    dirty: Vec<bool>,
    pending: Vec<bool>,
}

impl PartialLikelihoodCache {
    pub fn new(num_nodes: usize, num_mixtures: usize, num_patterns: usize, num_states: usize) -> Self {
        let per_node = num_mixtures * num_patterns * num_states;
        let per_copy = num_nodes * per_node;
        Self {
            num_nodes,
            num_mixtures,
            num_patterns,
            num_states,
            buffer: vec![0.0; 2 * per_copy],
            active: vec![false; num_nodes],
            dirty: vec![true; num_nodes],
            pending: vec![false; num_nodes],
        }
    }

    pub fn num_patterns(&self) -> usize {
        self.num_patterns
    }

    fn per_node(&self) -> usize {
        self.num_mixtures * self.num_patterns * self.num_states
    }

    fn offset(&self, active_bit: bool, node: usize, mixture: usize, pattern: usize) -> usize {
        let per_node = self.per_node();
        let per_copy = self.num_nodes * per_node;
        (active_bit as usize) * per_copy + node * per_node + (mixture * self.num_patterns + pattern) * self.num_states
    }

    pub fn read(&self, node: usize, mixture: usize, pattern: usize) -> &[f64] {
        let off = self.offset(self.active[node], node, mixture, pattern);
        &self.buffer[off..off + self.num_states]
    }

    /// a copy of every (mixture, pattern) partial currently active for
    /// `node`, used by callers that need to read a child's cache while
    /// recomputing a parent (avoids borrowing `self` both ways at once).
    pub fn snapshot_node(&self, node: usize) -> Vec<f64> {
        let per_node = self.per_node();
        let off = self.offset(self.active[node], node, 0, 0);
        self.buffer[off..off + per_node].to_vec()
    }

    pub fn read_snapshot<'a>(&self, snapshot: &'a [f64], mixture: usize, pattern: usize) -> &'a [f64] {
        let idx = (mixture * self.num_patterns + pattern) * self.num_states;
        &snapshot[idx..idx + self.num_states]
    }

    pub fn mark_dirty(&mut self, node: usize) {
        self.dirty[node] = true;
    }

    pub fn is_dirty(&self, node: usize) -> bool {
        self.dirty[node]
    }

    /// recompute every (mixture, pattern) slice for `node` from
    /// `producer(mixture, pattern)`, write into the inactive slot, flip the
    /// active bit, and clear `dirty`.
    pub fn recompute_node<F, E>(&mut self, node: usize, mut producer: F) -> Result<(), E>
    where
        F: FnMut(usize, usize) -> Result<Vec<f64>, E>,
    {
        let new_active = !self.active[node];
        let mut writes = Vec::with_capacity(self.num_mixtures * self.num_patterns);
        for m in 0..self.num_mixtures {
            for s in 0..self.num_patterns {
                writes.push((m, s, producer(m, s)?));
            }
        }
        for (m, s, values) in writes {
            debug_assert_eq!(values.len(), self.num_states);
            let off = self.offset(new_active, node, m, s);
            self.buffer[off..off + self.num_states].copy_from_slice(&values);
        }
        self.active[node] = new_active;
        self.pending[node] = true;
        self.dirty[node] = false;
        Ok(())
    }

    pub fn keep(&mut self, node: usize) {
        self.pending[node] = false;
    }

    pub fn restore(&mut self, node: usize) {
        if self.pending[node] {
            self.active[node] = !self.active[node];
            self.pending[node] = false;
            self.dirty[node] = true;
        }
    }
}
