use super::node::{MonitorHandle, NodeData, NodeKind};
use super::value::Value;
use crate::error::{RbError, RbResult};
use crate::LogProbability;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction::{Incoming, Outgoing};
use rand::rngs::SmallRng;

/// The probabilistic DAG (component A). An arena of `NodeData` addressed by
/// dense `petgraph::NodeIndex`, exactly the way the teacher's tree graph
/// replaces a pointer graph with index pairs — this removes the cyclic
/// ownership hazard and makes snapshot restore a buffer copy.
#[derive(Default)]
pub struct Dag {
    graph: DiGraph<NodeData, ()>,
}

impl Dag {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
        }
    }

    pub fn add_constant(&mut self, name: impl Into<String>, value: Value) -> NodeIndex {
        self.graph
            .add_node(NodeData::new(name, value, NodeKind::Constant))
    }

    pub fn add_stochastic(
        &mut self,
        name: impl Into<String>,
        value: Value,
        distribution: Box<dyn super::distribution::Distribution>,
    ) -> NodeIndex {
        self.graph.add_node(NodeData::new(
            name,
            value,
            NodeKind::Stochastic(distribution),
        ))
    }

    pub fn add_deterministic(
        &mut self,
        name: impl Into<String>,
        function: Box<dyn super::function::Function>,
    ) -> NodeIndex {
        let value = function.evaluate(self);
        let idx = self
            .graph
            .add_node(NodeData::new(name, value, NodeKind::Deterministic(function)));
        idx
    }

    /// invariant: for every edge (u,v), u appears in v.parents iff v appears
    /// in u.children; no self-loops.
    pub fn add_edge(&mut self, parent: NodeIndex, child: NodeIndex) -> RbResult<()> {
        if parent == child {
            return Err(RbError::Validation("self-loop in DAG".into()));
        }
        self.graph.add_edge(parent, child, ());
        Ok(())
    }

    pub fn name(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].name
    }

    pub fn parents(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.graph.neighbors_directed(idx, Incoming).collect()
    }

    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.graph.neighbors_directed(idx, Outgoing).collect()
    }

    pub fn is_touched(&self, idx: NodeIndex) -> bool {
        self.graph[idx].touched
    }

    /// attaches a monitor handle to a node's monitor list (§3 data model).
    pub fn attach_monitor(&mut self, idx: NodeIndex, monitor: MonitorHandle) {
        self.graph[idx].monitors.push(monitor);
    }

    pub fn monitors(&self, idx: NodeIndex) -> &[MonitorHandle] {
        &self.graph[idx].monitors
    }

    /// the raw cached value, without refreshing a stale deterministic node
    /// first. Prefer [`Dag::value`] unless you know the node is current.
    pub fn raw_value(&self, idx: NodeIndex) -> &Value {
        &self.graph[idx].value
    }

    /// direct mutable access to a stochastic node's value, for proposals
    /// that mutate it in place (e.g. a tree topology move) rather than
    /// replacing it wholesale via [`Dag::set_value`]. Callers must still
    /// call [`Dag::touch`] themselves afterward.
    pub fn raw_value_mut(&mut self, idx: NodeIndex) -> &mut Value {
        &mut self.graph[idx].value
    }

    /// returns the current value, recomputing first if this is a
    /// deterministic node whose `changed` bit marks it stale. Recomputation
    /// recurses into parents so the whole ancestor chain settles before use.
    pub fn value(&mut self, idx: NodeIndex) -> &Value {
        self.refresh(idx);
        &self.graph[idx].value
    }

    fn refresh(&mut self, idx: NodeIndex) {
        if !self.graph[idx].kind.is_deterministic() || !self.graph[idx].changed {
            return;
        }
        log::trace!("refreshing stale deterministic node '{}'", self.graph[idx].name);
        for parent in self.parents(idx) {
            self.refresh(parent);
        }
        let taken = std::mem::replace(&mut self.graph[idx].kind, NodeKind::Constant);
        if let NodeKind::Deterministic(func) = taken {
            let new_value = func.evaluate(self);
            let node = &mut self.graph[idx];
            node.value = new_value;
            node.changed = false;
            node.kind = NodeKind::Deterministic(func);
        } else {
            self.graph[idx].kind = taken;
        }
    }

    /// sets a stochastic node's value directly (an MCMC move writing a new
    /// sample). `touch` defaults to true, propagating dirt to descendants.
    pub fn set_value(&mut self, idx: NodeIndex, value: Value, touch: bool) {
        self.graph[idx].value = value;
        self.graph[idx].changed = true;
        if touch {
            self.touch(idx);
        }
    }

    /// `touch(affecter)`: idempotent within one MCMC step. Marks `idx`
    /// touched, snapshots it for `restore`, then propagates to every child.
    pub fn touch(&mut self, idx: NodeIndex) {
        if self.graph[idx].begin_touch() {
            log::trace!("touch: '{}' dirtied, propagating to children", self.graph[idx].name);
            for child in self.children(idx) {
                self.touch(child);
            }
        }
    }

    /// accepts the proposal: clears touched flags and discards snapshots,
    /// recursing identically to `touch`.
    pub fn keep(&mut self, idx: NodeIndex) {
        if self.graph[idx].keep() {
            log::trace!("keep: '{}' accepted, snapshot discarded", self.graph[idx].name);
            for child in self.children(idx) {
                self.keep(child);
            }
        }
    }

    /// rejects the proposal: rolls every touched node's value back to its
    /// snapshot, recursing identically to `touch`.
    pub fn restore(&mut self, idx: NodeIndex) {
        if self.graph[idx].restore() {
            log::debug!("restore: '{}' rejected, rolled back to snapshot", self.graph[idx].name);
            for child in self.children(idx) {
                self.restore(child);
            }
        }
    }

    /// `getLnProbability` for a stochastic node: evaluates its owned
    /// `Distribution` against the node's current value.
    pub fn log_density(&mut self, idx: NodeIndex) -> RbResult<LogProbability> {
        self.refresh_ancestors(idx);
        match &self.graph[idx].kind {
            NodeKind::Stochastic(dist) => {
                let value = self.graph[idx].value.clone();
                Ok(dist.log_density(self, &value))
            }
            _ => Err(RbError::Unsupported(format!(
                "node '{}' is not stochastic",
                self.graph[idx].name
            ))),
        }
    }

    fn refresh_ancestors(&mut self, idx: NodeIndex) {
        for parent in self.parents(idx) {
            self.refresh(parent);
        }
    }

    /// redraws a stochastic node from its prior, touching it.
    pub fn redraw(&mut self, idx: NodeIndex, rng: &mut SmallRng) -> RbResult<()> {
        self.refresh_ancestors(idx);
        let new_value = match &self.graph[idx].kind {
            NodeKind::Stochastic(dist) => dist.redraw(self, rng),
            _ => {
                return Err(RbError::Unsupported(format!(
                    "node '{}' is not stochastic",
                    self.graph[idx].name
                )))
            }
        };
        self.set_value(idx, new_value, true);
        Ok(())
    }

    /// `swapParameter(old,new)`: rebinds whichever parameter pointer equals
    /// `old` on the distribution/function owned by `idx`, then rewires the
    /// containing DagNode's parent edges (the caller-responsibility split
    /// described in §4.A).
    pub fn swap_parameter(&mut self, idx: NodeIndex, old: NodeIndex, new: NodeIndex) {
        if let Some(edge) = self.graph.find_edge(old, idx) {
            self.graph.remove_edge(edge);
        }
        self.graph.add_edge(new, idx, ());
        match &mut self.graph[idx].kind {
            NodeKind::Stochastic(dist) => dist.swap_parameter(old, new),
            NodeKind::Deterministic(func) => func.swap_parameter(old, new),
            NodeKind::Constant => {}
        }
        self.touch(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::distribution::Distribution;

    #[derive(Debug)]
    struct Identity;
    impl Distribution for Identity {
        fn log_density(&self, _dag: &Dag, _value: &Value) -> LogProbability {
            0.0
        }
        fn redraw(&self, _dag: &Dag, _rng: &mut SmallRng) -> Value {
            Value::Real(0.0)
        }
        fn swap_parameter(&mut self, _old: NodeIndex, _new: NodeIndex) {}
    }

    #[test]
    fn monitors_accumulate_on_a_node() {
        let mut dag = Dag::new();
        let a = dag.add_stochastic("a", Value::Real(1.0), Box::new(Identity));
        assert!(dag.monitors(a).is_empty());
        dag.attach_monitor(a, MonitorHandle("trace".into()));
        assert_eq!(dag.monitors(a), &[MonitorHandle("trace".into())]);
    }

    #[test]
    fn touch_restore_roundtrip() {
        let mut dag = Dag::new();
        let a = dag.add_stochastic("a", Value::Real(3.0), Box::new(Identity));
        let b = dag.add_stochastic("b", Value::Real(4.0), Box::new(Identity));
        dag.add_edge(a, b).unwrap();

        dag.set_value(a, Value::Real(99.0), true);
        assert!(dag.is_touched(a));
        assert!(dag.is_touched(b));

        dag.restore(a);
        assert_eq!(dag.raw_value(a), &Value::Real(3.0));
        assert!(!dag.is_touched(a));
        assert!(!dag.is_touched(b));
    }

    #[test]
    fn touch_keep_clears_dirt() {
        let mut dag = Dag::new();
        let a = dag.add_stochastic("a", Value::Real(1.0), Box::new(Identity));
        dag.touch(a);
        assert!(dag.is_touched(a));
        dag.keep(a);
        assert!(!dag.is_touched(a));
    }

    #[test]
    fn touch_is_idempotent_within_one_step() {
        let mut dag = Dag::new();
        let a = dag.add_stochastic("a", Value::Real(1.0), Box::new(Identity));
        let b = dag.add_stochastic("b", Value::Real(2.0), Box::new(Identity));
        dag.add_edge(a, b).unwrap();
        dag.touch(a);
        dag.set_value(b, Value::Real(5.0), true); // would re-touch b
        dag.touch(a); // idempotent: already touched, no renewed snapshot
        dag.restore(a);
        // b's snapshot was taken the first time it was touched (value 2.0),
        // so restoring rolls it back even though set_value happened between.
        assert_eq!(dag.raw_value(b), &Value::Real(2.0));
    }

    #[derive(Debug)]
    struct DoubleOf(NodeIndex);
    impl super::super::function::Function for DoubleOf {
        fn evaluate(&self, dag: &Dag) -> Value {
            Value::Real(dag.raw_value(self.0).as_real().unwrap() * 2.0)
        }
        fn swap_parameter(&mut self, old: NodeIndex, new: NodeIndex) {
            if self.0 == old {
                self.0 = new;
            }
        }
    }

    #[test]
    fn deterministic_recomputes_on_touch() {
        let mut dag = Dag::new();
        let a = dag.add_stochastic("a", Value::Real(3.0), Box::new(Identity));
        let d = dag.add_deterministic("d", Box::new(DoubleOf(a)));
        dag.add_edge(a, d).unwrap();
        assert_eq!(dag.value(d).as_real().unwrap(), 6.0);

        dag.set_value(a, Value::Real(10.0), true);
        assert_eq!(dag.value(d).as_real().unwrap(), 20.0);
    }
}
