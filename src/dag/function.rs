use super::graph::Dag;
use super::value::Value;
use petgraph::graph::NodeIndex;
use std::fmt::Debug;

/// A deterministic node's value is the output of a `Function<V>` over its
/// parents, recomputed on demand whenever a parent is touched (§3).
pub trait Function: Debug {
    fn evaluate(&self, dag: &Dag) -> Value;
    fn swap_parameter(&mut self, old: NodeIndex, new: NodeIndex);
}
