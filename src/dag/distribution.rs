use super::graph::Dag;
use super::value::Value;
use crate::LogProbability;
use petgraph::graph::NodeIndex;
use rand::rngs::SmallRng;
use std::fmt::Debug;

/// Encapsulates a density/simulator parameterized by other DagNodes (§4.B).
/// A concrete `Distribution` owns the `NodeIndex` of each of its parameters
/// and reads their current value through the enclosing `Dag`, mirroring
/// RevBayes's `TypedDagNode<valueType>*` parameter pointers.
pub trait Distribution: Debug {
    fn log_density(&self, dag: &Dag, value: &Value) -> LogProbability;
    fn redraw(&self, dag: &Dag, rng: &mut SmallRng) -> Value;
    /// whichever parameter pointer equals `old` is rebound to `new`, after a
    /// runtime type match against the expected parameter type (§4.A). Edge
    /// rewiring on the containing DagNode is the caller's responsibility.
    fn swap_parameter(&mut self, old: NodeIndex, new: NodeIndex);
}
