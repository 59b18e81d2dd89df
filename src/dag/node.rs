use super::distribution::Distribution;
use super::function::Function;
use super::value::Value;

/// Whether a node's value is drawn from an owned `Distribution` (a sample),
/// computed by an owned `Function` of its parents, or simply fixed (a
/// constant leaf of the graph, e.g. an observed datum or a tuning constant).
pub enum NodeKind {
    Constant,
    Stochastic(Box<dyn Distribution>),
    Deterministic(Box<dyn Function>),
}

impl std::fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Constant => write!(f, "Constant"),
            NodeKind::Stochastic(d) => write!(f, "Stochastic({d:?})"),
            NodeKind::Deterministic(func) => write!(f, "Deterministic({func:?})"),
        }
    }
}

impl NodeKind {
    pub fn is_stochastic(&self) -> bool {
        matches!(self, NodeKind::Stochastic(_))
    }
    pub fn is_deterministic(&self) -> bool {
        matches!(self, NodeKind::Deterministic(_))
    }
}

/// an opaque reference to a monitor attached to a `DagNode`. Monitor/logger
/// behavior itself is out of scope for this crate (spec non-goal); only the
/// attribute slot on the node is, so this carries just enough identity
/// (a label) for a future monitor subsystem to key off of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorHandle(pub String);

/// The payload carried at each vertex of the arena graph (§3, §4.A). A node
/// is "touched" for exactly one MCMC step between `touch` and the matching
/// `keep`/`restore`; `changed` separately tracks whether its *own* value is
/// currently stale (for deterministic nodes) or has literally been reset by
/// `setValue` (for stochastic nodes) since the last `keep`.
pub struct NodeData {
    pub name: String,
    pub value: Value,
    pub kind: NodeKind,
    pub touched: bool,
    pub changed: bool,
    pub monitors: Vec<MonitorHandle>,
    snapshot: Option<(Value, bool)>,
}

impl NodeData {
    pub fn new(name: impl Into<String>, value: Value, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            value,
            kind,
            touched: false,
            changed: false,
            monitors: Vec::new(),
            snapshot: None,
        }
    }

    pub(super) fn begin_touch(&mut self) -> bool {
        if self.touched {
            false
        } else {
            self.touched = true;
            self.snapshot = Some((self.value.clone(), self.changed));
            self.changed = true;
            true
        }
    }

    pub(super) fn keep(&mut self) -> bool {
        if self.touched {
            self.touched = false;
            self.snapshot = None;
            true
        } else {
            false
        }
    }

    pub(super) fn restore(&mut self) -> bool {
        if self.touched {
            if let Some((value, changed)) = self.snapshot.take() {
                self.value = value;
                self.changed = changed;
            }
            self.touched = false;
            true
        } else {
            false
        }
    }
}
