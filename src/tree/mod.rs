pub mod node;
pub mod topology;

pub use node::Node;
pub use topology::{Tree, TopologyNode};
