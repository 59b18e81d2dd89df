pub mod traits;
pub mod tree_move;

pub use traits::Proposal;
pub use tree_move::TreeTopologyProposal;
