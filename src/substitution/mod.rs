pub mod character;
pub mod partials;
pub mod pmatrix;
pub mod pruning;
pub mod rate_matrix;

pub use character::{Character, CharacterMatrix};
pub use partials::PartialLikelihoodCache;
pub use pmatrix::TransitionProbabilityCache;
pub use pruning::PruningKernel;
pub use rate_matrix::{RateGenerator, RateMatrix};
