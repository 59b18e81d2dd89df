pub mod events;
pub mod fbd;
pub mod msc;

pub use events::{MarkovTimesDistribution, OrderedEventTimes};
pub use fbd::{FossilizedBirthDeathRange, TaxonRange};
pub use msc::{GeneLineages, MultispeciesCoalescentInverseGamma, SpeciesBranch};
