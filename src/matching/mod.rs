pub mod policy;
pub mod similarity;

pub use policy::DecisionPolicy;
pub use similarity::{Score, SimilarityScorer};
