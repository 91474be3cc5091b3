//! Request analysis ahead of policy evaluation.

pub mod complexity;

pub use complexity::ComplexityEstimator;
