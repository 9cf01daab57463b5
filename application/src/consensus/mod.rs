//! Consensus loop over the provider dispatcher.

pub mod engine;

pub use engine::{ConsensusEngine, ConsensusError};
