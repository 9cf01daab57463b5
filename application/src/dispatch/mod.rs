//! Provider dispatch
//!
//! [`ProviderDispatcher`] runs one round of provider calls with per-call
//! timeouts, a bounded retry and fault isolation through the shared
//! [`CircuitBreakerRegistry`].

pub mod circuit_registry;
pub mod dispatcher;

pub use circuit_registry::{CircuitBreakerRegistry, CircuitSnapshot};
pub use dispatcher::{DispatchCancelled, DispatchOutcome, DispatchRound, ProviderDispatcher};
