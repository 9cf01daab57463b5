//! Provider-side domain: who can answer, what they answered, and whether
//! they are healthy enough to be asked again.

pub mod circuit;
pub mod descriptor;
pub mod response;

pub use circuit::{CircuitBreaker, CircuitPermit, CircuitPolicy, CircuitState, ProbeFailurePolicy};
pub use descriptor::{ProviderDescriptor, ProviderId};
pub use response::{ProviderResponse, ResponseStatus, TokenUsage};
