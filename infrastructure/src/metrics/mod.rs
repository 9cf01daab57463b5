//! Metrics sink adapters

mod memory;

pub use memory::InMemoryMetrics;
