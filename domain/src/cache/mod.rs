//! Result cache value objects

pub mod entry;
pub mod fingerprint;

pub use entry::CacheEntry;
pub use fingerprint::Fingerprint;
