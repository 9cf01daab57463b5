//! Runtime side of the phased rollout.

pub mod controller;

pub use controller::RolloutController;
