//! Risk-gated admission of synthesized results.

pub mod controller;

pub use controller::{AdmissionController, AdmissionError, AdmissionOutcome};
