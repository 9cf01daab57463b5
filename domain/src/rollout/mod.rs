//! Phased rollout domain
//!
//! The [`RolloutMachine`] owns the traffic percentage routed through the
//! consensus engine. It only ever ramps up one configured step at a time
//! after a dwell period without a breach, and drops to a safe floor as soon
//! as the rolling [`MetricsWindow`] shows a breach. Leaving `rolled_back`
//! always takes a manual reset.

pub mod plan;
pub mod routing;
pub mod state;
pub mod window;

pub use plan::{RollbackFloor, RolloutPlan};
pub use routing::{routes_through, traffic_bucket};
pub use state::{RolloutMachine, RolloutPhase, RolloutState, RolloutTransition};
pub use window::{MetricsWindow, RequestSample, WindowStats};
