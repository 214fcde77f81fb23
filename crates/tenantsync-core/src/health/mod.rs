//! Connection health tracking and backend reachability probing

mod monitor;
mod prober;

pub use monitor::{HealthMonitor, HealthTransition, TransportEvent};
pub use prober::{
    AvailabilityProber, HttpReachabilityCheck, ReachabilityCheck, DEFAULT_MIN_RECHECK,
};
