//! Application services for worker routing.

mod router;

pub use router::{CapabilityRouter, RoutingError, RoutingResult};
