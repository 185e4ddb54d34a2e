// ============================================================================
// Actors Module
// ============================================================================
//
// Structure:
// - core/           - Health types and aggregation
// - infrastructure/ - The kameo health monitor
//
// Note: Order logic runs in command handlers and consumer loops, NOT actors.
//       Actors are reserved for infrastructure concerns only.
//
// ============================================================================

// Private module declarations
mod core;
mod infrastructure;

// Re-export only what's needed in the public API
pub use core::{ComponentHealth, HealthStatus};
pub use infrastructure::{HealthHandle, HealthMonitorActor, SystemHealth};
