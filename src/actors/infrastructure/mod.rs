// ============================================================================
// Infrastructure Actors
// ============================================================================
//
// Actors for system concerns rather than order logic:
// - Health monitoring
//
// ============================================================================

// Private module declarations
mod health_monitor;

// Re-export for public API
pub use health_monitor::{HealthHandle, HealthMonitorActor, SystemHealth};
