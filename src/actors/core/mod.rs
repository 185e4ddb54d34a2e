// ============================================================================
// Core Actor Abstractions
// ============================================================================

pub mod health;

// Re-export core types
pub use health::*;
