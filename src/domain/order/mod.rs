// ============================================================================
// Order Domain - State machine and orchestration for purchase orders
// ============================================================================
//
// - Value objects (OrderStatus, PaymentMethod)
// - Events (OrderPaidEvent, ShipAssembledEvent)
// - Commands (CreateOrder, PayOrder, CancelOrder)
// - Errors (OrderError + ErrorKind)
// - Aggregate (Order snapshot and its transitions)
// - Command Handler (OrderCommandHandler, the orchestrator)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
