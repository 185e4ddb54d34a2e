// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Pure order semantics. Storage, transport and RPC live behind the traits in
// `store`, `messaging` and `clients`.
//
// ============================================================================

pub mod order;
