// ============================================================================
// Collection Operations Facade
// ============================================================================
//
// Typed find/insert/delete/update over a named collection. Each call picks
// its `OperationTarget` from the unit of work: standalone while no session
// is bound, in-session (inside a coordinator frame) afterwards.
//
// ============================================================================

pub mod collection;
pub mod target;

pub use collection::Collection;
pub use target::{InSession, OperationTarget, Standalone};
