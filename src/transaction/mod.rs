// ============================================================================
// Transaction Coordination Module
// ============================================================================
//
// Request-scoped transactions over a `DocumentStore` session.
//
// Design Patterns Used:
// - Unit of Work: one coordinator per logical request owns the session
// - Template Method: `execute` wraps a callback in start/commit/abort
//
// ============================================================================

pub mod options;
pub mod unit_of_work;

pub use options::{ReadConcern, ReadPreference, TransactionOptions, WriteConcern};
pub use unit_of_work::{UnitOfWork, WorkFuture};
