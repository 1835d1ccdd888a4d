// ============================================================================
// memberstore Library
// ============================================================================
//
// Member registration on top of a transactional document-access layer:
//
//   service -> repository -> facade -> unit of work -> store session
//
// ============================================================================

pub mod config;
pub mod core;
pub mod facade;
pub mod model;
pub mod pagination;
pub mod prelude;
pub mod repository;
pub mod service;
pub mod store;
pub mod transaction;

pub use crate::config::StoreConfig;
pub use crate::core::{Document, Filter, ObjectId, Query, Result, Sort, StoreError, Update};
pub use facade::{Collection, OperationTarget};
pub use model::{Identity, Member, MemberPatch, RegistrationData, RegistrationDetails, RegistrationStatus};
pub use pagination::CursorPage;
pub use repository::MemberRepo;
pub use service::MemberService;
pub use store::{
    ClientSession, DeleteResult, DocumentStore, InsertOneResult, MemorySession, MemoryStore,
    SessionId, StoreStats, UpdateResult,
};
pub use transaction::{TransactionOptions, UnitOfWork, WorkFuture};
