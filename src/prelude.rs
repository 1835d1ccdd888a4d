//! Common imports grouped by layer.
//!
//! `app` covers service and repository code. `store` is for code that
//! implements or drives a `DocumentStore` directly.

pub mod app {
    //! Application surface: services, repositories and the unit of work.
    pub use crate::{
        CursorPage, Identity, Member, MemberPatch, MemberRepo, MemberService, RegistrationDetails,
        RegistrationStatus, Result, StoreConfig, StoreError, UnitOfWork,
    };
}

pub mod store {
    //! Driver boundary and the embedded store.
    pub use crate::core::{Document, Filter, ID_FIELD, ObjectId, Query, Sort, Update};
    pub use crate::store::{
        Change, ClientSession, DeleteResult, DocumentStore, InsertOneResult, MemorySession,
        MemoryStore, SessionId, StoreStats, UpdateResult,
    };
    pub use crate::transaction::TransactionOptions;
}
