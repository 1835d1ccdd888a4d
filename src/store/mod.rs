// ============================================================================
// Document Store Abstraction
// ============================================================================
//
// The driver boundary. A `DocumentStore` opens sessions and executes
// find/insert/delete/update, optionally bound to a session. Everything above
// this module only talks to these two traits.
//
// ============================================================================

pub mod change;
pub mod memory;
pub mod session;

pub use change::Change;
pub use memory::{MemoryStore, StoreStats};
pub use session::MemorySession;

use crate::core::{Document, Filter, ObjectId, Query, Result, Update};
use crate::transaction::TransactionOptions;
use async_trait::async_trait;
use std::fmt;

/// Identifier of a store session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOneResult {
    pub inserted_id: ObjectId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

/// Connection-scoped transactional context handed out by a store
#[async_trait]
pub trait ClientSession: Send + Sync + 'static {
    fn id(&self) -> SessionId;

    fn has_active_transaction(&self) -> bool;

    async fn start_transaction(&mut self, options: TransactionOptions) -> Result<()>;

    async fn commit_transaction(&mut self) -> Result<()>;

    async fn abort_transaction(&mut self) -> Result<()>;

    /// Release the session. Uncommitted work is discarded.
    ///
    /// Synchronous so it can run from `Drop`. Calling it twice is a no-op.
    fn end(&mut self);

    fn is_ended(&self) -> bool;
}

/// Document store client
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    type Session: ClientSession;

    async fn start_session(&self) -> Result<Self::Session>;

    async fn find(
        &self,
        session: Option<&mut Self::Session>,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<Document>>;

    /// Insert a document, assigning an `_id` when it has none
    async fn insert_one(
        &self,
        session: Option<&mut Self::Session>,
        collection: &str,
        document: Document,
    ) -> Result<InsertOneResult>;

    async fn delete_one(
        &self,
        session: Option<&mut Self::Session>,
        collection: &str,
        filter: &Filter,
    ) -> Result<DeleteResult>;

    async fn update_one(
        &self,
        session: Option<&mut Self::Session>,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult>;

    /// Declare a unique index. Stores without index support accept and ignore it.
    async fn create_unique_index(&self, _collection: &str, _field: &str) -> Result<()> {
        Ok(())
    }
}
