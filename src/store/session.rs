// ============================================================================
// In-Memory Session State
// ============================================================================
//
// A session moves through a small state machine:
//
//   Idle ──start──> InTransaction ──commit/abort──> Idle
//     │                  │
//     └──────end─────────┴──────> Ended
//
// Ending a session with an open transaction discards that transaction.
//
// ============================================================================

use super::change::Change;
use super::memory::{DatabaseState, Shared};
use super::{ClientSession, SessionId};
use crate::core::{Result, StoreError};
use crate::transaction::TransactionOptions;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InTransaction,
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "IDLE"),
            SessionState::InTransaction => write!(f, "IN_TRANSACTION"),
            SessionState::Ended => write!(f, "ENDED"),
        }
    }
}

/// Open transaction of a memory session: a private snapshot plus the
/// writes applied to it so far
#[derive(Debug)]
pub struct MemoryTransaction {
    options: TransactionOptions,
    workspace: DatabaseState,
    changes: Vec<Change>,
    start_time: Instant,
}

impl MemoryTransaction {
    fn new(options: TransactionOptions, workspace: DatabaseState) -> Self {
        Self {
            options,
            workspace,
            changes: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn options(&self) -> TransactionOptions {
        self.options
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub(crate) fn workspace(&self) -> &DatabaseState {
        &self.workspace
    }

    pub(crate) fn workspace_mut(&mut self) -> &mut DatabaseState {
        &mut self.workspace
    }

    pub(crate) fn record(&mut self, change: Change) {
        self.changes.push(change);
    }
}

/// Session handed out by [`MemoryStore`](super::MemoryStore)
pub struct MemorySession {
    id: SessionId,
    shared: Arc<Shared>,
    state: SessionState,
    transaction: Option<MemoryTransaction>,
}

impl MemorySession {
    pub(crate) fn new(id: SessionId, shared: Arc<Shared>) -> Self {
        Self {
            id,
            shared,
            state: SessionState::Idle,
            transaction: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transaction(&self) -> Option<&MemoryTransaction> {
        self.transaction.as_ref()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.state == SessionState::Ended {
            return Err(StoreError::SessionEnded(self.id.0));
        }
        Ok(())
    }

    pub(crate) fn belongs_to(&self, shared: &Arc<Shared>) -> bool {
        Arc::ptr_eq(&self.shared, shared)
    }

    pub(crate) fn transaction_mut(&mut self) -> Option<&mut MemoryTransaction> {
        self.transaction.as_mut()
    }

    fn take_transaction(&mut self) -> Result<MemoryTransaction> {
        self.ensure_open()?;
        let transaction = self
            .transaction
            .take()
            .ok_or(StoreError::NoActiveTransaction)?;
        self.state = SessionState::Idle;
        Ok(transaction)
    }
}

impl fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySession")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

#[async_trait]
impl ClientSession for MemorySession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn has_active_transaction(&self) -> bool {
        self.state == SessionState::InTransaction
    }

    async fn start_transaction(&mut self, options: TransactionOptions) -> Result<()> {
        self.ensure_open()?;
        if self.state == SessionState::InTransaction {
            return Err(StoreError::TransactionInProgress);
        }

        let workspace = self.shared.snapshot()?;
        self.transaction = Some(MemoryTransaction::new(options, workspace));
        self.state = SessionState::InTransaction;
        self.shared.on_transaction_started();
        trace!(session = %self.id, %options, "transaction started");
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        let transaction = self.take_transaction()?;
        let change_count = transaction.changes.len();

        match self.shared.commit(transaction.changes) {
            Ok(()) => {
                self.shared.on_transaction_committed();
                trace!(session = %self.id, change_count, "transaction committed");
                Ok(())
            }
            Err(err) => {
                self.shared.on_commit_failed();
                trace!(session = %self.id, error = %err, "commit failed, transaction discarded");
                Err(err)
            }
        }
    }

    async fn abort_transaction(&mut self) -> Result<()> {
        let transaction = self.take_transaction()?;
        self.shared.on_transaction_aborted();
        trace!(
            session = %self.id,
            discarded = transaction.changes.len(),
            "transaction aborted"
        );
        Ok(())
    }

    fn end(&mut self) {
        if self.state == SessionState::Ended {
            return;
        }

        if self.transaction.take().is_some() {
            self.shared.on_transaction_aborted();
        }
        self.state = SessionState::Ended;
        self.shared.on_session_ended();
        trace!(session = %self.id, "session ended");
    }

    fn is_ended(&self) -> bool {
        self.state == SessionState::Ended
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        // Ensure the session is released and any open transaction discarded
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MemoryStore};

    #[tokio::test]
    async fn test_transaction_lifecycle() {
        let store = MemoryStore::new();
        let mut session = store.start_session().await.unwrap();
        assert_eq!(session.state(), SessionState::Idle);

        session.start_transaction(TransactionOptions::default()).await.unwrap();
        assert!(session.has_active_transaction());

        session.commit_transaction().await.unwrap();
        assert!(!session.has_active_transaction());
        assert_eq!(store.stats().transactions_committed, 1);
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let store = MemoryStore::new();
        let mut session = store.start_session().await.unwrap();
        session.start_transaction(TransactionOptions::default()).await.unwrap();

        let err = session
            .start_transaction(TransactionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TransactionInProgress));
    }

    #[tokio::test]
    async fn test_commit_without_transaction() {
        let store = MemoryStore::new();
        let mut session = store.start_session().await.unwrap();

        assert!(matches!(
            session.commit_transaction().await,
            Err(StoreError::NoActiveTransaction)
        ));
        assert!(matches!(
            session.abort_transaction().await,
            Err(StoreError::NoActiveTransaction)
        ));
    }

    #[tokio::test]
    async fn test_end_discards_transaction() {
        let store = MemoryStore::new();
        let mut session = store.start_session().await.unwrap();
        session.start_transaction(TransactionOptions::default()).await.unwrap();

        session.end();
        session.end();

        assert!(session.is_ended());
        let stats = store.stats();
        assert_eq!(stats.transactions_aborted, 1);
        assert_eq!(stats.active_transactions, 0);
        assert_eq!(stats.sessions_ended, 1);
        assert!(session.start_transaction(TransactionOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_drop_releases_session() {
        let store = MemoryStore::new();
        {
            let mut session = store.start_session().await.unwrap();
            session.start_transaction(TransactionOptions::default()).await.unwrap();
        }

        let stats = store.stats();
        assert_eq!(stats.open_sessions(), 0);
        assert_eq!(stats.active_transactions, 0);
    }
}
