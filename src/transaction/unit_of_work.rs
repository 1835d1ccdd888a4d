// ============================================================================
// Unit of Work
// ============================================================================
//
// Request-scoped transaction coordinator. One instance per logical unit of
// work; it exclusively owns at most one store session.
//
// Frames: every `execute` call (and every facade operation issued while a
// session is bound) opens a frame. The frame that finds no active
// transaction starts one and is the only frame allowed to commit or abort
// it. Nested frames run inside the enclosing transaction and hand their
// result back to the enclosing callback unchanged. A nested failure also
// marks the transaction rollback-only, so the owning frame aborts even if
// the enclosing callback recovers.
//
// Frames are counted by drop guards. A frame abandoned by a cancelled
// future still releases its count, and the next frame to open at depth
// zero aborts the transaction that frame left behind.
//
// ============================================================================

use super::TransactionOptions;
use crate::core::{Result, StoreError};
use crate::facade::target::{InSession, OperationTarget, Standalone};
use crate::store::{ClientSession, DocumentStore};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Future returned by callbacks passed to [`UnitOfWork::execute`]
pub type WorkFuture<'u, T> = BoxFuture<'u, Result<T>>;

/// One coordinator invocation. Releases its slot in the frame count when
/// dropped, including when the future holding it is cancelled.
#[derive(Debug)]
pub(crate) struct Frame {
    owns_transaction: bool,
    open_frames: Arc<AtomicUsize>,
}

impl Frame {
    fn open(open_frames: &Arc<AtomicUsize>, owns_transaction: bool) -> Self {
        open_frames.fetch_add(1, Ordering::SeqCst);
        Self {
            owns_transaction,
            open_frames: Arc::clone(open_frames),
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.open_frames.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct UnitOfWork<C: DocumentStore> {
    client: C,
    session: Option<C::Session>,
    options: TransactionOptions,
    open_frames: Arc<AtomicUsize>,
    /// Set when a nested frame fails; the owning frame must abort
    rollback_only: Option<String>,
}

impl<C: DocumentStore> UnitOfWork<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            session: None,
            options: TransactionOptions::default(),
            open_frames: Arc::new(AtomicUsize::new(0)),
            rollback_only: None,
        }
    }

    /// Run `body` with a fresh unit of work and always release it afterwards
    pub async fn scope<T, F>(client: C, body: F) -> Result<T>
    where
        T: Send,
        F: for<'u> FnOnce(&'u mut UnitOfWork<C>) -> WorkFuture<'u, T> + Send,
    {
        let mut uow = UnitOfWork::new(client);
        let result = body(&mut uow).await;
        uow.close().await;
        result
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn options(&self) -> TransactionOptions {
        self.options
    }

    /// Session of this unit of work, if one has been started
    pub fn current_session(&self) -> Option<&C::Session> {
        self.session.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn session_mut(&mut self) -> Option<&mut C::Session> {
        self.session.as_mut()
    }

    pub fn in_transaction(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.has_active_transaction())
    }

    /// Number of frames currently open
    pub fn depth(&self) -> usize {
        self.open_frames.load(Ordering::SeqCst)
    }

    /// Whether a nested failure has doomed the active transaction
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only.is_some()
    }

    /// Run `callback` inside this unit of work's transaction.
    ///
    /// The session is created on first use. If no transaction is active one
    /// is started, committed when the callback succeeds and aborted when it
    /// fails; the failure is returned as [`StoreError::TransactionFailed`].
    /// If a transaction is already active the callback joins it. A joined
    /// callback that fails marks the transaction rollback-only: the owning
    /// frame then aborts and reports [`StoreError::RollbackOnly`].
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let total = uow
    ///     .execute(|uow| Box::pin(async move {
    ///         let first = uow.execute(|_| Box::pin(async { Ok(1) })).await?;
    ///         Ok(first + 1)
    ///     }))
    ///     .await?;
    /// ```
    pub async fn execute<T, F>(&mut self, callback: F) -> Result<T>
    where
        T: Send,
        F: for<'u> FnOnce(&'u mut UnitOfWork<C>) -> WorkFuture<'u, T> + Send,
    {
        let frame = self.enter().await?;
        let result = callback(&mut *self).await;
        self.leave(frame, result).await
    }

    /// Operation target for the next store call: bound to the session when
    /// one exists, standalone otherwise
    pub fn target(&mut self) -> Box<dyn OperationTarget + '_> {
        match self.session.as_mut() {
            Some(session) => Box::new(InSession::new(&self.client, session)),
            None => Box::new(Standalone::new(&self.client)),
        }
    }

    /// Open a frame, creating the session and starting a transaction as needed
    pub(crate) async fn enter(&mut self) -> Result<Frame> {
        if self.session.is_none() {
            let session = self.client.start_session().await?;
            debug!(session = %session.id(), "session started for unit of work");
            self.session = Some(session);
        }

        let Some(session) = self.session.as_mut() else {
            return Err(StoreError::Store("session unavailable".into()));
        };

        if self.open_frames.load(Ordering::SeqCst) == 0 && session.has_active_transaction() {
            // Left open by a frame whose future was dropped mid-flight.
            warn!(session = %session.id(), "aborting transaction abandoned by a cancelled frame");
            if let Err(err) = session.abort_transaction().await {
                warn!(session = %session.id(), error = %err, "abort of abandoned transaction failed");
            }
            self.rollback_only = None;
            if session.has_active_transaction() {
                return Err(StoreError::transaction_failed(StoreError::Store(
                    "abandoned transaction could not be rolled back".into(),
                )));
            }
        }

        let owns_transaction = !session.has_active_transaction();
        if owns_transaction {
            self.rollback_only = None;
            if let Err(err) = session.start_transaction(self.options).await {
                warn!(session = %session.id(), error = %err, "failed to start transaction");
                return Err(StoreError::transaction_failed(err));
            }
            debug!(session = %session.id(), options = %self.options, "transaction started");
        }

        Ok(Frame::open(&self.open_frames, owns_transaction))
    }

    /// Open a frame only when a session is already bound
    pub(crate) async fn enter_if_bound(&mut self) -> Result<Option<Frame>> {
        if self.session.is_none() {
            return Ok(None);
        }
        self.enter().await.map(Some)
    }

    /// Close a frame. The owning frame commits on success and aborts on
    /// failure or when a nested frame marked the transaction rollback-only.
    pub(crate) async fn leave<T>(&mut self, frame: Frame, result: Result<T>) -> Result<T> {
        let owns_transaction = frame.owns_transaction;
        drop(frame);

        if !owns_transaction {
            if let Err(err) = &result {
                if self.rollback_only.is_none() && self.in_transaction() {
                    debug!(error = %err, "nested frame failed, transaction marked rollback-only");
                    self.rollback_only = Some(err.to_string());
                }
            }
            return result;
        }

        let rollback_only = self.rollback_only.take();

        let Some(session) = self.session.as_mut() else {
            // Closed from inside the callback; cleanup already rolled back.
            return match result {
                Ok(_) => Err(StoreError::transaction_failed(StoreError::Store(
                    "unit of work closed before commit".into(),
                ))),
                Err(err) => Err(StoreError::transaction_failed(err)),
            };
        };

        let result = match (result, rollback_only) {
            (Ok(_), Some(reason)) => Err(StoreError::RollbackOnly(reason)),
            (result, _) => result,
        };

        match result {
            Ok(value) => match session.commit_transaction().await {
                Ok(()) => {
                    debug!(session = %session.id(), "transaction committed");
                    Ok(value)
                }
                Err(err) => {
                    if session.has_active_transaction() {
                        if let Err(abort_err) = session.abort_transaction().await {
                            warn!(session = %session.id(), error = %abort_err, "abort after failed commit failed");
                        }
                    }
                    warn!(session = %session.id(), error = %err, "commit failed, transaction rolled back");
                    Err(StoreError::transaction_failed(err))
                }
            },
            Err(err) => {
                if session.has_active_transaction() {
                    if let Err(abort_err) = session.abort_transaction().await {
                        warn!(session = %session.id(), error = %abort_err, "abort failed");
                    }
                }
                warn!(session = %session.id(), error = %err, "transaction rolled back");
                Err(StoreError::transaction_failed(err))
            }
        }
    }

    pub(crate) async fn leave_if_bound<T>(&mut self, frame: Option<Frame>, result: Result<T>) -> Result<T> {
        match frame {
            Some(frame) => self.leave(frame, result).await,
            None => result,
        }
    }

    /// End-of-scope cleanup: abort an open transaction, then release the
    /// session. Safe to call any number of times.
    pub async fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        if session.has_active_transaction() {
            match session.abort_transaction().await {
                Ok(()) => debug!(session = %session.id(), "uncommitted transaction rolled back"),
                Err(err) => warn!(session = %session.id(), error = %err, "cleanup abort failed"),
            }
        }

        session.end();
        self.rollback_only = None;
        debug!(session = %session.id(), "session released");
    }
}

impl<C: DocumentStore> Drop for UnitOfWork<C> {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            if session.has_active_transaction() {
                warn!(session = %session.id(), "unit of work dropped with an open transaction, discarding it");
            }
            session.end();
        }
    }
}
