//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use memberstore::core::{Document, Filter, Query, Update};
use memberstore::{
    ClientSession, DeleteResult, DocumentStore, InsertOneResult, Member, MemberRepo, MemorySession,
    MemoryStore, Result, SessionId, StoreError, TransactionOptions, UnitOfWork, UpdateResult,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub fn member(n: u32) -> Member {
    Member::new(format!("user-{n}"), format!("user{n}"), format!("user{n}@example.com"))
        .with_name("Test", format!("Member {n}"))
}

/// Store with `count` members registered and the member indexes in place
pub async fn seeded_store(count: u32) -> (MemoryStore, Vec<Member>) {
    let store = MemoryStore::new();
    let repo = MemberRepo::default();
    repo.ensure_indexes(&store).await.unwrap();

    let mut uow = UnitOfWork::new(store.clone());
    let mut members = Vec::new();
    for n in 1..=count {
        members.push(repo.register(&mut uow, &member(n)).await.unwrap());
    }
    uow.close().await;
    (store, members)
}

// ============================================================================
// Fault injection
// ============================================================================

/// Switches and call counters shared by a `FaultyStore` and its sessions
#[derive(Debug, Default)]
pub struct Faults {
    pub fail_start: AtomicBool,
    pub fail_commit: AtomicBool,
    pub starts: AtomicU64,
    pub commits: AtomicU64,
    pub aborts: AtomicU64,
}

impl Faults {
    pub fn starts(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> u64 {
        self.aborts.load(Ordering::SeqCst)
    }
}

/// `MemoryStore` wrapper that counts transaction calls and can fail them
#[derive(Debug, Clone, Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub faults: Arc<Faults>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_commits(&self) {
        self.faults.fail_commit.store(true, Ordering::SeqCst);
    }

    pub fn fail_starts(&self) {
        self.faults.fail_start.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct FaultySession {
    inner: MemorySession,
    faults: Arc<Faults>,
}

#[async_trait]
impl ClientSession for FaultySession {
    fn id(&self) -> SessionId {
        self.inner.id()
    }

    fn has_active_transaction(&self) -> bool {
        self.inner.has_active_transaction()
    }

    async fn start_transaction(&mut self, options: TransactionOptions) -> Result<()> {
        self.faults.starts.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_start.load(Ordering::SeqCst) {
            return Err(StoreError::Store("injected start failure".into()));
        }
        self.inner.start_transaction(options).await
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        self.faults.commits.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Store("injected commit failure".into()));
        }
        self.inner.commit_transaction().await
    }

    async fn abort_transaction(&mut self) -> Result<()> {
        self.faults.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort_transaction().await
    }

    fn end(&mut self) {
        self.inner.end();
    }

    fn is_ended(&self) -> bool {
        self.inner.is_ended()
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    type Session = FaultySession;

    async fn start_session(&self) -> Result<FaultySession> {
        Ok(FaultySession {
            inner: self.inner.start_session().await?,
            faults: Arc::clone(&self.faults),
        })
    }

    async fn find(
        &self,
        session: Option<&mut FaultySession>,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<Document>> {
        self.inner
            .find(session.map(|s| &mut s.inner), collection, query)
            .await
    }

    async fn insert_one(
        &self,
        session: Option<&mut FaultySession>,
        collection: &str,
        document: Document,
    ) -> Result<InsertOneResult> {
        self.inner
            .insert_one(session.map(|s| &mut s.inner), collection, document)
            .await
    }

    async fn delete_one(
        &self,
        session: Option<&mut FaultySession>,
        collection: &str,
        filter: &Filter,
    ) -> Result<DeleteResult> {
        self.inner
            .delete_one(session.map(|s| &mut s.inner), collection, filter)
            .await
    }

    async fn update_one(
        &self,
        session: Option<&mut FaultySession>,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult> {
        self.inner
            .update_one(session.map(|s| &mut s.inner), collection, filter, update)
            .await
    }

    async fn create_unique_index(&self, collection: &str, field: &str) -> Result<()> {
        self.inner.create_unique_index(collection, field).await
    }
}
