// ============================================================================
// In-Memory Document Store
// ============================================================================
//
// Embedded implementation of `DocumentStore`.
//
// - Collections are kept behind `Arc` so a transaction snapshot is a cheap
//   copy-on-write clone of the whole database state.
// - Writes inside a transaction go to the session's private workspace and
//   are recorded as `Change`s. Commit validates the first touch of every
//   document against the current shared version (write-write conflict) and
//   replays the changes on a clone that is swapped in only if all succeed.
// - Unique indexes are checked on every write and again on replay.
//
// ============================================================================

use super::change::Change;
use super::session::{MemorySession, MemoryTransaction};
use super::{ClientSession, DeleteResult, DocumentStore, InsertOneResult, SessionId, UpdateResult};
use crate::core::document::SortDirection;
use crate::core::{Document, Filter, ID_FIELD, ObjectId, Query, Result, StoreError, Update};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::trace;

#[derive(Debug, Clone)]
struct StoredDocument {
    document: Document,
    version: u64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CollectionData {
    /// Ordered by `_id`, which is the natural scan order
    documents: BTreeMap<ObjectId, StoredDocument>,
    unique_fields: Vec<String>,
}

impl CollectionData {
    fn first_match(&self, filter: &Filter) -> Option<ObjectId> {
        if let Some(value) = filter.id_equality() {
            let id = id_from_value(value)?;
            return self.documents.contains_key(&id).then_some(id);
        }

        self.documents
            .iter()
            .find(|(_, stored)| filter.matches(&stored.document))
            .map(|(id, _)| *id)
    }

    fn check_unique(&self, collection: &str, document: &Document, skip: Option<ObjectId>) -> Result<()> {
        for field in &self.unique_fields {
            let value = match document.get(field) {
                Some(Value::Null) | None => continue,
                Some(value) => value,
            };

            let clash = self
                .documents
                .iter()
                .any(|(id, stored)| Some(*id) != skip && stored.document.get(field) == Some(value));

            if clash {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    field: field.clone(),
                    value: display_value(value),
                });
            }
        }
        Ok(())
    }
}

/// Complete database state: the shared committed state, or a transaction's workspace
#[derive(Debug, Clone, Default)]
pub(crate) struct DatabaseState {
    collections: HashMap<String, Arc<CollectionData>>,
    version: u64,
}

impl DatabaseState {
    fn collection(&self, name: &str) -> Option<&CollectionData> {
        self.collections.get(name).map(|c| c.as_ref())
    }

    fn collection_mut(&mut self, name: &str) -> &mut CollectionData {
        Arc::make_mut(self.collections.entry(name.to_string()).or_default())
    }

    fn next_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    fn current_version(&self, name: &str, id: &ObjectId) -> Option<u64> {
        self.collection(name)
            .and_then(|c| c.documents.get(id))
            .map(|stored| stored.version)
    }

    pub(crate) fn find(&self, name: &str, query: &Query) -> Vec<Document> {
        let Some(collection) = self.collection(name) else {
            return Vec::new();
        };

        let mut matched: Vec<&Document> = match query.filter.id_equality().and_then(id_from_value) {
            Some(id) => collection
                .documents
                .get(&id)
                .map(|stored| &stored.document)
                .into_iter()
                .collect(),
            None => collection
                .documents
                .values()
                .map(|stored| &stored.document)
                .filter(|document| query.filter.matches(document))
                .collect(),
        };

        if let Some(sort) = &query.sort {
            let natural = sort.field == ID_FIELD && sort.direction == SortDirection::Ascending;
            if !natural {
                matched.sort_by(|a, b| sort.compare(a, b));
            }
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        matched.into_iter().take(limit).cloned().collect()
    }

    pub(crate) fn insert(&mut self, name: &str, mut document: Document) -> Result<Change> {
        let existing = document.get(ID_FIELD).cloned();
        let id = match existing {
            None | Some(Value::Null) => {
                let id = ObjectId::new();
                document.insert(ID_FIELD.to_string(), id.into());
                id
            }
            Some(Value::String(s)) => ObjectId::parse_str(&s)?,
            Some(other) => return Err(StoreError::InvalidObjectId(other.to_string())),
        };

        if let Some(collection) = self.collection(name) {
            if collection.documents.contains_key(&id) {
                return Err(StoreError::DuplicateKey {
                    collection: name.to_string(),
                    field: ID_FIELD.to_string(),
                    value: id.to_hex(),
                });
            }
            collection.check_unique(name, &document, None)?;
        }

        let version = self.next_version();
        self.collection_mut(name).documents.insert(
            id,
            StoredDocument {
                document: document.clone(),
                version,
            },
        );

        Ok(Change::Insert {
            collection: name.to_string(),
            id,
            document,
        })
    }

    pub(crate) fn delete_one(&mut self, name: &str, filter: &Filter) -> Result<Option<Change>> {
        let Some(id) = self.collection(name).and_then(|c| c.first_match(filter)) else {
            return Ok(None);
        };

        let removed = self.collection_mut(name).documents.remove(&id);
        Ok(removed.map(|stored| Change::Delete {
            collection: name.to_string(),
            id,
            base_version: stored.version,
        }))
    }

    /// Returns the matched count and the change, if the document was modified
    pub(crate) fn update_one(
        &mut self,
        name: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<(u64, Option<Change>)> {
        let Some(collection) = self.collection(name) else {
            return Ok((0, None));
        };
        let Some(id) = collection.first_match(filter) else {
            return Ok((0, None));
        };

        let Some(stored) = collection.documents.get(&id) else {
            return Ok((0, None));
        };
        let base_version = stored.version;
        let mut document = stored.document.clone();

        if !update.apply_to(&mut document)? {
            return Ok((1, None));
        }
        collection.check_unique(name, &document, Some(id))?;

        let version = self.next_version();
        self.collection_mut(name).documents.insert(
            id,
            StoredDocument {
                document: document.clone(),
                version,
            },
        );

        Ok((
            1,
            Some(Change::Update {
                collection: name.to_string(),
                id,
                base_version,
                document,
            }),
        ))
    }

    fn replace(&mut self, name: &str, id: ObjectId, document: Document) -> Result<()> {
        self.collection_mut(name).check_unique(name, &document, Some(id))?;
        let version = self.next_version();
        self.collection_mut(name)
            .documents
            .insert(id, StoredDocument { document, version });
        Ok(())
    }

    fn create_unique_index(&mut self, name: &str, field: &str) -> Result<()> {
        let collection = self.collection_mut(name);
        if collection.unique_fields.iter().any(|f| f == field) {
            return Ok(());
        }

        let mut seen = HashSet::new();
        for stored in collection.documents.values() {
            match stored.document.get(field) {
                Some(Value::Null) | None => {}
                Some(value) => {
                    if !seen.insert(value.to_string()) {
                        return Err(StoreError::DuplicateKey {
                            collection: name.to_string(),
                            field: field.to_string(),
                            value: display_value(value),
                        });
                    }
                }
            }
        }

        collection.unique_fields.push(field.to_string());
        Ok(())
    }

    /// Validate and replay a transaction's changes
    pub(crate) fn apply(&mut self, changes: Vec<Change>) -> Result<()> {
        let mut touched = HashSet::new();
        for change in &changes {
            if !touched.insert((change.collection().to_string(), change.id())) {
                continue;
            }

            let current = self.current_version(change.collection(), &change.id());
            if current != change.base_version() {
                return Err(StoreError::WriteConflict(format!(
                    "{}/{}",
                    change.collection(),
                    change.id()
                )));
            }
        }

        for change in changes {
            match change {
                Change::Insert {
                    collection,
                    document,
                    ..
                } => {
                    self.insert(&collection, document)?;
                }
                Change::Update {
                    collection,
                    id,
                    document,
                    ..
                } => self.replace(&collection, id, document)?,
                Change::Delete { collection, id, .. } => {
                    self.collection_mut(&collection).documents.remove(&id);
                }
            }
        }
        Ok(())
    }
}

fn id_from_value(value: &Value) -> Option<ObjectId> {
    value.as_str().and_then(|s| ObjectId::parse_str(s).ok())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Default)]
struct Counters {
    sessions_started: AtomicU64,
    sessions_ended: AtomicU64,
    transactions_started: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_aborted: AtomicU64,
    commit_failures: AtomicU64,
    active_transactions: AtomicU64,
    queries: AtomicU64,
    writes: AtomicU64,
}

/// Point-in-time copy of the store's operation counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub sessions_started: u64,
    pub sessions_ended: u64,
    pub transactions_started: u64,
    pub transactions_committed: u64,
    pub transactions_aborted: u64,
    pub commit_failures: u64,
    /// Transactions started and not yet committed or aborted
    pub active_transactions: u64,
    pub queries: u64,
    pub writes: u64,
}

impl StoreStats {
    pub fn open_sessions(&self) -> u64 {
        self.sessions_started.saturating_sub(self.sessions_ended)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Shared {
    state: RwLock<DatabaseState>,
    next_session_id: AtomicU64,
    counters: Counters,
}

impl Shared {
    pub(crate) fn snapshot(&self) -> Result<DatabaseState> {
        Ok(self.state.read()?.clone())
    }

    pub(crate) fn commit(&self, changes: Vec<Change>) -> Result<()> {
        let mut state = self.state.write()?;
        let mut next = state.clone();
        next.apply(changes)?;
        *state = next;
        Ok(())
    }

    pub(crate) fn on_session_ended(&self) {
        self.counters.sessions_ended.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn on_transaction_started(&self) {
        self.counters.transactions_started.fetch_add(1, Ordering::SeqCst);
        self.counters.active_transactions.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn on_transaction_committed(&self) {
        self.counters.transactions_committed.fetch_add(1, Ordering::SeqCst);
        self.counters.active_transactions.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn on_transaction_aborted(&self) {
        self.counters.transactions_aborted.fetch_add(1, Ordering::SeqCst);
        self.counters.active_transactions.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn on_commit_failed(&self) {
        self.counters.commit_failures.fetch_add(1, Ordering::SeqCst);
        self.counters.active_transactions.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Embedded document store.
///
/// Cloning is cheap and every clone sees the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> StoreStats {
        let c = &self.shared.counters;
        StoreStats {
            sessions_started: c.sessions_started.load(Ordering::SeqCst),
            sessions_ended: c.sessions_ended.load(Ordering::SeqCst),
            transactions_started: c.transactions_started.load(Ordering::SeqCst),
            transactions_committed: c.transactions_committed.load(Ordering::SeqCst),
            transactions_aborted: c.transactions_aborted.load(Ordering::SeqCst),
            commit_failures: c.commit_failures.load(Ordering::SeqCst),
            active_transactions: c.active_transactions.load(Ordering::SeqCst),
            queries: c.queries.load(Ordering::SeqCst),
            writes: c.writes.load(Ordering::SeqCst),
        }
    }

    /// Committed documents of a collection in `_id` order.
    ///
    /// Not counted as a query.
    pub fn documents(&self, collection: &str) -> Result<Vec<Document>> {
        let state = self.shared.state.read()?;
        Ok(state.find(collection, &Query::all()))
    }

    pub fn document_count(&self, collection: &str) -> Result<usize> {
        let state = self.shared.state.read()?;
        Ok(state
            .collection(collection)
            .map(|c| c.documents.len())
            .unwrap_or(0))
    }

    fn session_workspace<'s>(
        &self,
        session: Option<&'s mut MemorySession>,
    ) -> Result<Option<&'s mut MemoryTransaction>> {
        match session {
            None => Ok(None),
            Some(session) => {
                session.ensure_open()?;
                if !session.belongs_to(&self.shared) {
                    return Err(StoreError::Store(format!(
                        "{} was not started by this store",
                        session.id()
                    )));
                }
                Ok(session.transaction_mut())
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    type Session = MemorySession;

    async fn start_session(&self) -> Result<MemorySession> {
        let id = SessionId(self.shared.next_session_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.shared
            .counters
            .sessions_started
            .fetch_add(1, Ordering::SeqCst);
        trace!(session = %id, "session started");
        Ok(MemorySession::new(id, Arc::clone(&self.shared)))
    }

    async fn find(
        &self,
        session: Option<&mut MemorySession>,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<Document>> {
        self.shared.counters.queries.fetch_add(1, Ordering::SeqCst);
        let documents = match self.session_workspace(session)? {
            Some(txn) => txn.workspace().find(collection, query),
            None => self.shared.state.read()?.find(collection, query),
        };
        trace!(collection, returned = documents.len(), "find");
        Ok(documents)
    }

    async fn insert_one(
        &self,
        session: Option<&mut MemorySession>,
        collection: &str,
        document: Document,
    ) -> Result<InsertOneResult> {
        self.shared.counters.writes.fetch_add(1, Ordering::SeqCst);
        let change = match self.session_workspace(session)? {
            Some(txn) => {
                let change = txn.workspace_mut().insert(collection, document)?;
                txn.record(change.clone());
                change
            }
            None => self.shared.state.write()?.insert(collection, document)?,
        };
        trace!(collection, id = %change.id(), "insert_one");
        Ok(InsertOneResult {
            inserted_id: change.id(),
        })
    }

    async fn delete_one(
        &self,
        session: Option<&mut MemorySession>,
        collection: &str,
        filter: &Filter,
    ) -> Result<DeleteResult> {
        self.shared.counters.writes.fetch_add(1, Ordering::SeqCst);
        let change = match self.session_workspace(session)? {
            Some(txn) => {
                let change = txn.workspace_mut().delete_one(collection, filter)?;
                if let Some(change) = &change {
                    txn.record(change.clone());
                }
                change
            }
            None => self.shared.state.write()?.delete_one(collection, filter)?,
        };
        Ok(DeleteResult {
            deleted_count: u64::from(change.is_some()),
        })
    }

    async fn update_one(
        &self,
        session: Option<&mut MemorySession>,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult> {
        self.shared.counters.writes.fetch_add(1, Ordering::SeqCst);
        let (matched, change) = match self.session_workspace(session)? {
            Some(txn) => {
                let (matched, change) = txn.workspace_mut().update_one(collection, filter, update)?;
                if let Some(change) = &change {
                    txn.record(change.clone());
                }
                (matched, change)
            }
            None => self
                .shared
                .state
                .write()?
                .update_one(collection, filter, update)?,
        };
        Ok(UpdateResult {
            matched_count: matched,
            modified_count: u64::from(change.is_some()),
        })
    }

    async fn create_unique_index(&self, collection: &str, field: &str) -> Result<()> {
        self.shared
            .state
            .write()?
            .create_unique_index(collection, field)
    }
}
