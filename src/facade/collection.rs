use crate::core::{Document, Filter, Query, Result, StoreError, Update};
use crate::store::{DeleteResult, DocumentStore, InsertOneResult, UpdateResult};
use crate::transaction::UnitOfWork;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

/// Typed handle on a named collection.
///
/// Every operation takes the current [`UnitOfWork`]. While the unit of work
/// has no session the operation runs standalone; once a session is bound it
/// runs inside a coordinator frame, joining the active transaction or
/// opening one of its own.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn find<C: DocumentStore>(&self, uow: &mut UnitOfWork<C>, query: Query) -> Result<Vec<T>> {
        let frame = uow.enter_if_bound().await?;
        let result = uow.target().find(&self.name, &query).await;
        let documents = uow.leave_if_bound(frame, result).await?;

        documents.into_iter().map(decode).collect()
    }

    /// First document matching `filter`, if any
    pub async fn find_one<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        filter: Filter,
    ) -> Result<Option<T>> {
        let mut found = self.find(uow, Query::matching(filter).limit(1)).await?;
        Ok(found.pop())
    }

    pub async fn insert_one<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        item: &T,
    ) -> Result<InsertOneResult> {
        let document = encode(item)?;

        let frame = uow.enter_if_bound().await?;
        let result = uow.target().insert_one(&self.name, document).await;
        uow.leave_if_bound(frame, result).await
    }

    pub async fn delete_one<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        filter: Filter,
    ) -> Result<DeleteResult> {
        let frame = uow.enter_if_bound().await?;
        let result = uow.target().delete_one(&self.name, &filter).await;
        uow.leave_if_bound(frame, result).await
    }

    /// Merge-patch update: only the fields set in `patch` are written
    pub async fn update_one<C, U>(
        &self,
        uow: &mut UnitOfWork<C>,
        filter: Filter,
        patch: U,
    ) -> Result<UpdateResult>
    where
        C: DocumentStore,
        U: Into<Update> + Send,
    {
        let update = patch.into();

        let frame = uow.enter_if_bound().await?;
        let result = uow.target().update_one(&self.name, &filter, &update).await;
        uow.leave_if_bound(frame, result).await
    }
}

fn encode<T: Serialize>(item: &T) -> Result<Document> {
    match serde_json::to_value(item)? {
        Value::Object(document) => Ok(document),
        other => Err(StoreError::Serialization(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

fn decode<T: DeserializeOwned>(document: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(document))?)
}
