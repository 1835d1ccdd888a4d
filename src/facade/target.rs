//! Where a collection operation runs: standalone against the client, or
//! bound to the unit of work's session.

use crate::core::{Document, Filter, Query, Result, Update};
use crate::store::{DeleteResult, DocumentStore, InsertOneResult, UpdateResult};
use async_trait::async_trait;

#[async_trait]
pub trait OperationTarget: Send {
    fn is_session_bound(&self) -> bool;

    async fn find(&mut self, collection: &str, query: &Query) -> Result<Vec<Document>>;

    async fn insert_one(&mut self, collection: &str, document: Document) -> Result<InsertOneResult>;

    async fn delete_one(&mut self, collection: &str, filter: &Filter) -> Result<DeleteResult>;

    async fn update_one(
        &mut self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult>;
}

/// Executes directly on the client, outside any session
pub struct Standalone<'a, C> {
    client: &'a C,
}

impl<'a, C: DocumentStore> Standalone<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<'a, C: DocumentStore> OperationTarget for Standalone<'a, C> {
    fn is_session_bound(&self) -> bool {
        false
    }

    async fn find(&mut self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        self.client.find(None, collection, query).await
    }

    async fn insert_one(&mut self, collection: &str, document: Document) -> Result<InsertOneResult> {
        self.client.insert_one(None, collection, document).await
    }

    async fn delete_one(&mut self, collection: &str, filter: &Filter) -> Result<DeleteResult> {
        self.client.delete_one(None, collection, filter).await
    }

    async fn update_one(
        &mut self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult> {
        self.client.update_one(None, collection, filter, update).await
    }
}

/// Executes inside a session, and so inside its active transaction
pub struct InSession<'a, C: DocumentStore> {
    client: &'a C,
    session: &'a mut C::Session,
}

impl<'a, C: DocumentStore> InSession<'a, C> {
    pub fn new(client: &'a C, session: &'a mut C::Session) -> Self {
        Self { client, session }
    }
}

#[async_trait]
impl<'a, C: DocumentStore> OperationTarget for InSession<'a, C> {
    fn is_session_bound(&self) -> bool {
        true
    }

    async fn find(&mut self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        self.client.find(Some(&mut *self.session), collection, query).await
    }

    async fn insert_one(&mut self, collection: &str, document: Document) -> Result<InsertOneResult> {
        self.client
            .insert_one(Some(&mut *self.session), collection, document)
            .await
    }

    async fn delete_one(&mut self, collection: &str, filter: &Filter) -> Result<DeleteResult> {
        self.client
            .delete_one(Some(&mut *self.session), collection, filter)
            .await
    }

    async fn update_one(
        &mut self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult> {
        self.client
            .update_one(Some(&mut *self.session), collection, filter, update)
            .await
    }
}
