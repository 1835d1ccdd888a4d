use crate::core::{Filter, ID_FIELD, ObjectId, Query, Result, Sort, StoreError};
use crate::facade::Collection;
use crate::model::{Member, MemberPatch};
use crate::pagination::CursorPage;
use crate::store::{DeleteResult, DocumentStore, UpdateResult};
use crate::transaction::UnitOfWork;
use tracing::{debug, info};

pub const DEFAULT_COLLECTION: &str = "members";

/// Member persistence: point lookups, cursor pages ordered by `_id`,
/// register/update/delete.
///
/// Blank identifiers are treated as "nothing to look up" and never reach
/// the store.
#[derive(Debug, Clone)]
pub struct MemberRepo {
    members: Collection<Member>,
}

impl Default for MemberRepo {
    fn default() -> Self {
        Self::new(DEFAULT_COLLECTION)
    }
}

impl MemberRepo {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            members: Collection::new(collection),
        }
    }

    pub fn collection_name(&self) -> &str {
        self.members.name()
    }

    /// Declare the unique indexes on `email` and `userId`
    pub async fn ensure_indexes<C: DocumentStore>(&self, client: &C) -> Result<()> {
        for field in [Member::EMAIL, Member::USER_ID] {
            client.create_unique_index(self.members.name(), field).await?;
        }
        debug!(collection = %self.members.name(), "member indexes ensured");
        Ok(())
    }

    pub async fn find_by_id<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        id: &str,
    ) -> Result<Option<Member>> {
        if is_blank(id) {
            return Ok(None);
        }
        let id = ObjectId::parse_str(id)?;
        self.members.find_one(uow, Filter::eq(ID_FIELD, id)).await
    }

    pub async fn find_by_email<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        email: &str,
    ) -> Result<Option<Member>> {
        if is_blank(email) {
            return Ok(None);
        }
        self.members.find_one(uow, Filter::eq(Member::EMAIL, email)).await
    }

    pub async fn find_by_user_id<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        user_id: &str,
    ) -> Result<Option<Member>> {
        if is_blank(user_id) {
            return Ok(None);
        }
        self.members.find_one(uow, Filter::eq(Member::USER_ID, user_id)).await
    }

    /// One page of members ordered by ascending id, starting after `cursor`.
    ///
    /// A non-positive `size` yields an empty page without querying.
    pub async fn list_members_page<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        size: i64,
        cursor: Option<&str>,
    ) -> Result<CursorPage<Member>> {
        if size <= 0 {
            return Ok(CursorPage::empty());
        }
        let size = usize::try_from(size).unwrap_or(usize::MAX);

        let filter = match cursor.filter(|cursor| !is_blank(cursor)) {
            Some(cursor) => Filter::gt(ID_FIELD, ObjectId::parse_str(cursor)?),
            None => Filter::empty(),
        };
        let query = Query::matching(filter)
            .sort(Sort::ascending(ID_FIELD))
            .limit(size);

        let members = self.members.find(uow, query).await?;
        Ok(CursorPage::from_results(members, size, |member| member.id))
    }

    /// Insert a member and return it with its id.
    ///
    /// A member that already carries an id keeps it.
    pub async fn register<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        member: &Member,
    ) -> Result<Member> {
        let inserted = self.members.insert_one(uow, member).await?;
        info!(member_id = %inserted.inserted_id, email = %member.email, "member registered");

        let mut saved = member.clone();
        saved.id = Some(inserted.inserted_id);
        Ok(saved)
    }

    pub async fn save<C: DocumentStore>(&self, uow: &mut UnitOfWork<C>, member: &Member) -> Result<Member> {
        self.register(uow, member).await
    }

    /// Merge-patch update of the member named by `patch.id`
    pub async fn update<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        patch: &MemberPatch,
    ) -> Result<UpdateResult> {
        let id = patch
            .id
            .ok_or_else(|| StoreError::Precondition("member id is required for update".into()))?;

        let result = self
            .members
            .update_one(uow, Filter::eq(ID_FIELD, id), patch)
            .await?;
        info!(
            member_id = %id,
            matched = result.matched_count,
            modified = result.modified_count,
            "member updated"
        );
        Ok(result)
    }

    pub async fn delete_by_id<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        id: &str,
    ) -> Result<DeleteResult> {
        if is_blank(id) {
            return Ok(DeleteResult::default());
        }
        let id = ObjectId::parse_str(id)?;

        let result = self.members.delete_one(uow, Filter::eq(ID_FIELD, id)).await?;
        info!(member_id = %id, deleted = result.deleted_count, "member deleted");
        Ok(result)
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn member(n: u32) -> Member {
        Member::new(format!("user-{n}"), format!("user{n}"), format!("user{n}@example.com"))
            .with_name("Test", format!("Member {n}"))
    }

    #[tokio::test]
    async fn test_blank_lookups_skip_store() {
        let store = MemoryStore::new();
        let repo = MemberRepo::default();
        let mut uow = UnitOfWork::new(store.clone());

        assert_eq!(repo.find_by_id(&mut uow, "").await.unwrap(), None);
        assert_eq!(repo.find_by_email(&mut uow, "  ").await.unwrap(), None);
        assert_eq!(repo.find_by_user_id(&mut uow, "").await.unwrap(), None);
        assert_eq!(repo.delete_by_id(&mut uow, "").await.unwrap().deleted_count, 0);

        let stats = store.stats();
        assert_eq!(stats.queries, 0);
        assert_eq!(stats.writes, 0);
        assert_eq!(stats.sessions_started, 0);
    }

    #[tokio::test]
    async fn test_malformed_id_is_an_error() {
        let repo = MemberRepo::default();
        let mut uow = UnitOfWork::new(MemoryStore::new());

        let err = repo.find_by_id(&mut uow, "not-an-id").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidObjectId(_)));
    }

    #[tokio::test]
    async fn test_register_assigns_id() {
        let repo = MemberRepo::default();
        let mut uow = UnitOfWork::new(MemoryStore::new());

        let saved = repo.register(&mut uow, &member(1)).await.unwrap();
        let id = saved.id.unwrap();

        let found = repo.find_by_id(&mut uow, &id.to_hex()).await.unwrap();
        assert_eq!(found, Some(saved));
    }

    #[tokio::test]
    async fn test_register_keeps_given_id() {
        let repo = MemberRepo::default();
        let mut uow = UnitOfWork::new(MemoryStore::new());
        let id = ObjectId::new();

        let saved = repo.save(&mut uow, &member(1).with_id(id)).await.unwrap();
        assert_eq!(saved.id, Some(id));
    }

    #[tokio::test]
    async fn test_update_requires_id() {
        let repo = MemberRepo::default();
        let mut uow = UnitOfWork::new(MemoryStore::new());

        let err = repo
            .update(&mut uow, &MemberPatch::default().email("x@y.z"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_non_positive_page_size() {
        let store = MemoryStore::new();
        let repo = MemberRepo::default();
        let mut uow = UnitOfWork::new(store.clone());

        for size in [0, -1, i64::MIN] {
            let page = repo.list_members_page(&mut uow, size, None).await.unwrap();
            assert!(page.is_empty());
            assert!(page.next_cursor.is_none());
        }
        assert_eq!(store.stats().queries, 0);
    }
}
