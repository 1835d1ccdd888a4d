use crate::config::StoreConfig;
use crate::core::{ObjectId, Result, StoreError};
use crate::model::{Identity, Member, MemberPatch, RegistrationData, RegistrationDetails, RegistrationStatus};
use crate::pagination::CursorPage;
use crate::repository::MemberRepo;
use crate::store::{DeleteResult, DocumentStore, UpdateResult};
use crate::transaction::UnitOfWork;
use chrono::Utc;
use tracing::info;

/// Where callers are sent to complete their registration
pub const REGISTRATION_URL: &str = "/auth/register";

/// Member workflows on top of [`MemberRepo`]
#[derive(Debug, Clone)]
pub struct MemberService {
    repo: MemberRepo,
    complete_registration_enabled: bool,
}

impl MemberService {
    pub fn new(repo: MemberRepo) -> Self {
        Self {
            repo,
            complete_registration_enabled: true,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(MemberRepo::new(config.members_collection.clone()))
            .with_complete_registration(config.complete_registration_enabled)
    }

    pub fn with_complete_registration(mut self, enabled: bool) -> Self {
        self.complete_registration_enabled = enabled;
        self
    }

    pub fn repo(&self) -> &MemberRepo {
        &self.repo
    }

    pub async fn find_by_id<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        id: &str,
    ) -> Result<Option<Member>> {
        self.repo.find_by_id(uow, id).await
    }

    pub async fn list<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        size: i64,
        cursor: Option<&str>,
    ) -> Result<CursorPage<Member>> {
        self.repo.list_members_page(uow, size, cursor).await
    }

    pub async fn delete_by_id<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        id: &str,
    ) -> Result<DeleteResult> {
        self.repo.delete_by_id(uow, id).await
    }

    /// Apply `changes` to the member with the given id. Any id carried by
    /// `changes` itself is ignored.
    pub async fn update<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        id: &str,
        changes: MemberPatch,
    ) -> Result<UpdateResult> {
        if id.trim().is_empty() {
            return Err(StoreError::Precondition("id cannot be blank".into()));
        }

        let patch = MemberPatch {
            id: Some(ObjectId::parse_str(id)?),
            ..changes
        };
        self.repo.update(uow, &patch).await
    }

    pub async fn registration_data<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        identity: &Identity,
    ) -> Result<RegistrationData> {
        let complete = match identity.email() {
            Some(email) => self.repo.find_by_email(uow, email).await?.is_some(),
            None => false,
        };
        Ok(RegistrationData::from_identity(identity, complete, Utc::now()))
    }

    /// Register the caller with the submitted details.
    ///
    /// The existence check and the insert run in one transaction.
    pub async fn complete_registration<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        identity: &Identity,
        details: RegistrationDetails,
    ) -> Result<Member> {
        let Some(email) = identity.email().map(str::to_string) else {
            return Err(StoreError::Precondition("identity has no email claim".into()));
        };

        let mut member = identity
            .to_member()
            .with_name(details.first_name, details.last_name);
        member.phone_number = details.phone_number;

        let repo = self.repo.clone();
        uow.execute(move |uow| {
            Box::pin(async move {
                if repo.find_by_email(uow, &email).await?.is_some() {
                    return Err(StoreError::AlreadyRegistered(email));
                }
                repo.register(uow, &member).await
            })
        })
        .await
        .map_err(|err| match err {
            StoreError::TransactionFailed { source }
                if matches!(*source, StoreError::AlreadyRegistered(_)) =>
            {
                *source
            }
            other => other,
        })
    }

    /// Registration gate run before member operations.
    ///
    /// Callers without an email claim pass through. Unknown callers are
    /// either asked to complete registration or, when that step is
    /// disabled, registered from their claims.
    pub async fn check_registration<C: DocumentStore>(
        &self,
        uow: &mut UnitOfWork<C>,
        identity: &Identity,
    ) -> Result<RegistrationStatus> {
        let Some(email) = identity.email().map(str::to_string) else {
            return Ok(RegistrationStatus::Registered);
        };

        if self.complete_registration_enabled {
            return Ok(match self.repo.find_by_email(uow, &email).await? {
                Some(_) => RegistrationStatus::Registered,
                None => RegistrationStatus::RegistrationRequired,
            });
        }

        let repo = self.repo.clone();
        let member = identity.to_member();
        uow.execute(move |uow| {
            Box::pin(async move {
                if repo.find_by_email(uow, &email).await?.is_none() {
                    let saved = repo.register(uow, &member).await?;
                    info!(email = %email, member_id = ?saved.id, "member registered from claims");
                }
                Ok(RegistrationStatus::Registered)
            })
        })
        .await
    }
}
