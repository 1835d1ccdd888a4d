use crate::core::{ObjectId, Update};
use serde::{Deserialize, Serialize};

/// A registered member.
///
/// `email` and `user_id` are unique across the collection. `id` is assigned
/// on insert and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl Member {
    pub const USER_ID: &'static str = "userId";
    pub const USERNAME: &'static str = "username";
    pub const FIRST_NAME: &'static str = "firstName";
    pub const LAST_NAME: &'static str = "lastName";
    pub const EMAIL: &'static str = "email";
    pub const PHONE_NUMBER: &'static str = "phoneNumber";

    pub fn new(user_id: impl Into<String>, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }
}

/// Partial update of a member: only `Some` fields are written
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPatch {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl MemberPatch {
    pub fn for_id(id: ObjectId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn username(mut self, value: impl Into<String>) -> Self {
        self.username = Some(value.into());
        self
    }

    pub fn first_name(mut self, value: impl Into<String>) -> Self {
        self.first_name = Some(value.into());
        self
    }

    pub fn last_name(mut self, value: impl Into<String>) -> Self {
        self.last_name = Some(value.into());
        self
    }

    pub fn email(mut self, value: impl Into<String>) -> Self {
        self.email = Some(value.into());
        self
    }

    pub fn phone_number(mut self, value: impl Into<String>) -> Self {
        self.phone_number = Some(value.into());
        self
    }

    /// True when no field besides `id` is set
    pub fn is_empty(&self) -> bool {
        Update::from(self).is_empty()
    }
}

impl From<Member> for MemberPatch {
    fn from(member: Member) -> Self {
        Self {
            id: member.id,
            user_id: Some(member.user_id),
            username: Some(member.username),
            first_name: Some(member.first_name),
            last_name: Some(member.last_name),
            email: Some(member.email),
            phone_number: member.phone_number,
        }
    }
}

// `id` is the filter, never part of the `$set`.
impl From<&MemberPatch> for Update {
    fn from(patch: &MemberPatch) -> Self {
        Update::new()
            .set_if_some(Member::USER_ID, patch.user_id.clone())
            .set_if_some(Member::USERNAME, patch.username.clone())
            .set_if_some(Member::FIRST_NAME, patch.first_name.clone())
            .set_if_some(Member::LAST_NAME, patch.last_name.clone())
            .set_if_some(Member::EMAIL, patch.email.clone())
            .set_if_some(Member::PHONE_NUMBER, patch.phone_number.clone())
    }
}

impl From<MemberPatch> for Update {
    fn from(patch: MemberPatch) -> Self {
        Update::from(&patch)
    }
}
