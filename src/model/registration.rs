use super::member::Member;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims of the authenticated caller, already extracted from its token
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub subject: String,
    pub email: Option<String>,
    pub preferred_username: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.preferred_username = Some(username.into());
        self
    }

    pub fn with_name(mut self, given_name: impl Into<String>, family_name: impl Into<String>) -> Self {
        self.given_name = Some(given_name.into());
        self.family_name = Some(family_name.into());
        self
    }

    /// Email claim, ignoring blank values
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|email| !email.trim().is_empty())
    }

    /// Preferred username, falling back to the email claim
    pub fn display_username(&self) -> String {
        self.preferred_username
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_default()
    }

    /// Member built from the claims alone
    pub fn to_member(&self) -> Member {
        Member::new(
            self.subject.clone(),
            self.display_username(),
            self.email.clone().unwrap_or_default(),
        )
        .with_name(
            self.given_name.clone().unwrap_or_default(),
            self.family_name.clone().unwrap_or_default(),
        )
    }
}

/// Registration state of the caller, as shown before completing registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationData {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// RFC 3339 timestamp of when this view was produced
    pub created_at: String,
    pub complete: bool,
}

impl RegistrationData {
    pub fn from_identity(identity: &Identity, complete: bool, now: DateTime<Utc>) -> Self {
        Self {
            user_id: identity.subject.clone(),
            username: identity.display_username(),
            email: identity.email.clone().unwrap_or_default(),
            first_name: identity.given_name.clone().unwrap_or_default(),
            last_name: identity.family_name.clone().unwrap_or_default(),
            created_at: now.to_rfc3339(),
            complete,
        }
    }
}

/// Details submitted by the caller to complete registration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDetails {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// Outcome of the registration gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    /// The caller has no member yet and must complete registration
    RegistrationRequired,
    Registered,
}
