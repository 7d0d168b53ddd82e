use crate::claims::Role;
use crate::entry::{IdEntry, UserBoundEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name embedded in issued tokens; falls back to the id.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

impl IdEntry for User {
    const KIND: &'static str = "User";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Single-use sign-up code carrying the roles granted to whoever redeems it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: String,
    pub roles: Vec<Role>,
}

impl IdEntry for Invitation {
    const KIND: &'static str = "Invitation";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Bookkeeping record for an issued pair, keyed by its `RefreshTokenId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEntry {
    pub id: String,
    pub user_id: String,
    pub valid_until: DateTime<Utc>,
}

impl IdEntry for TokenEntry {
    const KIND: &'static str = "Token";

    fn id(&self) -> &str {
        &self.id
    }
}

impl UserBoundEntry for TokenEntry {
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUp {
    #[validate(length(min = 1, max = 128))]
    pub id: String,
    #[serde(default)]
    #[validate(length(max = 256))]
    pub display_name: Option<String>,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(length(min = 1))]
    pub invitation_code: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignIn {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    #[validate(length(min = 1))]
    pub old_password: String,
    #[validate(length(min = 1))]
    pub new_password: String,
}
