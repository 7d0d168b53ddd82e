//! Claims carried by an authenticated caller.
//!
//! A caller is described by a flat list of `(type, value)` pairs. Several
//! claims may share a type (one per role, for instance). [`Claims`] offers
//! optional accessors for the well-known types and `require_*` variants for
//! call sites that must reject an incomplete identity.

use crate::error::CrudError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub mod claim_types {
    pub const NAME: &str = "Name";
    pub const ROLE: &str = "Role";
    pub const USER_ID: &str = "UserId";
    pub const REFRESH_TOKEN_ID: &str = "RefreshTokenId";
}

/// Role identifier; serialized as its bare name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Carried only by access tokens.
    pub const ACCESSOR: Role = Role(Cow::Borrowed("Accessor"));
    /// Carried only by refresh tokens.
    pub const REFRESHER: Role = Role(Cow::Borrowed("Refresher"));
    pub const ADMIN: Role = Role(Cow::Borrowed("Admin"));
    pub const USER: Role = Role(Cow::Borrowed("User"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Accessor` and `Refresher` are minted by the token service only and
    /// can never be granted to a user.
    pub fn is_token_role(&self) -> bool {
        *self == Role::ACCESSOR || *self == Role::REFRESHER
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl Claim {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    pub fn role(role: &Role) -> Self {
        Self::new(claim_types::ROLE, role.as_str())
    }

    pub fn user_id(id: impl Into<String>) -> Self {
        Self::new(claim_types::USER_ID, id)
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::new(claim_types::NAME, name)
    }

    pub fn refresh_token_id(id: impl Into<String>) -> Self {
        Self::new(claim_types::REFRESH_TOKEN_ID, id)
    }

    pub fn is_token_role(&self) -> bool {
        self.kind == claim_types::ROLE
            && (self.value == Role::ACCESSOR.as_str() || self.value == Role::REFRESHER.as_str())
    }
}

impl From<Role> for Claim {
    fn from(role: Role) -> Self {
        Claim::role(&role)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Vec<Claim>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, claim: Claim) {
        self.0.push(claim);
    }

    pub fn with(mut self, claim: Claim) -> Self {
        self.push(claim);
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Claim> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[Claim] {
        &self.0
    }

    /// Exact match on both type and value.
    pub fn contains(&self, claim: &Claim) -> bool {
        self.0
            .iter()
            .any(|c| c.kind == claim.kind && c.value == claim.value)
    }

    pub fn values<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |c| c.kind == kind)
            .map(|c| c.value.as_str())
    }

    pub fn first(&self, kind: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.value.as_str())
    }

    pub fn roles(&self) -> Vec<Role> {
        self.values(claim_types::ROLE)
            .map(|value| Role::new(value.to_string()))
            .collect()
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.contains(&Claim::role(role))
    }

    pub fn user_id(&self) -> Option<&str> {
        self.first(claim_types::USER_ID)
    }

    pub fn name(&self) -> Option<&str> {
        self.first(claim_types::NAME)
    }

    pub fn refresh_token_id(&self) -> Option<&str> {
        self.first(claim_types::REFRESH_TOKEN_ID)
    }

    pub fn require_user_id(&self) -> Result<&str, CrudError> {
        self.user_id()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CrudError::Unauthorized("Caller identity is missing".to_string()))
    }

    pub fn require_refresh_token_id(&self) -> Result<&str, CrudError> {
        self.refresh_token_id()
            .ok_or_else(|| CrudError::Unauthorized("Refresh token id is missing".to_string()))
    }

    pub fn require_role(&self, role: &Role) -> Result<(), CrudError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(CrudError::Unauthorized(format!("Role '{}' is required", role)))
        }
    }
}

impl FromIterator<Claim> for Claims {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Claim> for Claims {
    fn extend<I: IntoIterator<Item = Claim>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Claims {
    type Item = Claim;
    type IntoIter = std::vec::IntoIter<Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Claims {
    type Item = &'a Claim;
    type IntoIter = std::slice::Iter<'a, Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Claims {
        Claims::new()
            .with(Claim::user_id("u1"))
            .with(Claim::name("Ada"))
            .with(Claim::role(&Role::USER))
            .with(Claim::role(&Role::ACCESSOR))
            .with(Claim::refresh_token_id("r-1"))
    }

    #[test]
    fn test_typed_accessors() {
        let claims = sample();
        assert_eq!(claims.user_id(), Some("u1"));
        assert_eq!(claims.name(), Some("Ada"));
        assert_eq!(claims.refresh_token_id(), Some("r-1"));
        assert_eq!(claims.roles(), vec![Role::USER, Role::ACCESSOR]);
    }

    #[test]
    fn test_accessors_are_optional_on_empty_claims() {
        let claims = Claims::new();
        assert!(claims.user_id().is_none());
        assert!(claims.refresh_token_id().is_none());
        assert!(claims.roles().is_empty());
    }

    #[test]
    fn test_require_wrappers_fail_loudly() {
        let claims = Claims::new().with(Claim::role(&Role::USER));
        assert!(matches!(claims.require_user_id(), Err(CrudError::Unauthorized(_))));
        assert!(matches!(claims.require_refresh_token_id(), Err(CrudError::Unauthorized(_))));
        assert!(matches!(claims.require_role(&Role::ADMIN), Err(CrudError::Unauthorized(_))));
        assert!(claims.require_role(&Role::USER).is_ok());
    }

    #[test]
    fn test_contains_matches_type_and_value() {
        let claims = sample();
        assert!(claims.contains(&Claim::new("Role", "User")));
        // Same value under another type does not count.
        assert!(!claims.contains(&Claim::new("Name", "User")));
        assert!(!claims.contains(&Claim::new("Role", "Admin")));
    }

    #[test]
    fn test_token_roles_are_recognized() {
        assert!(Role::ACCESSOR.is_token_role());
        assert!(Role::new("Refresher").is_token_role());
        assert!(!Role::ADMIN.is_token_role());

        assert!(Claim::role(&Role::REFRESHER).is_token_role());
        assert!(!Claim::name("Refresher").is_token_role());
    }

    #[test]
    fn test_serialized_shape() -> Result<(), serde_json::Error> {
        let claims = Claims::new().with(Claim::role(&Role::ADMIN));
        let json = serde_json::to_value(&claims)?;
        assert_eq!(json, serde_json::json!([{ "type": "Role", "value": "Admin" }]));
        Ok(())
    }
}
