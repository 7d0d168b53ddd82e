use super::models::Invitation;
use crate::claims::Role;
use crate::entry::new_entry_id;
use crate::error::CrudError;
use crate::transformer::Transformer;
use serde::Deserialize;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvitation {
    /// Code to hand out; generated when omitted.
    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    pub id: Option<String>,
    #[validate(length(min = 1), custom(function = "grantable_roles"))]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateInvitation {
    #[validate(length(min = 1), custom(function = "grantable_roles"))]
    pub roles: Vec<Role>,
}

/// Rejects the roles only the token service may assign.
pub fn grantable_roles(roles: &[Role]) -> Result<(), ValidationError> {
    if roles.iter().any(Role::is_token_role) {
        return Err(ValidationError::new("token_role")
            .with_message("Accessor and Refresher cannot be granted".into()));
    }
    Ok(())
}

/// Lets invitations be administered through the ordinary CRUD pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvitationTransformer;

impl Transformer for InvitationTransformer {
    type Create = CreateInvitation;
    type Update = UpdateInvitation;
    type Entry = Invitation;
    type Result = Invitation;

    fn create_entry(&self, create: CreateInvitation) -> Result<Invitation, CrudError> {
        Ok(Invitation {
            id: create.id.unwrap_or_else(new_entry_id),
            roles: create.roles,
        })
    }

    fn update_entry(&self, existing: Invitation, update: UpdateInvitation) -> Result<Invitation, CrudError> {
        Ok(Invitation {
            id: existing.id,
            roles: update.roles,
        })
    }

    fn to_result(&self, entry: Invitation) -> Invitation {
        entry
    }
}
