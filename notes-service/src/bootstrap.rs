use crate::config::NotesConfig;
use crud_kit::auth::{Invitation, User};
use crud_kit::{run_atomically, CancellationToken, CrudError, Provider, Store};
use service_core::config::Environment;
use service_core::error::AppError;
use std::sync::Arc;

/// Seeds the invitation named by the `bootstrap` section.
///
/// Nothing is written when the section is absent, when the invitation
/// already exists, or once some user holds every bootstrap role. Returns
/// whether an invitation was created.
pub async fn seed_invitation<S: Store>(
    store: &S,
    config: &NotesConfig,
    env: &dyn Environment,
) -> Result<bool, AppError> {
    let Some(bootstrap) = &config.bootstrap else {
        return Ok(false);
    };

    let code = env.get(&bootstrap.invitation_key_name)?;
    if code.trim().is_empty() {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must not be empty",
            bootstrap.invitation_key_name
        )));
    }

    let collections = &config.database.collections.auth;
    let invitations = Arc::new(store.provider::<Invitation>(&collections.invitations));
    let users = Arc::new(store.provider::<User>(&collections.users));
    let roles = bootstrap.roles.clone();

    let seeded = run_atomically(Arc::new(store.transactions()), CancellationToken::new(), move |tx| {
        Box::pin(async move {
            match invitations.read_by_id(tx, &code).await {
                Ok(_) => return Ok(false),
                Err(CrudError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }

            let existing = users.read(tx).await?;
            if existing
                .iter()
                .any(|user| roles.iter().all(|role| user.roles.contains(role)))
            {
                return Ok(false);
            }

            invitations.create(tx, Invitation { id: code, roles }).await?;
            Ok(true)
        })
    })
    .await?;

    if seeded {
        tracing::info!("Bootstrap invitation seeded");
    } else {
        tracing::debug!("Bootstrap invitation not needed");
    }
    Ok(seeded)
}
