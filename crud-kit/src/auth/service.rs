use super::jwt::{JwtTokenService, Token};
use super::models::{ChangePassword, Invitation, SignIn, SignUp, TokenEntry, User};
use super::password::PasswordHasher;
use crate::claims::Claim;
use crate::error::CrudError;
use crate::provider::{Provider, Store, UserBoundProvider};
use crate::transaction::run_atomically;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Collection names used by the auth service.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthCollections {
    #[serde(default = "default_users")]
    pub users: String,
    #[serde(default = "default_invitations")]
    pub invitations: String,
    #[serde(default = "default_tokens")]
    pub tokens: String,
}

fn default_users() -> String {
    "users".to_string()
}

fn default_invitations() -> String {
    "invitations".to_string()
}

fn default_tokens() -> String {
    "tokens".to_string()
}

impl Default for AuthCollections {
    fn default() -> Self {
        Self {
            users: default_users(),
            invitations: default_invitations(),
            tokens: default_tokens(),
        }
    }
}

/// Account lifecycle: sign-up, sign-in, change-password, refresh and delete.
///
/// Every operation is one transaction. Each issued pair is recorded as a
/// [`TokenEntry`] in that same transaction, and the user's expired entries
/// are dropped there too. Nothing consults those records when validating
/// tokens.
pub struct DomainAuthService<S: Store> {
    users: Arc<S::EntryProvider<User>>,
    invitations: Arc<S::EntryProvider<Invitation>>,
    tokens: Arc<S::UserBoundEntryProvider<TokenEntry>>,
    transactions: Arc<S::Transactions>,
    jwt: JwtTokenService,
    hasher: Arc<dyn PasswordHasher>,
}

impl<S: Store> Clone for DomainAuthService<S> {
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
            invitations: Arc::clone(&self.invitations),
            tokens: Arc::clone(&self.tokens),
            transactions: Arc::clone(&self.transactions),
            jwt: self.jwt.clone(),
            hasher: Arc::clone(&self.hasher),
        }
    }
}

impl<S: Store> DomainAuthService<S> {
    pub fn new(
        store: &S,
        collections: &AuthCollections,
        jwt: JwtTokenService,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            users: Arc::new(store.provider(&collections.users)),
            invitations: Arc::new(store.provider(&collections.invitations)),
            tokens: Arc::new(store.user_bound_provider(&collections.tokens)),
            transactions: Arc::new(store.transactions()),
            jwt,
            hasher,
        }
    }

    pub fn jwt(&self) -> &JwtTokenService {
        &self.jwt
    }

    /// Redeems an invitation. The invitation is deleted in the same
    /// transaction that creates the user, so a code works once.
    pub async fn sign_up(&self, sign_up: SignUp, cancel: CancellationToken) -> Result<Token, CrudError> {
        let password_hash = self.hasher.hash(&sign_up.password)?;
        let (users, invitations, tokens) = (
            Arc::clone(&self.users),
            Arc::clone(&self.invitations),
            Arc::clone(&self.tokens),
        );
        let jwt = self.jwt.clone();
        let user_id = sign_up.id.clone();

        let token = run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move {
                let invitation = invitations.read_by_id(tx, &sign_up.invitation_code).await?;

                let user = User {
                    id: sign_up.id,
                    display_name: sign_up.display_name,
                    password_hash,
                    roles: invitation.roles.clone(),
                    created_at: Utc::now(),
                };
                let user = users.create(tx, user).await?;
                invitations.delete(tx, &invitation.id).await?;

                issue_token(&jwt, tokens.as_ref(), tx, &user).await
            })
        })
        .await?;

        tracing::info!(user_id = %user_id, "User signed up");
        Ok(token)
    }

    /// A missing user and a wrong password are indistinguishable: both are
    /// `Unauthorized`.
    pub async fn sign_in(&self, sign_in: SignIn, cancel: CancellationToken) -> Result<Token, CrudError> {
        let (users, tokens) = (Arc::clone(&self.users), Arc::clone(&self.tokens));
        let hasher = Arc::clone(&self.hasher);
        let jwt = self.jwt.clone();
        let user_id = sign_in.id.clone();

        let token = run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move {
                let user = authenticate_user(users.as_ref(), tx, hasher.as_ref(), &sign_in.id, &sign_in.password)
                    .await?;
                issue_token(&jwt, tokens.as_ref(), tx, &user).await
            })
        })
        .await?;

        tracing::info!(user_id = %user_id, "User signed in");
        Ok(token)
    }

    /// Replaces the stored hash. Tokens already issued stay valid.
    pub async fn change_password(
        &self,
        user_id: String,
        change: ChangePassword,
        cancel: CancellationToken,
    ) -> Result<(), CrudError> {
        let new_hash = self.hasher.hash(&change.new_password)?;
        let users = Arc::clone(&self.users);
        let hasher = Arc::clone(&self.hasher);
        let owner = user_id.clone();

        run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move {
                let user = authenticate_user(users.as_ref(), tx, hasher.as_ref(), &user_id, &change.old_password)
                    .await?;
                users
                    .update(
                        tx,
                        User {
                            password_hash: new_hash,
                            ..user
                        },
                    )
                    .await?;
                Ok(())
            })
        })
        .await?;

        tracing::info!(user_id = %owner, "Password changed");
        Ok(())
    }

    /// Issues a new pair from the user's stored roles.
    pub async fn refresh(&self, user_id: String, cancel: CancellationToken) -> Result<Token, CrudError> {
        let (users, tokens) = (Arc::clone(&self.users), Arc::clone(&self.tokens));
        let jwt = self.jwt.clone();
        let owner = user_id.clone();

        let token = run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move {
                let user = users.read_by_id(tx, &user_id).await.map_err(unknown_user)?;
                issue_token(&jwt, tokens.as_ref(), tx, &user).await
            })
        })
        .await?;

        tracing::info!(user_id = %owner, "Token refreshed");
        Ok(token)
    }

    /// Deletes the caller's account after re-checking their password.
    pub async fn delete(
        &self,
        user_id: String,
        sign_in: SignIn,
        cancel: CancellationToken,
    ) -> Result<(), CrudError> {
        if sign_in.id != user_id {
            tracing::warn!(user_id = %user_id, "Account deletion attempted with foreign credentials");
            return Err(CrudError::invalid_credentials());
        }

        let (users, tokens) = (Arc::clone(&self.users), Arc::clone(&self.tokens));
        let hasher = Arc::clone(&self.hasher);
        let owner = user_id.clone();

        run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move {
                authenticate_user(users.as_ref(), tx, hasher.as_ref(), &user_id, &sign_in.password).await?;
                users.delete(tx, &user_id).await?;

                for entry in tokens.read(tx, &user_id).await? {
                    tokens.delete(tx, &user_id, &entry.id).await?;
                }
                Ok(())
            })
        })
        .await?;

        tracing::info!(user_id = %owner, "Account deleted");
        Ok(())
    }
}

fn unknown_user(err: CrudError) -> CrudError {
    match err {
        CrudError::NotFound(_) => CrudError::invalid_credentials(),
        other => other,
    }
}

async fn authenticate_user<P>(
    users: &P,
    tx: &mut P::Handle,
    hasher: &dyn PasswordHasher,
    id: &str,
    password: &str,
) -> Result<User, CrudError>
where
    P: Provider<Entry = User>,
{
    let user = users.read_by_id(tx, id).await.map_err(|err| {
        if matches!(err, CrudError::NotFound(_)) {
            tracing::warn!(user_id = %id, "Authentication failed: unknown user");
        }
        unknown_user(err)
    })?;

    if !hasher.verify(password, &user.password_hash) {
        tracing::warn!(user_id = %id, "Authentication failed: wrong password");
        return Err(CrudError::invalid_credentials());
    }

    Ok(user)
}

async fn issue_token<P>(
    jwt: &JwtTokenService,
    tokens: &P,
    tx: &mut P::Handle,
    user: &User,
) -> Result<Token, CrudError>
where
    P: UserBoundProvider<Entry = TokenEntry>,
{
    let now = Utc::now();
    let expired = tokens
        .read(tx, &user.id)
        .await?
        .into_iter()
        .filter(|entry| entry.valid_until < now);
    for entry in expired {
        tokens.delete(tx, &user.id, &entry.id).await?;
    }

    let claims: Vec<Claim> = user.roles.iter().map(Claim::role).collect();
    let issued = jwt.issue_at(&user.id, user.display_name(), &claims, now)?;

    tokens
        .create(
            tx,
            &user.id,
            TokenEntry {
                id: issued.refresh_token_id,
                user_id: user.id.clone(),
                valid_until: issued.refresh_expires,
            },
        )
        .await?;

    Ok(issued.token)
}
