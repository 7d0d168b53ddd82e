//! Account lifecycle through `DomainAuthService`.

mod common;

use chrono::{Duration, Utc};
use common::{auth_service, invite, record_token};
use crud_kit::auth::{ChangePassword, Invitation, JwtTokenService, SignIn, SignUp, TokenEntry, User};
use crud_kit::store::MemoryStore;
use crud_kit::{CancellationToken, CrudError, Role};

fn sign_up(id: &str, code: &str, password: &str) -> SignUp {
    SignUp {
        id: id.to_string(),
        display_name: Some("Ada Lovelace".to_string()),
        password: password.to_string(),
        invitation_code: code.to_string(),
    }
}

fn sign_in(id: &str, password: &str) -> SignIn {
    SignIn {
        id: id.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_sign_up_consumes_invitation() -> Result<(), CrudError> {
    // Arrange
    let store = MemoryStore::new();
    let auth = auth_service(&store);
    invite(&store, "INV1", vec![Role::USER]).await;

    // Act
    let first = auth.sign_up(sign_up("u1", "INV1", "pw1"), CancellationToken::new()).await?;
    let second = auth
        .sign_up(sign_up("u2", "INV1", "pw2"), CancellationToken::new())
        .await;

    // Assert
    assert!(matches!(second, Err(CrudError::NotFound(_))));
    assert!(store.committed::<Invitation>("invitations")?.is_empty());

    let users = store.committed::<User>("users")?;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, "u1");
    assert_eq!(users[0].roles, vec![Role::USER]);
    assert_ne!(users[0].password_hash, "pw1");

    let access = JwtTokenService::decode(&first.access_token)?;
    assert!(access.claims.has_role(&Role::USER));
    assert!(access.claims.has_role(&Role::ACCESSOR));
    assert_eq!(access.claims.name(), Some("Ada Lovelace"));
    Ok(())
}

#[tokio::test]
async fn test_sign_up_without_invitation_creates_nothing() {
    let store = MemoryStore::new();
    let auth = auth_service(&store);

    let result = auth
        .sign_up(sign_up("u1", "NOPE", "pw1"), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(CrudError::NotFound(_))));
    assert!(store.committed::<User>("users").unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_taken_user_id_keeps_invitation() -> Result<(), CrudError> {
    let store = MemoryStore::new();
    let auth = auth_service(&store);
    invite(&store, "INV1", vec![Role::USER]).await;
    invite(&store, "INV2", vec![Role::ADMIN]).await;
    auth.sign_up(sign_up("u1", "INV1", "pw1"), CancellationToken::new()).await?;

    let result = auth
        .sign_up(sign_up("u1", "INV2", "pw2"), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(CrudError::Conflict(_))));
    let invitations = store.committed::<Invitation>("invitations")?;
    assert_eq!(invitations.len(), 1);
    assert_eq!(invitations[0].id, "INV2");
    Ok(())
}

#[tokio::test]
async fn test_sign_in_rejects_wrong_password_and_unknown_user() -> Result<(), CrudError> {
    let store = MemoryStore::new();
    let auth = auth_service(&store);
    invite(&store, "INV1", vec![Role::USER]).await;
    auth.sign_up(sign_up("u1", "INV1", "pw1"), CancellationToken::new()).await?;

    let wrong = auth.sign_in(sign_in("u1", "wrong"), CancellationToken::new()).await;
    let unknown = auth.sign_in(sign_in("ghost", "pw1"), CancellationToken::new()).await;
    let right = auth.sign_in(sign_in("u1", "pw1"), CancellationToken::new()).await?;

    assert!(matches!(wrong, Err(CrudError::Unauthorized(_))));
    assert!(matches!(unknown, Err(CrudError::Unauthorized(_))));
    let access = JwtTokenService::decode(&right.access_token)?;
    assert_eq!(access.claims.user_id(), Some("u1"));
    Ok(())
}

#[tokio::test]
async fn test_every_issued_pair_is_recorded() -> Result<(), CrudError> {
    let store = MemoryStore::new();
    let auth = auth_service(&store);
    invite(&store, "INV1", vec![Role::USER]).await;

    let first = auth.sign_up(sign_up("u1", "INV1", "pw1"), CancellationToken::new()).await?;
    let second = auth.sign_in(sign_in("u1", "pw1"), CancellationToken::new()).await?;

    let entries = store.committed::<TokenEntry>("tokens")?;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|entry| entry.user_id == "u1"));

    for token in [first, second] {
        let refresh = JwtTokenService::decode(&token.refresh_token)?;
        let id = refresh.claims.require_refresh_token_id()?;
        let entry = entries
            .iter()
            .find(|entry| entry.id == id)
            .expect("token entry recorded");
        assert_eq!(Some(entry.valid_until.timestamp()), refresh.expires);
    }
    Ok(())
}

#[tokio::test]
async fn test_change_password_requires_old_password() -> Result<(), CrudError> {
    let store = MemoryStore::new();
    let auth = auth_service(&store);
    invite(&store, "INV1", vec![Role::USER]).await;
    auth.sign_up(sign_up("u1", "INV1", "pw1"), CancellationToken::new()).await?;

    let rejected = auth
        .change_password(
            "u1".to_string(),
            ChangePassword {
                old_password: "nope".to_string(),
                new_password: "pw2".to_string(),
            },
            CancellationToken::new(),
        )
        .await;
    assert!(matches!(rejected, Err(CrudError::Unauthorized(_))));

    auth.change_password(
        "u1".to_string(),
        ChangePassword {
            old_password: "pw1".to_string(),
            new_password: "pw2".to_string(),
        },
        CancellationToken::new(),
    )
    .await?;

    assert!(auth.sign_in(sign_in("u1", "pw1"), CancellationToken::new()).await.is_err());
    assert!(auth.sign_in(sign_in("u1", "pw2"), CancellationToken::new()).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_refresh_reissues_stored_roles() -> Result<(), CrudError> {
    let store = MemoryStore::new();
    let auth = auth_service(&store);
    invite(&store, "INV1", vec![Role::USER, Role::ADMIN]).await;
    let original = auth.sign_up(sign_up("u1", "INV1", "pw1"), CancellationToken::new()).await?;

    let refreshed = auth.refresh("u1".to_string(), CancellationToken::new()).await?;

    let before = JwtTokenService::decode(&original.access_token)?;
    let after = JwtTokenService::decode(&refreshed.access_token)?;
    assert!(after.claims.has_role(&Role::ADMIN));
    assert!(after.claims.has_role(&Role::USER));
    assert_ne!(before.claims.refresh_token_id(), after.claims.refresh_token_id());

    let gone = auth.refresh("ghost".to_string(), CancellationToken::new()).await;
    assert!(matches!(gone, Err(CrudError::Unauthorized(_))));
    Ok(())
}

#[tokio::test]
async fn test_delete_reverifies_password() -> Result<(), CrudError> {
    let store = MemoryStore::new();
    let auth = auth_service(&store);
    invite(&store, "INV1", vec![Role::USER]).await;
    auth.sign_up(sign_up("u1", "INV1", "pw1"), CancellationToken::new()).await?;

    let wrong = auth
        .delete("u1".to_string(), sign_in("u1", "bad"), CancellationToken::new())
        .await;
    let foreign = auth
        .delete("u1".to_string(), sign_in("u2", "pw1"), CancellationToken::new())
        .await;
    assert!(matches!(wrong, Err(CrudError::Unauthorized(_))));
    assert!(matches!(foreign, Err(CrudError::Unauthorized(_))));
    assert_eq!(store.committed::<User>("users")?.len(), 1);

    auth.delete("u1".to_string(), sign_in("u1", "pw1"), CancellationToken::new())
        .await?;

    assert!(store.committed::<User>("users")?.is_empty());
    assert!(store.committed::<TokenEntry>("tokens")?.is_empty());
    assert!(matches!(
        auth.sign_in(sign_in("u1", "pw1"), CancellationToken::new()).await,
        Err(CrudError::Unauthorized(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_expired_token_entries_are_pruned_on_issue() -> Result<(), CrudError> {
    // Arrange
    let store = MemoryStore::new();
    let auth = auth_service(&store);
    invite(&store, "INV1", vec![Role::USER]).await;
    auth.sign_up(sign_up("u1", "INV1", "pw1"), CancellationToken::new()).await?;
    for n in 0..5 {
        record_token(&store, "u1", &format!("stale-{}", n), Utc::now() - Duration::minutes(1)).await;
    }
    record_token(&store, "u2", "stale-other", Utc::now() - Duration::minutes(1)).await;

    // Act
    for _ in 0..3 {
        auth.sign_in(sign_in("u1", "pw1"), CancellationToken::new()).await?;
    }

    // Assert
    let entries = store.committed::<TokenEntry>("tokens")?;
    let own: Vec<_> = entries.iter().filter(|entry| entry.user_id == "u1").collect();
    assert_eq!(own.len(), 4);
    assert!(own.iter().all(|entry| entry.valid_until > Utc::now()));
    assert!(entries.iter().any(|entry| entry.id == "stale-other"));
    Ok(())
}
