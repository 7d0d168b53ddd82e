//! Shared fixtures for crud-kit integration tests.
//!
//! Everything runs against `MemoryStore`, so no external database is needed.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crud_kit::auth::{
    Argon2Hasher, AuthCollections, DomainAuthService, Invitation, JwtConfig, JwtTokenService,
    TokenEntry,
};
use crud_kit::entry::new_entry_id;
use crud_kit::service::{DomainService, UserBoundDomainService};
use crud_kit::store::{MemoryProvider, MemoryStore, MemoryTransaction, MemoryUserBoundProvider};
use crud_kit::{
    CrudError, IdEntry, Provider, Role, Store, Transformer, UserBoundEntry, UserBoundProvider,
    UserBoundTransformer,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub const JWT_KEY: &[u8] = b"integration-test-signing-key";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
}

impl IdEntry for Book {
    const KIND: &'static str = "Book";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBook {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(length(min = 1))]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateBook {
    #[validate(length(min = 1))]
    pub title: String,
}

pub struct BookTransformer;

impl Transformer for BookTransformer {
    type Create = CreateBook;
    type Update = UpdateBook;
    type Entry = Book;
    type Result = Book;

    fn create_entry(&self, create: CreateBook) -> Result<Book, CrudError> {
        Ok(Book {
            id: create.id.unwrap_or_else(new_entry_id),
            title: create.title,
        })
    }

    fn update_entry(&self, existing: Book, update: UpdateBook) -> Result<Book, CrudError> {
        Ok(Book {
            id: existing.id,
            title: update.title,
        })
    }

    fn to_result(&self, entry: Book) -> Book {
        entry
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memo {
    pub id: String,
    pub user_id: String,
    pub text: String,
}

impl IdEntry for Memo {
    const KIND: &'static str = "Memo";

    fn id(&self) -> &str {
        &self.id
    }
}

impl UserBoundEntry for Memo {
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WriteMemo {
    #[validate(length(min = 1))]
    pub text: String,
}

pub struct MemoTransformer;

impl UserBoundTransformer for MemoTransformer {
    type Create = WriteMemo;
    type Update = WriteMemo;
    type Entry = Memo;
    type Result = Memo;

    fn create_entry(&self, user_id: &str, create: WriteMemo) -> Result<Memo, CrudError> {
        Ok(Memo {
            id: new_entry_id(),
            user_id: user_id.to_string(),
            text: create.text,
        })
    }

    fn update_entry(&self, existing: Memo, update: WriteMemo) -> Result<Memo, CrudError> {
        Ok(Memo {
            text: update.text,
            ..existing
        })
    }

    fn to_result(&self, entry: Memo) -> Memo {
        entry
    }
}

pub type BookService = DomainService<MemoryProvider<Book>, BookTransformer, MemoryStore>;
pub type MemoService = UserBoundDomainService<MemoryUserBoundProvider<Memo>, MemoTransformer, MemoryStore>;

pub fn book_service(store: &MemoryStore) -> BookService {
    DomainService::new(
        Arc::new(store.provider("books")),
        Arc::new(BookTransformer),
        Arc::new(store.transactions()),
    )
}

pub fn memo_service(store: &MemoryStore) -> MemoService {
    UserBoundDomainService::new(
        Arc::new(store.user_bound_provider("memos")),
        Arc::new(MemoTransformer),
        Arc::new(store.transactions()),
    )
}

/// Stores the entry, then fails as if something later in the unit of work broke.
pub struct FailAfterCreate<P>(pub P);

#[async_trait]
impl<P> Provider for FailAfterCreate<P>
where
    P: Provider<Handle = MemoryTransaction>,
{
    type Entry = P::Entry;
    type Handle = MemoryTransaction;

    async fn create(&self, tx: &mut MemoryTransaction, entry: P::Entry) -> Result<P::Entry, CrudError> {
        self.0.create(tx, entry).await?;
        Err(CrudError::Conflict("downstream write rejected".to_string()))
    }

    async fn read(&self, tx: &mut MemoryTransaction) -> Result<Vec<P::Entry>, CrudError> {
        self.0.read(tx).await
    }

    async fn read_by_id(&self, tx: &mut MemoryTransaction, id: &str) -> Result<P::Entry, CrudError> {
        self.0.read_by_id(tx, id).await
    }

    async fn update(&self, tx: &mut MemoryTransaction, entry: P::Entry) -> Result<P::Entry, CrudError> {
        self.0.update(tx, entry).await
    }

    async fn delete(&self, tx: &mut MemoryTransaction, id: &str) -> Result<(), CrudError> {
        self.0.delete(tx, id).await
    }
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        audience: "crud-kit-tests".to_string(),
        issuer: "crud-kit".to_string(),
        key_name: "JWT_KEY".to_string(),
        access_token_expires: 15,
        refresh_token_expires: 120,
        clock_skew_seconds: 0,
    }
}

pub fn jwt() -> JwtTokenService {
    JwtTokenService::new(&jwt_config(), JWT_KEY).expect("Failed to create JWT service")
}

pub fn auth_service(store: &MemoryStore) -> DomainAuthService<MemoryStore> {
    DomainAuthService::new(store, &AuthCollections::default(), jwt(), Arc::new(Argon2Hasher))
}

/// Seeds an invitation outside of any service call.
pub async fn invite(store: &MemoryStore, code: &str, roles: Vec<Role>) {
    let invitations: MemoryProvider<Invitation> = store.provider(&AuthCollections::default().invitations);
    let mut tx = crud_kit::TransactionHandler::start(store)
        .await
        .expect("Failed to start transaction");
    invitations
        .create(
            &mut tx,
            Invitation {
                id: code.to_string(),
                roles,
            },
        )
        .await
        .expect("Failed to seed invitation");
    crud_kit::TransactionHandle::commit(tx)
        .await
        .expect("Failed to commit invitation");
}

/// Records a token pair that was issued at some earlier point.
pub async fn record_token(store: &MemoryStore, user_id: &str, id: &str, valid_until: DateTime<Utc>) {
    let tokens: MemoryUserBoundProvider<TokenEntry> = store.user_bound_provider(&AuthCollections::default().tokens);
    let mut tx = crud_kit::TransactionHandler::start(store)
        .await
        .expect("Failed to start transaction");
    tokens
        .create(
            &mut tx,
            user_id,
            TokenEntry {
                id: id.to_string(),
                user_id: user_id.to_string(),
                valid_until,
            },
        )
        .await
        .expect("Failed to record token");
    crud_kit::TransactionHandle::commit(tx)
        .await
        .expect("Failed to commit token");
}
