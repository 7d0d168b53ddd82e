//! MongoDB-backed store. Transactions need a replica set or sharded cluster.

use crate::entry::{IdEntry, UserBoundEntry};
use crate::error::CrudError;
use crate::provider::{Provider, Store, UserBoundProvider};
use crate::transaction::{TransactionHandle, TransactionHandler};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR},
    options::IndexOptions,
    Client as MongoClient, ClientSession, Collection, Database, IndexModel,
};

const DUPLICATE_KEY: i32 = 11000;

/// Field every entry is addressed by; backed by a unique index.
pub const ID_FIELD: &str = "id";

fn map_mongo_error(err: mongodb::error::Error) -> CrudError {
    let duplicate = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == DUPLICATE_KEY,
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY,
        _ => false,
    };

    if duplicate {
        CrudError::Conflict("Entry already exists".to_string())
    } else if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        CrudError::Conflict("Entry was modified concurrently, retry the request".to_string())
    } else {
        CrudError::Internal(anyhow::Error::new(err))
    }
}

#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, CrudError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            CrudError::Internal(anyhow::Error::new(e))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Secondary index on the owner field of a user-bound collection.
    pub async fn initialize_owner_index(&self, collection: &str, owner_field: &str) -> Result<(), CrudError> {
        let index = IndexModel::builder()
            .keys(doc! { owner_field: 1 })
            .options(
                IndexOptions::builder()
                    .name(format!("{}_lookup", owner_field))
                    .build(),
            )
            .build();

        self.db
            .collection::<Document>(collection)
            .create_index(index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create owner index on {}: {}", collection, e);
                map_mongo_error(e)
            })?;
        tracing::info!("Created index on {}.{}", collection, owner_field);
        Ok(())
    }
}

pub struct MongoTransaction {
    session: ClientSession,
}

#[async_trait]
impl TransactionHandle for MongoTransaction {
    async fn commit(mut self) -> Result<(), CrudError> {
        self.session
            .commit_transaction()
            .await
            .map_err(map_mongo_error)
    }

    async fn abort(mut self) -> Result<(), CrudError> {
        self.session
            .abort_transaction()
            .await
            .map_err(map_mongo_error)
    }
}

#[async_trait]
impl TransactionHandler for MongoStore {
    type Handle = MongoTransaction;

    async fn start(&self) -> Result<MongoTransaction, CrudError> {
        let mut session = self
            .client
            .start_session(None)
            .await
            .map_err(|e| CrudError::TransactionStart(e.to_string()))?;
        session
            .start_transaction(None)
            .await
            .map_err(|e| CrudError::TransactionStart(e.to_string()))?;
        Ok(MongoTransaction { session })
    }
}

pub struct MongoProvider<E: Send + Sync> {
    collection: Collection<E>,
}

impl<E: IdEntry> MongoProvider<E> {
    pub fn new(collection: Collection<E>) -> Self {
        Self { collection }
    }
}

#[async_trait]
impl<E: IdEntry> Provider for MongoProvider<E> {
    type Entry = E;
    type Handle = MongoTransaction;

    async fn create(&self, tx: &mut MongoTransaction, entry: E) -> Result<E, CrudError> {
        self.collection
            .insert_one_with_session(&entry, None, &mut tx.session)
            .await
            .map_err(|e| match map_mongo_error(e) {
                CrudError::Conflict(_) => CrudError::conflict(E::KIND, entry.id()),
                other => other,
            })?;
        Ok(entry)
    }

    async fn read(&self, tx: &mut MongoTransaction) -> Result<Vec<E>, CrudError> {
        let mut cursor = self
            .collection
            .find_with_session(None, None, &mut tx.session)
            .await
            .map_err(map_mongo_error)?;
        cursor
            .stream(&mut tx.session)
            .try_collect()
            .await
            .map_err(map_mongo_error)
    }

    async fn read_by_id(&self, tx: &mut MongoTransaction, id: &str) -> Result<E, CrudError> {
        self.collection
            .find_one_with_session(doc! { ID_FIELD: id }, None, &mut tx.session)
            .await
            .map_err(map_mongo_error)?
            .ok_or_else(|| CrudError::not_found(E::KIND, id))
    }

    async fn update(&self, tx: &mut MongoTransaction, entry: E) -> Result<E, CrudError> {
        let result = self
            .collection
            .replace_one_with_session(doc! { ID_FIELD: entry.id() }, &entry, None, &mut tx.session)
            .await
            .map_err(map_mongo_error)?;
        if result.matched_count == 0 {
            return Err(CrudError::not_found(E::KIND, entry.id()));
        }
        Ok(entry)
    }

    async fn delete(&self, tx: &mut MongoTransaction, id: &str) -> Result<(), CrudError> {
        let result = self
            .collection
            .delete_one_with_session(doc! { ID_FIELD: id }, None, &mut tx.session)
            .await
            .map_err(map_mongo_error)?;
        if result.deleted_count == 0 {
            return Err(CrudError::not_found(E::KIND, id));
        }
        Ok(())
    }
}

pub struct MongoUserBoundProvider<E: Send + Sync> {
    collection: Collection<E>,
}

impl<E: UserBoundEntry> MongoUserBoundProvider<E> {
    pub fn new(collection: Collection<E>) -> Self {
        Self { collection }
    }

    fn owned_filter(user_id: &str, id: &str) -> Document {
        let mut filter = doc! { ID_FIELD: id };
        filter.insert(E::USER_ID_FIELD, user_id);
        filter
    }
}

#[async_trait]
impl<E: UserBoundEntry> UserBoundProvider for MongoUserBoundProvider<E> {
    type Entry = E;
    type Handle = MongoTransaction;

    async fn create(&self, tx: &mut MongoTransaction, user_id: &str, entry: E) -> Result<E, CrudError> {
        if entry.user_id() != user_id {
            return Err(CrudError::BadRequest(format!(
                "{} must be owned by the caller",
                E::KIND
            )));
        }
        self.collection
            .insert_one_with_session(&entry, None, &mut tx.session)
            .await
            .map_err(|e| match map_mongo_error(e) {
                CrudError::Conflict(_) => CrudError::conflict(E::KIND, entry.id()),
                other => other,
            })?;
        Ok(entry)
    }

    async fn read(&self, tx: &mut MongoTransaction, user_id: &str) -> Result<Vec<E>, CrudError> {
        let mut filter = Document::new();
        filter.insert(E::USER_ID_FIELD, user_id);
        let mut cursor = self
            .collection
            .find_with_session(filter, None, &mut tx.session)
            .await
            .map_err(map_mongo_error)?;
        cursor
            .stream(&mut tx.session)
            .try_collect()
            .await
            .map_err(map_mongo_error)
    }

    async fn read_by_id(&self, tx: &mut MongoTransaction, user_id: &str, id: &str) -> Result<E, CrudError> {
        self.collection
            .find_one_with_session(Self::owned_filter(user_id, id), None, &mut tx.session)
            .await
            .map_err(map_mongo_error)?
            .ok_or_else(|| CrudError::not_found(E::KIND, id))
    }

    async fn update(&self, tx: &mut MongoTransaction, user_id: &str, entry: E) -> Result<E, CrudError> {
        if entry.user_id() != user_id {
            return Err(CrudError::BadRequest(format!(
                "{} owner cannot be changed",
                E::KIND
            )));
        }
        let result = self
            .collection
            .replace_one_with_session(
                Self::owned_filter(user_id, entry.id()),
                &entry,
                None,
                &mut tx.session,
            )
            .await
            .map_err(map_mongo_error)?;
        if result.matched_count == 0 {
            return Err(CrudError::not_found(E::KIND, entry.id()));
        }
        Ok(entry)
    }

    async fn delete(&self, tx: &mut MongoTransaction, user_id: &str, id: &str) -> Result<(), CrudError> {
        let result = self
            .collection
            .delete_one_with_session(Self::owned_filter(user_id, id), None, &mut tx.session)
            .await
            .map_err(map_mongo_error)?;
        if result.deleted_count == 0 {
            return Err(CrudError::not_found(E::KIND, id));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MongoStore {
    type Transactions = MongoStore;
    type EntryProvider<E: IdEntry> = MongoProvider<E>;
    type UserBoundEntryProvider<E: UserBoundEntry> = MongoUserBoundProvider<E>;

    fn transactions(&self) -> MongoStore {
        self.clone()
    }

    fn provider<E: IdEntry>(&self, collection: &str) -> MongoProvider<E> {
        MongoProvider::new(self.db.collection(collection))
    }

    fn user_bound_provider<E: UserBoundEntry>(&self, collection: &str) -> MongoUserBoundProvider<E> {
        MongoUserBoundProvider::new(self.db.collection(collection))
    }

    async fn initialize(&self, collections: &[String]) -> Result<(), CrudError> {
        tracing::info!("Creating MongoDB indexes");

        for name in collections {
            let id_index = IndexModel::builder()
                .keys(doc! { ID_FIELD: 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("id_unique".to_string())
                        .build(),
                )
                .build();

            self.db
                .collection::<Document>(name)
                .create_index(id_index, None)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create id index on {}: {}", name, e);
                    map_mongo_error(e)
                })?;
            tracing::info!("Created unique index on {}.{}", name, ID_FIELD);
        }

        Ok(())
    }

    async fn ping(&self) -> Result<(), CrudError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                map_mongo_error(e)
            })?;
        Ok(())
    }
}
