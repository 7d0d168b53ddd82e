//! In-process store with real transaction semantics.
//!
//! Writes are staged on the transaction and applied in one step on commit.
//! Uncommitted writes are visible only through their own transaction.

use crate::entry::{IdEntry, UserBoundEntry};
use crate::error::CrudError;
use crate::provider::{Provider, Store, UserBoundProvider};
use crate::transaction::{TransactionHandle, TransactionHandler};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

type Collection = BTreeMap<String, Value>;

struct MemoryInner {
    collections: RwLock<HashMap<String, Collection>>,
    available: AtomicBool,
    commits: AtomicU64,
    aborts: AtomicU64,
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                collections: RwLock::new(HashMap::new()),
                available: AtomicBool::new(true),
                commits: AtomicU64::new(0),
                aborts: AtomicU64::new(0),
            }),
        }
    }

    /// Simulates an outage: new transactions fail to start while unavailable.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    pub fn commits(&self) -> u64 {
        self.inner.commits.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> u64 {
        self.inner.aborts.load(Ordering::SeqCst)
    }

    /// Committed entries of a collection, outside any transaction.
    pub fn committed<E: DeserializeOwned>(&self, collection: &str) -> Result<Vec<E>, CrudError> {
        let collections = self.inner.read()?;
        collections
            .get(collection)
            .map(|entries| {
                entries
                    .values()
                    .map(|value| serde_json::from_value(value.clone()).map_err(CrudError::from))
                    .collect()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

impl MemoryInner {
    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Collection>>, CrudError> {
        self.collections
            .read()
            .map_err(|_| CrudError::Internal(anyhow::anyhow!("memory store lock poisoned")))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Collection>>, CrudError> {
        self.collections
            .write()
            .map_err(|_| CrudError::Internal(anyhow::anyhow!("memory store lock poisoned")))
    }
}

#[derive(Debug, Clone)]
enum Write {
    Insert(Value),
    Replace(Value),
    Delete,
}

pub struct MemoryTransaction {
    inner: Arc<MemoryInner>,
    writes: HashMap<String, BTreeMap<String, Write>>,
}

impl MemoryTransaction {
    fn ensure_same_store(&self, store: &MemoryStore) -> Result<(), CrudError> {
        if Arc::ptr_eq(&self.inner, &store.inner) {
            Ok(())
        } else {
            Err(CrudError::Internal(anyhow::anyhow!(
                "transaction belongs to a different memory store"
            )))
        }
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, CrudError> {
        if let Some(write) = self.writes.get(collection).and_then(|w| w.get(id)) {
            return Ok(match write {
                Write::Insert(value) | Write::Replace(value) => Some(value.clone()),
                Write::Delete => None,
            });
        }

        let collections = self.inner.read()?;
        Ok(collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    fn list(&self, collection: &str) -> Result<Vec<Value>, CrudError> {
        let mut merged = {
            let collections = self.inner.read()?;
            collections.get(collection).cloned().unwrap_or_default()
        };

        if let Some(writes) = self.writes.get(collection) {
            for (id, write) in writes {
                match write {
                    Write::Insert(value) | Write::Replace(value) => {
                        merged.insert(id.clone(), value.clone());
                    }
                    Write::Delete => {
                        merged.remove(id);
                    }
                }
            }
        }

        Ok(merged.into_values().collect())
    }

    fn stage(&mut self, collection: &str, id: &str, write: Write) {
        let staged = self.writes.entry(collection.to_string()).or_default();
        let merged = match (staged.remove(id), write) {
            // Inserted and removed within this transaction: nothing to apply.
            (Some(Write::Insert(_)), Write::Delete) => return,
            (Some(Write::Insert(_)), Write::Replace(value)) => Write::Insert(value),
            (Some(Write::Delete), Write::Insert(value)) => Write::Replace(value),
            (_, write) => write,
        };
        staged.insert(id.to_string(), merged);
    }

    fn load<E: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<E>, CrudError> {
        self.get(collection, id)?
            .map(|value| serde_json::from_value(value).map_err(CrudError::from))
            .transpose()
    }

    fn load_all<E: DeserializeOwned>(&self, collection: &str) -> Result<Vec<E>, CrudError> {
        self.list(collection)?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(CrudError::from))
            .collect()
    }

    fn insert<E: IdEntry + Serialize>(&mut self, collection: &str, entry: &E) -> Result<(), CrudError> {
        if self.get(collection, entry.id())?.is_some() {
            return Err(CrudError::conflict(E::KIND, entry.id()));
        }
        let value = serde_json::to_value(entry)?;
        self.stage(collection, entry.id(), Write::Insert(value));
        Ok(())
    }

    fn replace<E: IdEntry + Serialize>(&mut self, collection: &str, entry: &E) -> Result<(), CrudError> {
        if self.get(collection, entry.id())?.is_none() {
            return Err(CrudError::not_found(E::KIND, entry.id()));
        }
        let value = serde_json::to_value(entry)?;
        self.stage(collection, entry.id(), Write::Replace(value));
        Ok(())
    }

    fn remove<E: IdEntry>(&mut self, collection: &str, id: &str) -> Result<(), CrudError> {
        if self.get(collection, id)?.is_none() {
            return Err(CrudError::not_found(E::KIND, id));
        }
        self.stage(collection, id, Write::Delete);
        Ok(())
    }

    fn apply(inner: &MemoryInner, writes: HashMap<String, BTreeMap<String, Write>>) -> Result<(), CrudError> {
        let mut collections = inner.write()?;

        // Validate everything before touching anything so a failed commit leaves no trace.
        for (name, staged) in &writes {
            let committed = collections.get(name);
            for (id, write) in staged {
                let exists = committed.is_some_and(|c| c.contains_key(id));
                match write {
                    Write::Insert(_) if exists => {
                        return Err(CrudError::Conflict(format!(
                            "Entry '{}' in '{}' was created concurrently",
                            id, name
                        )));
                    }
                    Write::Replace(_) | Write::Delete if !exists => {
                        return Err(CrudError::Conflict(format!(
                            "Entry '{}' in '{}' was deleted concurrently",
                            id, name
                        )));
                    }
                    _ => {}
                }
            }
        }

        for (name, staged) in writes {
            let collection = collections.entry(name).or_default();
            for (id, write) in staged {
                match write {
                    Write::Insert(value) | Write::Replace(value) => {
                        collection.insert(id, value);
                    }
                    Write::Delete => {
                        collection.remove(&id);
                    }
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TransactionHandle for MemoryTransaction {
    async fn commit(self) -> Result<(), CrudError> {
        let MemoryTransaction { inner, writes } = self;
        let applied = Self::apply(&inner, writes);
        match applied {
            Ok(()) => inner.commits.fetch_add(1, Ordering::SeqCst),
            Err(_) => inner.aborts.fetch_add(1, Ordering::SeqCst),
        };
        applied
    }

    async fn abort(self) -> Result<(), CrudError> {
        self.inner.aborts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl TransactionHandler for MemoryStore {
    type Handle = MemoryTransaction;

    async fn start(&self) -> Result<MemoryTransaction, CrudError> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(CrudError::TransactionStart(
                "memory store is unavailable".to_string(),
            ));
        }

        Ok(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            writes: HashMap::new(),
        })
    }
}

pub struct MemoryProvider<E> {
    store: MemoryStore,
    collection: String,
    _entry: PhantomData<fn() -> E>,
}

impl<E> MemoryProvider<E> {
    pub fn new(store: MemoryStore, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            _entry: PhantomData,
        }
    }
}

#[async_trait]
impl<E: IdEntry> Provider for MemoryProvider<E> {
    type Entry = E;
    type Handle = MemoryTransaction;

    async fn create(&self, tx: &mut MemoryTransaction, entry: E) -> Result<E, CrudError> {
        tx.ensure_same_store(&self.store)?;
        tx.insert(&self.collection, &entry)?;
        Ok(entry)
    }

    async fn read(&self, tx: &mut MemoryTransaction) -> Result<Vec<E>, CrudError> {
        tx.ensure_same_store(&self.store)?;
        tx.load_all(&self.collection)
    }

    async fn read_by_id(&self, tx: &mut MemoryTransaction, id: &str) -> Result<E, CrudError> {
        tx.ensure_same_store(&self.store)?;
        tx.load(&self.collection, id)?
            .ok_or_else(|| CrudError::not_found(E::KIND, id))
    }

    async fn update(&self, tx: &mut MemoryTransaction, entry: E) -> Result<E, CrudError> {
        tx.ensure_same_store(&self.store)?;
        tx.replace(&self.collection, &entry)?;
        Ok(entry)
    }

    async fn delete(&self, tx: &mut MemoryTransaction, id: &str) -> Result<(), CrudError> {
        tx.ensure_same_store(&self.store)?;
        tx.remove::<E>(&self.collection, id)
    }
}

pub struct MemoryUserBoundProvider<E> {
    store: MemoryStore,
    collection: String,
    _entry: PhantomData<fn() -> E>,
}

impl<E> MemoryUserBoundProvider<E> {
    pub fn new(store: MemoryStore, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            _entry: PhantomData,
        }
    }
}

impl<E: UserBoundEntry> MemoryUserBoundProvider<E> {
    fn owned(&self, tx: &MemoryTransaction, user_id: &str, id: &str) -> Result<E, CrudError> {
        tx.load::<E>(&self.collection, id)?
            .filter(|entry| entry.user_id() == user_id)
            .ok_or_else(|| CrudError::not_found(E::KIND, id))
    }
}

#[async_trait]
impl<E: UserBoundEntry> UserBoundProvider for MemoryUserBoundProvider<E> {
    type Entry = E;
    type Handle = MemoryTransaction;

    async fn create(&self, tx: &mut MemoryTransaction, user_id: &str, entry: E) -> Result<E, CrudError> {
        tx.ensure_same_store(&self.store)?;
        if entry.user_id() != user_id {
            return Err(CrudError::BadRequest(format!(
                "{} must be owned by the caller",
                E::KIND
            )));
        }
        tx.insert(&self.collection, &entry)?;
        Ok(entry)
    }

    async fn read(&self, tx: &mut MemoryTransaction, user_id: &str) -> Result<Vec<E>, CrudError> {
        tx.ensure_same_store(&self.store)?;
        let entries: Vec<E> = tx.load_all(&self.collection)?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.user_id() == user_id)
            .collect())
    }

    async fn read_by_id(&self, tx: &mut MemoryTransaction, user_id: &str, id: &str) -> Result<E, CrudError> {
        tx.ensure_same_store(&self.store)?;
        self.owned(tx, user_id, id)
    }

    async fn update(&self, tx: &mut MemoryTransaction, user_id: &str, entry: E) -> Result<E, CrudError> {
        tx.ensure_same_store(&self.store)?;
        self.owned(tx, user_id, entry.id())?;
        if entry.user_id() != user_id {
            return Err(CrudError::BadRequest(format!(
                "{} owner cannot be changed",
                E::KIND
            )));
        }
        tx.replace(&self.collection, &entry)?;
        Ok(entry)
    }

    async fn delete(&self, tx: &mut MemoryTransaction, user_id: &str, id: &str) -> Result<(), CrudError> {
        tx.ensure_same_store(&self.store)?;
        self.owned(tx, user_id, id)?;
        tx.remove::<E>(&self.collection, id)
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Transactions = MemoryStore;
    type EntryProvider<E: IdEntry> = MemoryProvider<E>;
    type UserBoundEntryProvider<E: UserBoundEntry> = MemoryUserBoundProvider<E>;

    fn transactions(&self) -> MemoryStore {
        self.clone()
    }

    fn provider<E: IdEntry>(&self, collection: &str) -> MemoryProvider<E> {
        MemoryProvider::new(self.clone(), collection)
    }

    fn user_bound_provider<E: UserBoundEntry>(&self, collection: &str) -> MemoryUserBoundProvider<E> {
        MemoryUserBoundProvider::new(self.clone(), collection)
    }

    async fn ping(&self) -> Result<(), CrudError> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CrudError::TransactionStart(
                "memory store is unavailable".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: String,
        size: u32,
    }

    impl IdEntry for Widget {
        const KIND: &'static str = "Widget";

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn widget(id: &str, size: u32) -> Widget {
        Widget {
            id: id.to_string(),
            size,
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_staged_writes() -> Result<(), CrudError> {
        let store = MemoryStore::new();
        let provider: MemoryProvider<Widget> = store.provider("widgets");

        let mut tx = store.start().await?;
        provider.create(&mut tx, widget("w1", 3)).await?;
        assert_eq!(provider.read_by_id(&mut tx, "w1").await?, widget("w1", 3));
        assert!(store.committed::<Widget>("widgets")?.is_empty());

        tx.commit().await?;
        assert_eq!(store.committed::<Widget>("widgets")?, vec![widget("w1", 3)]);
        assert_eq!(store.commits(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_abort_discards_staged_writes() -> Result<(), CrudError> {
        let store = MemoryStore::new();
        let provider: MemoryProvider<Widget> = store.provider("widgets");

        let mut tx = store.start().await?;
        provider.create(&mut tx, widget("w1", 3)).await?;
        tx.abort().await?;

        let mut tx = store.start().await?;
        let err = provider.read_by_id(&mut tx, "w1").await.expect_err("aborted write");
        assert!(matches!(err, CrudError::NotFound(_)));
        assert_eq!(store.aborts(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() -> Result<(), CrudError> {
        let store = MemoryStore::new();
        let provider: MemoryProvider<Widget> = store.provider("widgets");

        let mut tx = store.start().await?;
        provider.create(&mut tx, widget("w1", 1)).await?;
        let err = provider.create(&mut tx, widget("w1", 2)).await.expect_err("duplicate");
        assert!(matches!(err, CrudError::Conflict(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_insert_conflicts_at_commit() -> Result<(), CrudError> {
        let store = MemoryStore::new();
        let provider: MemoryProvider<Widget> = store.provider("widgets");

        let mut first = store.start().await?;
        let mut second = store.start().await?;
        provider.create(&mut first, widget("w1", 1)).await?;
        provider.create(&mut second, widget("w1", 2)).await?;

        first.commit().await?;
        let err = second.commit().await.expect_err("second insert loses");
        assert!(matches!(err, CrudError::Conflict(_)));
        assert_eq!(store.committed::<Widget>("widgets")?, vec![widget("w1", 1)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_then_reinsert_in_one_transaction() -> Result<(), CrudError> {
        let store = MemoryStore::new();
        let provider: MemoryProvider<Widget> = store.provider("widgets");

        let mut tx = store.start().await?;
        provider.create(&mut tx, widget("w1", 1)).await?;
        tx.commit().await?;

        let mut tx = store.start().await?;
        provider.delete(&mut tx, "w1").await?;
        assert!(provider.read(&mut tx).await?.is_empty());
        provider.create(&mut tx, widget("w1", 9)).await?;
        tx.commit().await?;

        assert_eq!(store.committed::<Widget>("widgets")?, vec![widget("w1", 9)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unavailable_store_refuses_to_start() {
        let store = MemoryStore::new();
        store.set_available(false);

        assert!(matches!(store.start().await, Err(CrudError::TransactionStart(_))));
        assert!(store.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_foreign_transaction_is_rejected() -> Result<(), CrudError> {
        let store = MemoryStore::new();
        let other = MemoryStore::new();
        let provider: MemoryProvider<Widget> = store.provider("widgets");

        let mut tx = other.start().await?;
        let err = provider.read(&mut tx).await.expect_err("wrong store");
        assert!(matches!(err, CrudError::Internal(_)));
        Ok(())
    }
}
