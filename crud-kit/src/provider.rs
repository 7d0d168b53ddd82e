//! Persistence adapters. Providers never start or finish transactions; they
//! only act through the handle they are given.

use crate::entry::{IdEntry, UserBoundEntry};
use crate::error::CrudError;
use crate::transaction::{TransactionHandle, TransactionHandler};
use async_trait::async_trait;

/// CRUD primitives for one entry type.
///
/// `create` fails with `Conflict` when the id is taken; lookups, updates and
/// deletes of a missing id fail with `NotFound`.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    type Entry: IdEntry;
    type Handle: TransactionHandle;

    async fn create(&self, tx: &mut Self::Handle, entry: Self::Entry) -> Result<Self::Entry, CrudError>;

    async fn read(&self, tx: &mut Self::Handle) -> Result<Vec<Self::Entry>, CrudError>;

    async fn read_by_id(&self, tx: &mut Self::Handle, id: &str) -> Result<Self::Entry, CrudError>;

    async fn update(&self, tx: &mut Self::Handle, entry: Self::Entry) -> Result<Self::Entry, CrudError>;

    async fn delete(&self, tx: &mut Self::Handle, id: &str) -> Result<(), CrudError>;
}

/// CRUD primitives scoped by owner.
///
/// An entry owned by someone else is indistinguishable from a missing one:
/// both fail with `NotFound`.
#[async_trait]
pub trait UserBoundProvider: Send + Sync + 'static {
    type Entry: UserBoundEntry;
    type Handle: TransactionHandle;

    async fn create(
        &self,
        tx: &mut Self::Handle,
        user_id: &str,
        entry: Self::Entry,
    ) -> Result<Self::Entry, CrudError>;

    async fn read(&self, tx: &mut Self::Handle, user_id: &str) -> Result<Vec<Self::Entry>, CrudError>;

    async fn read_by_id(
        &self,
        tx: &mut Self::Handle,
        user_id: &str,
        id: &str,
    ) -> Result<Self::Entry, CrudError>;

    async fn update(
        &self,
        tx: &mut Self::Handle,
        user_id: &str,
        entry: Self::Entry,
    ) -> Result<Self::Entry, CrudError>;

    async fn delete(&self, tx: &mut Self::Handle, user_id: &str, id: &str) -> Result<(), CrudError>;
}

pub type HandleOf<S> = <<S as Store>::Transactions as TransactionHandler>::Handle;

/// A backing store able to hand out providers for any entry type, all
/// sharing one transaction handler.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Transactions: TransactionHandler;

    type EntryProvider<E: IdEntry>: Provider<
            Entry = E,
            Handle = <Self::Transactions as TransactionHandler>::Handle,
        >;

    type UserBoundEntryProvider<E: UserBoundEntry>: UserBoundProvider<
            Entry = E,
            Handle = <Self::Transactions as TransactionHandler>::Handle,
        >;

    fn transactions(&self) -> Self::Transactions;

    fn provider<E: IdEntry>(&self, collection: &str) -> Self::EntryProvider<E>;

    fn user_bound_provider<E: UserBoundEntry>(&self, collection: &str) -> Self::UserBoundEntryProvider<E>;

    /// Prepares collections (indexes, schema) before serving traffic.
    async fn initialize(&self, _collections: &[String]) -> Result<(), CrudError> {
        Ok(())
    }

    /// Cheap liveness probe for health checks.
    async fn ping(&self) -> Result<(), CrudError>;
}
