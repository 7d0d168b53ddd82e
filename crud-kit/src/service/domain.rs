use super::atomic::{AtomicService, UserBoundAtomicService};
use crate::entry::{IdEntry, UserBoundEntry};
use crate::error::CrudError;
use crate::provider::{Provider, UserBoundProvider};
use crate::transaction::{run_atomically, TransactionHandler};
use crate::transformer::{Transformer, UserBoundTransformer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Transaction-owning CRUD service: every call is one transaction.
pub struct DomainService<P, T, H> {
    atomic: Arc<AtomicService<P, T>>,
    transactions: Arc<H>,
}

impl<P, T, H> Clone for DomainService<P, T, H> {
    fn clone(&self) -> Self {
        Self {
            atomic: Arc::clone(&self.atomic),
            transactions: Arc::clone(&self.transactions),
        }
    }
}

impl<P, T, H> DomainService<P, T, H>
where
    P: Provider,
    T: Transformer<Entry = P::Entry>,
    H: TransactionHandler<Handle = P::Handle>,
{
    pub fn new(provider: Arc<P>, transformer: Arc<T>, transactions: Arc<H>) -> Self {
        Self {
            atomic: Arc::new(AtomicService::new(provider, transformer)),
            transactions,
        }
    }

    pub fn transformer(&self) -> &T {
        self.atomic.transformer()
    }

    pub async fn create(&self, create: T::Create, cancel: CancellationToken) -> Result<P::Entry, CrudError> {
        let atomic = Arc::clone(&self.atomic);
        let entry = run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move { atomic.create(tx, create).await })
        })
        .await?;

        tracing::info!(kind = <P::Entry as IdEntry>::KIND, entry_id = %entry.id(), "Entry created");
        Ok(entry)
    }

    pub async fn read(&self, cancel: CancellationToken) -> Result<Vec<P::Entry>, CrudError> {
        let atomic = Arc::clone(&self.atomic);
        run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move { atomic.read(tx).await })
        })
        .await
    }

    pub async fn read_by_id(&self, id: String, cancel: CancellationToken) -> Result<P::Entry, CrudError> {
        let atomic = Arc::clone(&self.atomic);
        run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move { atomic.read_by_id(tx, &id).await })
        })
        .await
    }

    pub async fn update(
        &self,
        id: String,
        update: T::Update,
        cancel: CancellationToken,
    ) -> Result<P::Entry, CrudError> {
        let atomic = Arc::clone(&self.atomic);
        let entry = run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move { atomic.update(tx, &id, update).await })
        })
        .await?;

        tracing::info!(kind = <P::Entry as IdEntry>::KIND, entry_id = %entry.id(), "Entry updated");
        Ok(entry)
    }

    pub async fn delete(&self, id: String, cancel: CancellationToken) -> Result<(), CrudError> {
        let atomic = Arc::clone(&self.atomic);
        let entry_id = id.clone();
        run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move { atomic.delete(tx, &id).await })
        })
        .await?;

        tracing::info!(kind = <P::Entry as IdEntry>::KIND, entry_id = %entry_id, "Entry deleted");
        Ok(())
    }
}

/// Owner-scoped domain service.
pub struct UserBoundDomainService<P, T, H> {
    atomic: Arc<UserBoundAtomicService<P, T>>,
    transactions: Arc<H>,
}

impl<P, T, H> Clone for UserBoundDomainService<P, T, H> {
    fn clone(&self) -> Self {
        Self {
            atomic: Arc::clone(&self.atomic),
            transactions: Arc::clone(&self.transactions),
        }
    }
}

impl<P, T, H> UserBoundDomainService<P, T, H>
where
    P: UserBoundProvider,
    T: UserBoundTransformer<Entry = P::Entry>,
    H: TransactionHandler<Handle = P::Handle>,
{
    pub fn new(provider: Arc<P>, transformer: Arc<T>, transactions: Arc<H>) -> Self {
        Self {
            atomic: Arc::new(UserBoundAtomicService::new(provider, transformer)),
            transactions,
        }
    }

    pub fn transformer(&self) -> &T {
        self.atomic.transformer()
    }

    pub async fn create(
        &self,
        user_id: String,
        create: T::Create,
        cancel: CancellationToken,
    ) -> Result<P::Entry, CrudError> {
        let atomic = Arc::clone(&self.atomic);
        let entry = run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move { atomic.create(tx, &user_id, create).await })
        })
        .await?;

        tracing::info!(
            kind = <P::Entry as IdEntry>::KIND,
            entry_id = %entry.id(),
            user_id = %entry.user_id(),
            "Entry created"
        );
        Ok(entry)
    }

    pub async fn read(&self, user_id: String, cancel: CancellationToken) -> Result<Vec<P::Entry>, CrudError> {
        let atomic = Arc::clone(&self.atomic);
        run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move { atomic.read(tx, &user_id).await })
        })
        .await
    }

    pub async fn read_by_id(
        &self,
        user_id: String,
        id: String,
        cancel: CancellationToken,
    ) -> Result<P::Entry, CrudError> {
        let atomic = Arc::clone(&self.atomic);
        run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move { atomic.read_by_id(tx, &user_id, &id).await })
        })
        .await
    }

    pub async fn update(
        &self,
        user_id: String,
        id: String,
        update: T::Update,
        cancel: CancellationToken,
    ) -> Result<P::Entry, CrudError> {
        let atomic = Arc::clone(&self.atomic);
        let entry = run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move { atomic.update(tx, &user_id, &id, update).await })
        })
        .await?;

        tracing::info!(
            kind = <P::Entry as IdEntry>::KIND,
            entry_id = %entry.id(),
            user_id = %entry.user_id(),
            "Entry updated"
        );
        Ok(entry)
    }

    pub async fn delete(&self, user_id: String, id: String, cancel: CancellationToken) -> Result<(), CrudError> {
        let atomic = Arc::clone(&self.atomic);
        let (owner, entry_id) = (user_id.clone(), id.clone());
        run_atomically(Arc::clone(&self.transactions), cancel, move |tx| {
            Box::pin(async move { atomic.delete(tx, &user_id, &id).await })
        })
        .await?;

        tracing::info!(
            kind = <P::Entry as IdEntry>::KIND,
            entry_id = %entry_id,
            user_id = %owner,
            "Entry deleted"
        );
        Ok(())
    }
}
