use crate::entry::{IdEntry, UserBoundEntry};
use crate::error::CrudError;
use crate::provider::{Provider, UserBoundProvider};
use crate::transformer::{Transformer, UserBoundTransformer};
use std::sync::Arc;

/// CRUD orchestration inside a transaction someone else owns.
pub struct AtomicService<P, T> {
    provider: Arc<P>,
    transformer: Arc<T>,
}

impl<P, T> AtomicService<P, T>
where
    P: Provider,
    T: Transformer<Entry = P::Entry>,
{
    pub fn new(provider: Arc<P>, transformer: Arc<T>) -> Self {
        Self {
            provider,
            transformer,
        }
    }

    pub fn transformer(&self) -> &T {
        &self.transformer
    }

    pub async fn create(&self, tx: &mut P::Handle, create: T::Create) -> Result<P::Entry, CrudError> {
        let entry = self.transformer.create_entry(create)?;
        if entry.id().is_empty() {
            return Err(CrudError::BadRequest(format!(
                "{} id must not be empty",
                <P::Entry as IdEntry>::KIND
            )));
        }
        self.provider.create(tx, entry).await
    }

    pub async fn read(&self, tx: &mut P::Handle) -> Result<Vec<P::Entry>, CrudError> {
        self.provider.read(tx).await
    }

    pub async fn read_by_id(&self, tx: &mut P::Handle, id: &str) -> Result<P::Entry, CrudError> {
        self.provider.read_by_id(tx, id).await
    }

    pub async fn update(
        &self,
        tx: &mut P::Handle,
        id: &str,
        update: T::Update,
    ) -> Result<P::Entry, CrudError> {
        let existing = self.provider.read_by_id(tx, id).await?;
        let entry = self.transformer.update_entry(existing, update)?;
        if entry.id() != id {
            return Err(CrudError::BadRequest(format!(
                "{} id cannot be changed",
                <P::Entry as IdEntry>::KIND
            )));
        }
        self.provider.update(tx, entry).await
    }

    pub async fn delete(&self, tx: &mut P::Handle, id: &str) -> Result<(), CrudError> {
        self.provider.delete(tx, id).await
    }
}

/// Owner-scoped variant: the caller's user id is threaded into every call.
pub struct UserBoundAtomicService<P, T> {
    provider: Arc<P>,
    transformer: Arc<T>,
}

impl<P, T> UserBoundAtomicService<P, T>
where
    P: UserBoundProvider,
    T: UserBoundTransformer<Entry = P::Entry>,
{
    pub fn new(provider: Arc<P>, transformer: Arc<T>) -> Self {
        Self {
            provider,
            transformer,
        }
    }

    pub fn transformer(&self) -> &T {
        &self.transformer
    }

    pub async fn create(
        &self,
        tx: &mut P::Handle,
        user_id: &str,
        create: T::Create,
    ) -> Result<P::Entry, CrudError> {
        let entry = self.transformer.create_entry(user_id, create)?;
        if entry.id().is_empty() {
            return Err(CrudError::BadRequest(format!(
                "{} id must not be empty",
                <P::Entry as IdEntry>::KIND
            )));
        }
        if entry.user_id() != user_id {
            return Err(CrudError::BadRequest(format!(
                "{} must be owned by the caller",
                <P::Entry as IdEntry>::KIND
            )));
        }
        self.provider.create(tx, user_id, entry).await
    }

    pub async fn read(&self, tx: &mut P::Handle, user_id: &str) -> Result<Vec<P::Entry>, CrudError> {
        self.provider.read(tx, user_id).await
    }

    pub async fn read_by_id(
        &self,
        tx: &mut P::Handle,
        user_id: &str,
        id: &str,
    ) -> Result<P::Entry, CrudError> {
        self.provider.read_by_id(tx, user_id, id).await
    }

    pub async fn update(
        &self,
        tx: &mut P::Handle,
        user_id: &str,
        id: &str,
        update: T::Update,
    ) -> Result<P::Entry, CrudError> {
        let existing = self.provider.read_by_id(tx, user_id, id).await?;
        let entry = self.transformer.update_entry(existing, update)?;
        if entry.id() != id || entry.user_id() != user_id {
            return Err(CrudError::BadRequest(format!(
                "{} id and owner cannot be changed",
                <P::Entry as IdEntry>::KIND
            )));
        }
        self.provider.update(tx, user_id, entry).await
    }

    pub async fn delete(&self, tx: &mut P::Handle, user_id: &str, id: &str) -> Result<(), CrudError> {
        self.provider.delete(tx, user_id, id).await
    }
}
