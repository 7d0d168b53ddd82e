//! Conversions between request bodies, stored entries and response bodies.

use crate::entry::{IdEntry, UserBoundEntry};
use crate::error::CrudError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use validator::Validate;

pub trait Transformer: Send + Sync + 'static {
    type Create: DeserializeOwned + Validate + Send + 'static;
    type Update: DeserializeOwned + Validate + Send + 'static;
    type Entry: IdEntry;
    type Result: Serialize + Send + 'static;

    /// Builds a new entry, assigning its id.
    fn create_entry(&self, create: Self::Create) -> Result<Self::Entry, CrudError>;

    /// Builds the replacement for `existing`; the id must be kept.
    fn update_entry(&self, existing: Self::Entry, update: Self::Update) -> Result<Self::Entry, CrudError>;

    fn to_result(&self, entry: Self::Entry) -> Self::Result;
}

pub trait UserBoundTransformer: Send + Sync + 'static {
    type Create: DeserializeOwned + Validate + Send + 'static;
    type Update: DeserializeOwned + Validate + Send + 'static;
    type Entry: UserBoundEntry;
    type Result: Serialize + Send + 'static;

    /// Builds a new entry owned by `user_id`.
    fn create_entry(&self, user_id: &str, create: Self::Create) -> Result<Self::Entry, CrudError>;

    /// Builds the replacement for `existing`; id and owner must be kept.
    fn update_entry(&self, existing: Self::Entry, update: Self::Update) -> Result<Self::Entry, CrudError>;

    fn to_result(&self, entry: Self::Entry) -> Self::Result;
}
