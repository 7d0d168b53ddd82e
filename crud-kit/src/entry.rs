use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// A persisted value addressed by a string id.
pub trait IdEntry: Clone + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Stored name of the entry kind, used in error messages and as a default collection name.
    const KIND: &'static str;

    fn id(&self) -> &str;
}

/// An entry owned by one user; every lookup is scoped by the owner id.
pub trait UserBoundEntry: IdEntry {
    /// Serialized field name holding the owner id.
    const USER_ID_FIELD: &'static str = "userId";

    fn user_id(&self) -> &str;
}

pub fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}
