//! crud-kit: a generic, transactional CRUD pipeline for axum services.
//!
//! Requests flow `controller -> DomainService -> AtomicService -> Provider`.
//! The domain layer owns the transaction boundary; providers only ever see a
//! transaction handle. Responses are wrapped in [`links::LinkResult`] so
//! clients discover the operations their claims allow.
pub mod auth;
pub mod claims;
pub mod controller;
pub mod entry;
pub mod error;
pub mod health;
pub mod links;
pub mod provider;
pub mod service;
pub mod store;
pub mod transaction;
pub mod transformer;

pub use claims::{Claim, Claims, Role};
pub use entry::{IdEntry, UserBoundEntry};
pub use error::CrudError;
pub use links::{ClaimLink, Link, LinkResult, Operation};
pub use provider::{Provider, Store, UserBoundProvider};
pub use transaction::{run_atomically, TransactionHandle, TransactionHandler};
pub use transformer::{Transformer, UserBoundTransformer};

pub use tokio_util::sync::CancellationToken;
