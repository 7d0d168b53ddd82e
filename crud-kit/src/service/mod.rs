mod atomic;
mod domain;

pub use atomic::{AtomicService, UserBoundAtomicService};
pub use domain::{DomainService, UserBoundDomainService};
