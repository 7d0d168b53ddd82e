//! HTTP entry points. Each controller turns into an `axum::Router` rooted at
//! `/api/<Name>`; role checks run as route layers before the handler.

mod auth;
mod context;
mod crud;
mod user_bound;

pub use auth::AuthController;
pub use context::{RequestScope, ValidatedJson};
pub use crud::CrudController;
pub use user_bound::UserBoundCrudController;

use crate::auth::{require_roles, RoleRequirement};
use crate::claims::{Claims, Role};
use crate::links::{accessible_links, ClaimLink, Link, Operation};
use axum::routing::MethodRouter;

/// Roles required per CRUD operation. An empty list leaves the operation
/// open. `OPTIONS` is always open.
#[derive(Debug, Clone, Default)]
pub struct CrudPolicy {
    pub create: Vec<Role>,
    pub read: Vec<Role>,
    pub update: Vec<Role>,
    pub delete: Vec<Role>,
}

impl CrudPolicy {
    pub fn open() -> Self {
        Self::default()
    }

    /// The same roles for every operation.
    pub fn uniform(roles: impl IntoIterator<Item = Role>) -> Self {
        let roles: Vec<Role> = roles.into_iter().collect();
        Self {
            create: roles.clone(),
            read: roles.clone(),
            update: roles.clone(),
            delete: roles,
        }
    }

    /// Readable by `readers`, writable only by `writers`.
    pub fn read_write(readers: impl IntoIterator<Item = Role>, writers: impl IntoIterator<Item = Role>) -> Self {
        let writers: Vec<Role> = writers.into_iter().collect();
        Self {
            create: writers.clone(),
            read: readers.into_iter().collect(),
            update: writers.clone(),
            delete: writers,
        }
    }
}

/// Guards a method router with a role requirement.
pub(crate) fn guarded<S>(route: MethodRouter<S>, roles: &[Role]) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.route_layer(axum::middleware::from_fn_with_state(
        RoleRequirement::new(roles.iter().cloned()),
        require_roles,
    ))
}

/// Link catalogue of one CRUD resource.
#[derive(Debug, Clone)]
pub(crate) struct ResourceLinks {
    base: String,
    namespace: String,
    policy: CrudPolicy,
}

impl ResourceLinks {
    pub(crate) fn new(name: &str, policy: CrudPolicy) -> Self {
        Self {
            base: format!("/api/{}", name),
            namespace: name.to_string(),
            policy,
        }
    }

    pub(crate) fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub(crate) fn base(&self) -> &str {
        &self.base
    }

    pub(crate) fn policy(&self) -> &CrudPolicy {
        &self.policy
    }

    fn link(&self, operation: Operation, url: &str) -> Link {
        Link::for_operation(Some(self.namespace.as_str()), operation, url)
    }

    fn collection(&self) -> Vec<ClaimLink> {
        vec![
            ClaimLink::requiring_roles(self.link(Operation::Create, &self.base), &self.policy.create),
            ClaimLink::requiring_roles(self.link(Operation::ReadAll, &self.base), &self.policy.read),
            ClaimLink::open(self.link(Operation::Options, &self.base)),
        ]
    }

    fn entry(&self, id: &str) -> Vec<ClaimLink> {
        self.entry_at(&format!("{}/{}", self.base, urlencoding::encode(id)))
    }

    fn entry_at(&self, url: &str) -> Vec<ClaimLink> {
        vec![
            ClaimLink::requiring_roles(self.link(Operation::ReadById, url), &self.policy.read),
            ClaimLink::requiring_roles(self.link(Operation::Update, url), &self.policy.update),
            ClaimLink::requiring_roles(self.link(Operation::Delete, url), &self.policy.delete),
        ]
    }

    pub(crate) fn collection_links(&self, claims: &Claims) -> Vec<Link> {
        accessible_links(&self.collection(), claims)
    }

    pub(crate) fn entry_links(&self, id: &str, claims: &Claims) -> Vec<Link> {
        accessible_links(&self.entry(id), claims)
    }

    /// Every operation of the resource the caller may see. Entry-level
    /// links use an `{id}` placeholder.
    pub(crate) fn options_links(&self, claims: &Claims) -> Vec<Link> {
        let mut links = self.collection_links(claims);
        let template = format!("{}/{{id}}", self.base);
        links.extend(accessible_links(&self.entry_at(&template), claims));
        links
    }
}
