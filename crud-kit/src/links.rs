//! Hypermedia links advertised alongside every response.

use crate::claims::{Claim, Claims, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Create,
    ReadAll,
    ReadById,
    Update,
    Delete,
    Options,
    SignUp,
    SignIn,
    ChangePassword,
    Refresh,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "Create",
            Operation::ReadAll => "ReadAll",
            Operation::ReadById => "ReadById",
            Operation::Update => "Update",
            Operation::Delete => "Delete",
            Operation::Options => "Options",
            Operation::SignUp => "SignUp",
            Operation::SignIn => "SignIn",
            Operation::ChangePassword => "ChangePassword",
            Operation::Refresh => "Refresh",
        }
    }

    /// `urn:<namespace>:<operation>`, or `urn:<operation>` without a namespace.
    pub fn urn(&self, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) if !ns.is_empty() => format!("urn:{}:{}", ns, self.as_str()),
            _ => format!("urn:{}", self.as_str()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace for a controller type: its bare type name without a trailing
/// `ControllerBase` or `Controller`.
pub fn urn_namespace<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    let name = without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics);

    name.strip_suffix("ControllerBase")
        .or_else(|| name.strip_suffix("Controller"))
        .unwrap_or(name)
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub urn: String,
    pub url: String,
}

impl Link {
    pub fn new(urn: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            urn: urn.into(),
            url: url.into(),
        }
    }

    pub fn for_operation(namespace: Option<&str>, operation: Operation, url: impl Into<String>) -> Self {
        Self::new(operation.urn(namespace), url)
    }
}

/// A link that is only advertised to callers holding every required claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimLink {
    link: Link,
    required: Vec<Claim>,
}

impl ClaimLink {
    /// Visible to everyone.
    pub fn open(link: Link) -> Self {
        Self {
            link,
            required: Vec::new(),
        }
    }

    pub fn requiring<I>(link: Link, claims: I) -> Self
    where
        I: IntoIterator<Item = Claim>,
    {
        Self {
            link,
            required: claims.into_iter().collect(),
        }
    }

    pub fn requiring_roles<'a, I>(link: Link, roles: I) -> Self
    where
        I: IntoIterator<Item = &'a Role>,
    {
        Self::requiring(link, roles.into_iter().map(Claim::role))
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn required_claims(&self) -> &[Claim] {
        &self.required
    }

    pub fn can_be_accessed(&self, user_claims: &Claims) -> bool {
        self.required.iter().all(|claim| user_claims.contains(claim))
    }
}

/// Links from `candidates` the caller may see, in their original order.
pub fn accessible_links<'a, I>(candidates: I, user_claims: &Claims) -> Vec<Link>
where
    I: IntoIterator<Item = &'a ClaimLink>,
{
    candidates
        .into_iter()
        .filter(|candidate| candidate.can_be_accessed(user_claims))
        .map(|candidate| candidate.link.clone())
        .collect()
}

/// Response envelope: the value's own fields plus the links the caller may follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkResult<T> {
    pub links: Vec<Link>,
    #[serde(flatten)]
    pub value: T,
}

impl<T> LinkResult<T> {
    pub fn new(value: T, links: Vec<Link>) -> Self {
        Self { links, value }
    }
}

/// Collection body for read-all responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

/// Body with no fields of its own; an options response is just its links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoContent {}
