//! Principals and the ambient principal context.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The authenticated identity a call is evaluated against.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    name: String,
    authorities: BTreeSet<String>,
    authenticated: bool,
}

impl Principal {
    /// An authenticated principal with no authorities.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authorities: BTreeSet::new(),
            authenticated: true,
        }
    }

    /// The unauthenticated principal.
    pub fn anonymous() -> Self {
        Self {
            name: "anonymous".to_string(),
            authorities: BTreeSet::new(),
            authenticated: false,
        }
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.insert(authority.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn authorities(&self) -> &BTreeSet<String> {
        &self.authorities
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Access to the principal of the current call context.
///
/// Supplied by the surrounding security infrastructure. Overrides must go
/// through [`PrincipalScope`] so the previous principal is always restored.
pub trait PrincipalContext: Send + Sync {
    /// The principal active in the current call context.
    fn current(&self) -> Option<Principal>;

    /// Replace the active principal, returning the previous one.
    fn replace(&self, principal: Option<Principal>) -> Option<Principal>;
}

thread_local! {
    static CURRENT_PRINCIPAL: RefCell<Option<Principal>> = const { RefCell::new(None) };
}

/// Per-thread principal context. Every instance shares the same thread slot.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadLocalPrincipalContext;

impl PrincipalContext for ThreadLocalPrincipalContext {
    fn current(&self) -> Option<Principal> {
        CURRENT_PRINCIPAL.with(|slot| slot.borrow().clone())
    }

    fn replace(&self, principal: Option<Principal>) -> Option<Principal> {
        CURRENT_PRINCIPAL.with(|slot| slot.replace(principal))
    }
}

/// Scope guard overriding the active principal.
///
/// The previous principal is restored when the guard drops, including
/// during unwinding.
#[must_use = "the override ends when the scope is dropped"]
pub struct PrincipalScope<'a> {
    context: &'a dyn PrincipalContext,
    previous: Option<Principal>,
}

impl<'a> PrincipalScope<'a> {
    pub fn enter(context: &'a dyn PrincipalContext, principal: Option<Principal>) -> Self {
        let previous = context.replace(principal);
        Self { context, previous }
    }
}

impl Drop for PrincipalScope<'_> {
    fn drop(&mut self) {
        self.context.replace(self.previous.take());
    }
}
