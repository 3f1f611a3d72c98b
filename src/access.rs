//! Access tokens and scopes controlling service visibility.
//!
//! Each registration source (a provider bean, a registration action, the
//! registry itself) receives its own [`ServiceAccessToken`]. Services declared
//! private are only visible to lookups carrying the token of the source that
//! declared them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

struct TokenInner {
    id: u64,
    owner: String,
}

/// Unforgeable identifier of one registration source.
///
/// Tokens compare by identity: clones of one token are equal, two tokens
/// created for the same owner are not.
#[derive(Clone)]
pub struct ServiceAccessToken(Arc<TokenInner>);

impl ServiceAccessToken {
    /// Display name of the source this token was created for.
    pub fn owner(&self) -> &str {
        &self.0.owner
    }
}

impl PartialEq for ServiceAccessToken {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for ServiceAccessToken {}

impl fmt::Debug for ServiceAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceAccessToken({}#{})", self.0.owner, self.0.id)
    }
}

/// Visibility predicate attached to a service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceAccessScope {
    /// Visible to every lookup, with or without a token.
    Public,
    /// Visible only to lookups carrying this token.
    Private(ServiceAccessToken),
}

impl ServiceAccessScope {
    /// Whether a lookup carrying `token` may see a service in this scope.
    pub fn contains(&self, token: Option<&ServiceAccessToken>) -> bool {
        match self {
            ServiceAccessScope::Public => true,
            ServiceAccessScope::Private(owner) => token == Some(owner),
        }
    }
}

/// Creates a fresh token for the named owner.
pub fn create_token(owner: impl Into<String>) -> ServiceAccessToken {
    let id = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    ServiceAccessToken(Arc::new(TokenInner { id, owner: owner.into() }))
}

/// The scope visible to everyone.
pub fn public_scope() -> ServiceAccessScope {
    ServiceAccessScope::Public
}

/// The scope visible only to holders of `token`.
pub fn private_scope(token: ServiceAccessToken) -> ServiceAccessScope {
    ServiceAccessScope::Private(token)
}
