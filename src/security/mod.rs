//! # Security Module
//!
//! Credential extraction for dependencies that require scopes.
//!
//! A dependency built with `.provider(...)` asks its [`SecurityProvider`] to
//! authenticate the request before its body runs:
//!
//! 1. [`Authentication::Missing`] or [`Authentication::Invalid`] yields a 401
//! 2. [`Authentication::Granted`] whose credentials lack any required scope
//!    yields a 403
//! 3. otherwise the credentials and the accumulated [`SecurityScopes`] are
//!    handed to the dependency body
//!
//! Required scopes are the dependency's own scopes plus every scope declared
//! at its invocation sites (`DepRef::security`) on the path from the route.
//!
//! ```rust
//! use fastroute::security::BearerJwtProvider;
//!
//! let provider = BearerJwtProvider::new("my-secret-signature").cookie_name("auth_token");
//! ```

use crate::server::RawRequest;
use serde_json::Value;

mod api_key;
mod bearer_jwt;

pub use api_key::{ApiKeyLocation, ApiKeyProvider};
pub use bearer_jwt::BearerJwtProvider;

/// Read-only view of the request for security providers.
pub struct SecurityRequest<'a> {
    request: &'a RawRequest,
}

impl<'a> SecurityRequest<'a> {
    #[must_use]
    pub fn new(request: &'a RawRequest) -> Self {
        Self { request }
    }

    /// Get a header by name (case-insensitive)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&'a str> {
        self.request.get_header(name)
    }

    #[must_use]
    pub fn get_query(&self, name: &str) -> Option<String> {
        self.request.query_value(name)
    }

    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<String> {
        self.request.get_cookie(name)
    }
}

/// Identity established by a provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    /// Principal, e.g. the JWT `sub` claim
    pub subject: Option<String>,
    /// Scopes granted to the principal
    pub scopes: Vec<String>,
    /// Provider-specific detail, e.g. decoded JWT claims
    pub claims: Value,
}

impl Credentials {
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// What a provider concluded about the request.
#[derive(Debug, Clone, PartialEq)]
pub enum Authentication {
    /// No credentials were presented
    Missing,
    /// Credentials were presented but rejected; the reason is only logged
    Invalid(String),
    Granted(Credentials),
}

/// Scopes required of the current dependency, accumulated from its own
/// declaration and every invocation site above it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityScopes {
    scopes: Vec<String>,
}

impl SecurityScopes {
    #[must_use]
    pub fn new(scopes: Vec<String>) -> Self {
        Self { scopes }
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Space separated, the form used in `WWW-Authenticate` challenges.
    #[must_use]
    pub fn scope_str(&self) -> String {
        self.scopes.join(" ")
    }

    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Scopes in `self` that `credentials` were not granted.
    #[must_use]
    pub fn missing_from(&self, credentials: &Credentials) -> Vec<String> {
        self.scopes
            .iter()
            .filter(|s| !credentials.has_scope(s))
            .cloned()
            .collect()
    }
}

/// Extracts and validates credentials for a dependency.
pub trait SecurityProvider: Send + Sync {
    fn authenticate(&self, req: &SecurityRequest<'_>) -> Authentication;

    /// Name used in logs.
    fn name(&self) -> &str {
        "security"
    }
}
