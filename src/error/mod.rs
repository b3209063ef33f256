//! # Error Module
//!
//! Every pipeline stage returns `Result<_, DispatchError>`. The
//! [`ExceptionMapper`] is the single place where a `DispatchError` becomes a
//! client response; registration problems are reported separately as
//! [`RegistrationError`] by `AppBuilder::build`.
//!
//! | Kind | Status | Body |
//! |------|--------|------|
//! | `NotFound` | 404 | `{"detail":"Not Found"}` |
//! | `MethodNotAllowed` | 405 | `{"detail":"Method Not Allowed"}` + `Allow` |
//! | `Validation` | 422 | `{"detail":[{"loc","msg","type","input"}, ...]}` |
//! | `Unauthenticated` | 401 | `{"detail":...}` + `WWW-Authenticate: Bearer` |
//! | `Forbidden` | 403 | `{"detail":...}` |
//! | `Http` | its own | `{"detail":...}` + its headers |
//! | `Internal` | 500 | `{"detail":"Internal Server Error"}` |

mod mapper;

pub use mapper::{ErrorHandlerFn, ExceptionMapper};

use crate::validator::ValidationIssue;
use http::Method;
use serde_json::Value;
use std::fmt;

/// An error raised on purpose by application code (handlers, dependencies,
/// middlewares) to produce a specific HTTP status.
///
/// ```rust
/// use fastroute::error::HttpError;
///
/// let err = HttpError::new(418, "I'm a teapot").with_header("x-brew", "earl-grey");
/// assert_eq!(err.status, 418);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HttpError {
    pub status: u16,
    /// Sent to the client as the `detail` member of the JSON body
    pub detail: Value,
    /// Extra response headers, in insertion order
    pub headers: Vec<(String, String)>,
}

impl HttpError {
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: Value::String(detail.into()),
            headers: Vec::new(),
        }
    }

    /// Use an arbitrary JSON value as the detail.
    pub fn with_detail(status: u16, detail: Value) -> Self {
        Self {
            status,
            detail,
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Value::String(s) => write!(f, "HTTP {}: {}", self.status, s),
            other => write!(f, "HTTP {}: {}", self.status, other),
        }
    }
}

impl std::error::Error for HttpError {}

/// Discriminant of [`DispatchError`], used to key custom exception handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    MethodNotAllowed,
    Validation,
    Unauthenticated,
    Forbidden,
    Http,
    Internal,
}

/// Anything that can go wrong while dispatching one request.
#[derive(Debug)]
pub enum DispatchError {
    /// No route shape matches the path
    NotFound { method: Method, path: String },
    /// The path matches at least one route, but never under this method
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },
    /// Every binding failure for the request, never a partial list
    Validation(Vec<ValidationIssue>),
    /// Credentials absent or invalid
    Unauthenticated { detail: String },
    /// Credentials valid but lacking required scopes
    Forbidden {
        detail: String,
        missing_scopes: Vec<String>,
    },
    /// Application-raised error, passed through verbatim
    Http(HttpError),
    /// Any uncaught failure; the chain is logged, never sent to the client
    Internal(anyhow::Error),
}

impl DispatchError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::NotFound { .. } => ErrorKind::NotFound,
            DispatchError::MethodNotAllowed { .. } => ErrorKind::MethodNotAllowed,
            DispatchError::Validation(_) => ErrorKind::Validation,
            DispatchError::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            DispatchError::Forbidden { .. } => ErrorKind::Forbidden,
            DispatchError::Http(_) => ErrorKind::Http,
            DispatchError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Status the default mapping rule answers with.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::NotFound { .. } => 404,
            DispatchError::MethodNotAllowed { .. } => 405,
            DispatchError::Validation(_) => 422,
            DispatchError::Unauthenticated { .. } => 401,
            DispatchError::Forbidden { .. } => 403,
            DispatchError::Http(e) => e.status,
            DispatchError::Internal(_) => 500,
        }
    }

    /// Shorthand for an internal error built from a message.
    pub fn internal(message: impl fmt::Display) -> Self {
        DispatchError::Internal(anyhow::anyhow!("{message}"))
    }

    /// Validation issues carried by this error, empty for other kinds.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            DispatchError::Validation(issues) => issues,
            _ => &[],
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NotFound { method, path } => {
                write!(f, "no route matches {method} {path}")
            }
            DispatchError::MethodNotAllowed {
                method,
                path,
                allowed,
            } => {
                let allowed: Vec<&str> = allowed.iter().map(Method::as_str).collect();
                write!(
                    f,
                    "method {method} not allowed for {path} (allowed: {})",
                    allowed.join(", ")
                )
            }
            DispatchError::Validation(issues) => {
                write!(f, "{} validation error(s)", issues.len())?;
                for issue in issues {
                    write!(f, "; {issue}")?;
                }
                Ok(())
            }
            DispatchError::Unauthenticated { detail } => write!(f, "unauthenticated: {detail}"),
            DispatchError::Forbidden {
                detail,
                missing_scopes,
            } => write!(f, "forbidden: {detail} (missing scopes: {missing_scopes:?})"),
            DispatchError::Http(e) => write!(f, "{e}"),
            DispatchError::Internal(e) => write!(f, "internal error: {e:#}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Http(e) => Some(e),
            DispatchError::Internal(e) => Some(&**e),
            _ => None,
        }
    }
}

impl From<HttpError> for DispatchError {
    fn from(e: HttpError) -> Self {
        DispatchError::Http(e)
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(e: anyhow::Error) -> Self {
        DispatchError::Internal(e)
    }
}

/// Problems detected while `AppBuilder::build` compiles the route table and
/// dependency graph. None of these can occur once an `AppService` exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The path template could not be parsed
    InvalidTemplate { template: String, reason: String },
    /// Same method and structurally identical template as an earlier route
    AmbiguousRoute {
        method: Method,
        template: String,
        existing: String,
    },
    /// A path parameter is declared but the template has no such placeholder
    UnknownPathParameter { route: String, name: String },
    /// The same name is declared twice in one location for one owner
    DuplicateParameter {
        owner: String,
        name: String,
        location: String,
    },
    /// A `pattern` constraint is not a valid regular expression
    InvalidPattern {
        parameter: String,
        pattern: String,
        reason: String,
    },
    /// A body or response schema failed to compile
    InvalidSchema { owner: String, reason: String },
    /// Dependency references form a loop, listed in traversal order
    DependencyCycle { cycle: Vec<String> },
    /// A dependency requires scopes but has no provider to check them
    MissingSecurityProvider { dependency: String },
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::InvalidTemplate { template, reason } => {
                write!(f, "invalid path template '{template}': {reason}")
            }
            RegistrationError::AmbiguousRoute {
                method,
                template,
                existing,
            } => write!(
                f,
                "route {method} {template} is structurally identical to {method} {existing}"
            ),
            RegistrationError::UnknownPathParameter { route, name } => write!(
                f,
                "path parameter '{name}' is not a placeholder of route '{route}'"
            ),
            RegistrationError::DuplicateParameter {
                owner,
                name,
                location,
            } => write!(
                f,
                "{location} parameter '{name}' is declared more than once by '{owner}'"
            ),
            RegistrationError::InvalidPattern {
                parameter,
                pattern,
                reason,
            } => write!(
                f,
                "parameter '{parameter}' has an invalid pattern '{pattern}': {reason}"
            ),
            RegistrationError::InvalidSchema { owner, reason } => {
                write!(f, "schema of '{owner}' failed to compile: {reason}")
            }
            RegistrationError::DependencyCycle { cycle } => {
                write!(f, "dependency cycle detected: {}", cycle.join(" -> "))
            }
            RegistrationError::MissingSecurityProvider { dependency } => write!(
                f,
                "dependency '{dependency}' requires scopes but has no security provider"
            ),
        }
    }
}

impl std::error::Error for RegistrationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_converts_and_keeps_status() {
        let err: DispatchError = HttpError::new(409, "conflict").into();
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.status(), 409);
    }

    #[test]
    fn test_anyhow_error_is_internal() {
        let err: DispatchError = anyhow::anyhow!("database down").into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.status(), 500);
        assert!(err.to_string().contains("database down"));
    }

    #[test]
    fn test_cycle_display_lists_path() {
        let err = RegistrationError::DependencyCycle {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");
    }
}
