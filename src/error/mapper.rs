use super::{DispatchError, ErrorKind};
use crate::dispatcher::HandlerResponse;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Custom rule replacing the default mapping for one [`ErrorKind`].
pub type ErrorHandlerFn = dyn Fn(&DispatchError) -> HandlerResponse + Send + Sync;

/// Converts any [`DispatchError`] into exactly one response.
///
/// The mapping is total: every kind has a default rule, and a custom handler
/// registered for a kind replaces that rule.
#[derive(Clone)]
pub struct ExceptionMapper {
    handlers: HashMap<ErrorKind, Arc<ErrorHandlerFn>>,
    allow_header: bool,
}

impl Default for ExceptionMapper {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            allow_header: true,
        }
    }
}

impl fmt::Debug for ExceptionMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionMapper")
            .field("custom_kinds", &self.handlers.keys().collect::<Vec<_>>())
            .field("allow_header", &self.allow_header)
            .finish()
    }
}

impl ExceptionMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether 405 responses list the permitted methods in `Allow`.
    #[must_use]
    pub fn with_allow_header(mut self, enabled: bool) -> Self {
        self.allow_header = enabled;
        self
    }

    /// Register `handler` for `kind`, replacing any earlier registration.
    pub fn register<F>(&mut self, kind: ErrorKind, handler: F)
    where
        F: Fn(&DispatchError) -> HandlerResponse + Send + Sync + 'static,
    {
        self.handlers.insert(kind, Arc::new(handler));
    }

    #[must_use]
    pub fn has_custom_handler(&self, kind: ErrorKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Map `err` to its response.
    #[must_use]
    pub fn handle(&self, err: &DispatchError) -> HandlerResponse {
        let kind = err.kind();
        if let DispatchError::Internal(e) = err {
            // Logged regardless of which rule renders the response.
            error!(error = %format!("{e:#}"), "Unhandled error while dispatching request");
        } else {
            debug!(kind = ?kind, status = err.status(), error = %err, "Mapping dispatch error");
        }

        if let Some(handler) = self.handlers.get(&kind) {
            return handler(err);
        }
        self.default_response(err)
    }

    fn default_response(&self, err: &DispatchError) -> HandlerResponse {
        match err {
            DispatchError::NotFound { .. } => HandlerResponse::error(404, "Not Found"),
            DispatchError::MethodNotAllowed { allowed, .. } => {
                let mut resp = HandlerResponse::error(405, "Method Not Allowed");
                if self.allow_header {
                    let allow: Vec<&str> = allowed.iter().map(http::Method::as_str).collect();
                    resp.set_header("allow", allow.join(", "));
                }
                resp
            }
            DispatchError::Validation(issues) => {
                HandlerResponse::json(422, json!({ "detail": issues }))
            }
            DispatchError::Unauthenticated { detail } => {
                let mut resp = HandlerResponse::error(401, detail);
                resp.set_header("www-authenticate", "Bearer");
                resp
            }
            DispatchError::Forbidden { detail, .. } => HandlerResponse::error(403, detail),
            DispatchError::Http(e) => {
                let mut resp = HandlerResponse::json(e.status, json!({ "detail": e.detail }));
                for (name, value) in &e.headers {
                    resp.append_header(name, value.clone());
                }
                resp
            }
            DispatchError::Internal(_) => HandlerResponse::error(500, "Internal Server Error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::validator::ValidationIssue;
    use http::Method;
    use serde_json::Value;

    fn body(resp: &HandlerResponse) -> Value {
        resp.json_body().cloned().unwrap_or(Value::Null)
    }

    #[test]
    fn test_not_found_body() {
        let resp = ExceptionMapper::new().handle(&DispatchError::NotFound {
            method: Method::GET,
            path: "/nope".into(),
        });
        assert_eq!(resp.status, 404);
        assert_eq!(body(&resp), json!({"detail": "Not Found"}));
    }

    #[test]
    fn test_method_not_allowed_sets_allow() {
        let err = DispatchError::MethodNotAllowed {
            method: Method::DELETE,
            path: "/items".into(),
            allowed: vec![Method::GET, Method::POST],
        };
        let resp = ExceptionMapper::new().handle(&err);
        assert_eq!(resp.status, 405);
        assert_eq!(resp.get_header("Allow"), Some("GET, POST"));

        let resp = ExceptionMapper::new().with_allow_header(false).handle(&err);
        assert_eq!(resp.get_header("allow"), None);
    }

    #[test]
    fn test_validation_lists_every_issue() {
        let err = DispatchError::Validation(vec![
            ValidationIssue::missing(vec!["query".into(), "q".into()]),
            ValidationIssue::new(
                vec!["path".into(), "item_id".into()],
                "int_parsing",
                "Input should be a valid integer, unable to parse string as an integer",
                json!("abc"),
            ),
        ]);
        let resp = ExceptionMapper::new().handle(&err);
        assert_eq!(resp.status, 422);
        let detail = body(&resp)["detail"].clone();
        assert_eq!(detail.as_array().map(Vec::len), Some(2));
        assert_eq!(detail[1]["loc"], json!(["path", "item_id"]));
        assert_eq!(detail[1]["type"], json!("int_parsing"));
        assert_eq!(detail[1]["input"], json!("abc"));
        assert_eq!(detail[0]["msg"], json!("Field required"));
    }

    #[test]
    fn test_unauthenticated_challenges_bearer() {
        let resp = ExceptionMapper::new().handle(&DispatchError::Unauthenticated {
            detail: "Not authenticated".into(),
        });
        assert_eq!(resp.status, 401);
        assert_eq!(resp.get_header("www-authenticate"), Some("Bearer"));
    }

    #[test]
    fn test_http_error_passes_through_with_headers() {
        let err: DispatchError = HttpError::new(418, "teapot")
            .with_header("x-reason", "short and stout")
            .into();
        let resp = ExceptionMapper::new().handle(&err);
        assert_eq!(resp.status, 418);
        assert_eq!(body(&resp), json!({"detail": "teapot"}));
        assert_eq!(resp.get_header("x-reason"), Some("short and stout"));
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let err = DispatchError::internal("secret connection string leaked");
        let resp = ExceptionMapper::new().handle(&err);
        assert_eq!(resp.status, 500);
        assert_eq!(body(&resp), json!({"detail": "Internal Server Error"}));
    }

    #[test]
    fn test_custom_handler_replaces_default_rule() {
        let mut mapper = ExceptionMapper::new();
        mapper.register(ErrorKind::NotFound, |_| {
            HandlerResponse::json(404, json!({"error": "no such thing"}))
        });
        let resp = mapper.handle(&DispatchError::NotFound {
            method: Method::GET,
            path: "/x".into(),
        });
        assert_eq!(body(&resp), json!({"error": "no such thing"}));
        // other kinds keep their defaults
        let resp = mapper.handle(&DispatchError::Forbidden {
            detail: "Not enough permissions".into(),
            missing_scopes: vec!["admin".into()],
        });
        assert_eq!(resp.status, 403);
    }
}
