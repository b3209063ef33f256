use super::core::HandlerResponse;
use crate::error::DispatchError;
use crate::validator::SchemaValidator;
use serde::Serialize;
use serde_json::Value;

/// What a handler returns, before the route's response declaration is
/// applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A complete response, used as-is
    Response(HandlerResponse),
    /// A value rendered according to the route's declared kind
    Json(Value),
    /// Nothing; 204 unless the route declares a kind
    Empty,
}

impl Reply {
    /// Serialize any value into a [`Reply::Json`].
    pub fn json<T: Serialize>(value: &T) -> Result<Self, DispatchError> {
        serde_json::to_value(value)
            .map(Reply::Json)
            .map_err(|e| DispatchError::internal(format!("response serialization failed: {e}")))
    }
}

impl From<HandlerResponse> for Reply {
    fn from(r: HandlerResponse) -> Self {
        Reply::Response(r)
    }
}

impl From<Value> for Reply {
    fn from(v: Value) -> Self {
        Reply::Json(v)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Reply::Json(Value::String(s))
    }
}

impl From<&'static str> for Reply {
    fn from(s: &'static str) -> Self {
        Reply::Json(Value::String(s.to_string()))
    }
}

/// Declared response class of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Html,
    PlainText,
    /// The reply is the target URL; status defaults to 307
    Redirect,
}

impl ResponseKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseKind::Json => "json",
            ResponseKind::Html => "html",
            ResponseKind::PlainText => "plain_text",
            ResponseKind::Redirect => "redirect",
        }
    }
}

/// Response side of a route declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMeta {
    pub kind: Option<ResponseKind>,
    /// Success status; 200 by default, 307 for redirects
    pub status: Option<u16>,
    pub schema: Option<Value>,
}

/// Turn a handler's [`Reply`] into the final response.
///
/// A value whose shape does not fit the declared kind, or that fails the
/// declared response schema, is an `Internal` error; nothing is coerced.
pub fn resolve_reply(
    reply: Reply,
    meta: &ResponseMeta,
    validator: Option<&SchemaValidator>,
) -> Result<HandlerResponse, DispatchError> {
    match reply {
        Reply::Response(response) => Ok(response),
        Reply::Empty => match meta.kind {
            None => Ok(HandlerResponse::empty(meta.status.unwrap_or(204))),
            Some(kind) => render(kind, Value::Null, meta),
        },
        Reply::Json(value) => {
            let kind = meta.kind.unwrap_or(ResponseKind::Json);
            if kind == ResponseKind::Json {
                if let Some(validator) = validator {
                    let issues = validator.validate(&value, &["response".to_string()]);
                    if !issues.is_empty() {
                        let summary: Vec<String> = issues.iter().map(ToString::to_string).collect();
                        return Err(DispatchError::internal(format!(
                            "response does not match the declared schema: {}",
                            summary.join("; ")
                        )));
                    }
                }
            }
            render(kind, value, meta)
        }
    }
}

fn render(
    kind: ResponseKind,
    value: Value,
    meta: &ResponseMeta,
) -> Result<HandlerResponse, DispatchError> {
    let status = meta.status.unwrap_or(200);
    match (kind, value) {
        (ResponseKind::Json, value) => Ok(HandlerResponse::json(status, value)),
        (ResponseKind::Html, Value::String(s)) => Ok(HandlerResponse::html(status, s)),
        (ResponseKind::Html, Value::Null) => Ok(HandlerResponse::html(status, "")),
        (ResponseKind::PlainText, Value::String(s)) => Ok(HandlerResponse::text(status, s)),
        (ResponseKind::PlainText, Value::Null) => Ok(HandlerResponse::text(status, "")),
        (ResponseKind::Redirect, Value::String(location)) => Ok(
            HandlerResponse::redirect_with_status(meta.status.unwrap_or(307), location),
        ),
        (kind, other) => Err(DispatchError::internal(format!(
            "a {} response cannot render {}",
            kind.as_str(),
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn meta(kind: Option<ResponseKind>, status: Option<u16>) -> ResponseMeta {
        ResponseMeta {
            kind,
            status,
            schema: None,
        }
    }

    #[test]
    fn test_json_uses_success_status() {
        let resp = resolve_reply(json!({"id": 1}).into(), &meta(None, Some(201)), None).unwrap();
        assert_eq!(resp.status, 201);
        assert_eq!(resp.json_body(), Some(&json!({"id": 1})));
    }

    #[test]
    fn test_empty_is_204_without_kind() {
        let resp = resolve_reply(Reply::Empty, &meta(None, None), None).unwrap();
        assert_eq!(resp.status, 204);
        assert!(resp.body.is_empty());
        assert!(resp.get_header("content-type").is_none());
    }

    #[test]
    fn test_empty_with_declared_kind_renders_null() {
        let resp = resolve_reply(Reply::Empty, &meta(Some(ResponseKind::Json), None), None).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body_bytes(), b"null".to_vec());

        let resp = resolve_reply(
            Reply::Empty,
            &meta(Some(ResponseKind::PlainText), None),
            None,
        )
        .unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.body.is_empty());
    }

    #[test]
    fn test_html_and_redirect() {
        let resp = resolve_reply(
            "<h1>hi</h1>".into(),
            &meta(Some(ResponseKind::Html), None),
            None,
        )
        .unwrap();
        assert_eq!(resp.get_header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(resp.body_bytes(), b"<h1>hi</h1>".to_vec());

        let resp = resolve_reply(
            "/docs".into(),
            &meta(Some(ResponseKind::Redirect), None),
            None,
        )
        .unwrap();
        assert_eq!(resp.status, 307);
        assert_eq!(resp.get_header("location"), Some("/docs"));
    }

    #[test]
    fn test_shape_mismatch_is_internal() {
        let err = resolve_reply(
            json!({"a": 1}).into(),
            &meta(Some(ResponseKind::Html), None),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("html response cannot render an object"));
    }

    #[test]
    fn test_response_schema_enforced() {
        let validator = SchemaValidator::compile(&json!({
            "type": "object",
            "required": ["id"],
            "properties": {"id": {"type": "integer"}}
        }))
        .unwrap();
        let ok = resolve_reply(json!({"id": 3}).into(), &meta(None, None), Some(&validator));
        assert!(ok.is_ok());
        let err = resolve_reply(json!({"id": "x"}).into(), &meta(None, None), Some(&validator))
            .unwrap_err();
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_explicit_response_passes_through() {
        let original = HandlerResponse::text(202, "accepted");
        let resp = resolve_reply(
            original.clone().into(),
            &meta(Some(ResponseKind::Json), Some(200)),
            None,
        )
        .unwrap();
        assert_eq!(resp, original);
    }
}
