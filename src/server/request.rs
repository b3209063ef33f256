use crate::dispatcher::HeaderVec;
use http::Method;
use serde_json::Value;
use std::sync::Arc;

/// Transport-neutral request as delivered to the dispatch core.
///
/// The path is kept exactly as received (still percent-encoded); the router
/// decodes captured parameter values. Cookies are parsed from the `Cookie`
/// header on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRequest {
    pub method: Method,
    /// Path component without the query string
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: String,
    /// Headers in arrival order; duplicates allowed
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl RawRequest {
    /// Build a request from a method and a request target such as
    /// `/items/42?limit=10`.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, q),
            None => (target, ""),
        };
        let path = if path.is_empty() { "/" } else { path };
        Self {
            method,
            path: path.to_string(),
            query: query.to_string(),
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: &str) -> Self {
        Self::new(Method::POST, target)
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the body and set `content-type: application/json`.
    #[must_use]
    pub fn json(self, value: &Value) -> Self {
        let bytes = value.to_string().into_bytes();
        self.header("content-type", "application/json").body(bytes)
    }

    /// First header with this name (case-insensitive per RFC 7230).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeated header, in arrival order.
    #[must_use]
    pub fn get_header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Cookies parsed from every `Cookie` header.
    #[must_use]
    pub fn cookies(&self) -> HeaderVec {
        let mut cookies = HeaderVec::new();
        for header in self.get_header_values("cookie") {
            cookies.extend(parse_cookies(header));
        }
        cookies
    }

    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<String> {
        self.cookies()
            .into_iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Decoded query pairs in order of appearance.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Every value of a query parameter, in order of appearance.
    #[must_use]
    pub fn query_values(&self, name: &str) -> Vec<String> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .collect()
    }

    /// Last value of a query parameter (`?limit=10&limit=20` gives `20`).
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<String> {
        self.query_values(name).pop()
    }
}

/// Split a `Cookie` header value into name/value pairs.
#[must_use]
pub fn parse_cookies(header: &str) -> HeaderVec {
    header
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim();
            Some((Arc::from(name), value.to_string()))
        })
        .collect()
}
