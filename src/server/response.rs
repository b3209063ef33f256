use crate::dispatcher::HandlerResponse;
use std::io;
use tokio::sync::oneshot;

/// A response in the form a transport writes it: status line parts, header
/// lines and the serialized body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    pub status: u16,
    /// Canonical reason phrase for `status`, `"Unknown"` for unregistered codes
    pub reason: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl WireResponse {
    /// First header with this name, case-insensitive.
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Canonical reason phrase for a status code.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

impl From<HandlerResponse> for WireResponse {
    fn from(response: HandlerResponse) -> Self {
        let has_body = !response.body.is_empty();
        let (status, mut headers, body) = response.into_parts();
        if has_body
            && !headers
                .iter()
                .any(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        {
            headers.push(("content-length".to_string(), body.len().to_string()));
        }
        Self {
            status,
            reason: status_reason(status),
            headers,
            body,
        }
    }
}

/// Where the transport wants the finished response delivered.
///
/// `send` is called exactly once per request; background tasks are only
/// scheduled after it returned `Ok`.
pub trait ResponseSink: Send {
    fn send(self, response: WireResponse) -> io::Result<()>;
}

impl ResponseSink for oneshot::Sender<WireResponse> {
    fn send(self, response: WireResponse) -> io::Result<()> {
        oneshot::Sender::send(self, response).map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "response receiver dropped")
        })
    }
}
