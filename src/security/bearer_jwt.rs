use crate::security::{Authentication, Credentials, SecurityProvider, SecurityRequest};
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use tracing::debug;

/// Simple Bearer/JWT provider that validates tokens embedded in the
/// `Authorization` header or a cookie.
///
/// Tokens are expected to have the form `header.payload.signature` where the
/// signature part must match the configured `signature` string. Scopes are
/// read from a whitespace separated `scope` claim or a `scopes` array, and
/// the subject from `sub`.
///
/// This is a pre-shared-secret scheme for tests and internal services; it
/// performs no cryptographic verification.
pub struct BearerJwtProvider {
    signature: String,
    cookie_name: Option<String>,
}

impl BearerJwtProvider {
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            cookie_name: None,
        }
    }

    /// Configure the cookie name used to read the token.
    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = Some(name.into());
        self
    }

    fn extract_token(&self, req: &SecurityRequest<'_>) -> Option<String> {
        if let Some(name) = &self.cookie_name {
            if let Some(t) = req.get_cookie(name) {
                return Some(t);
            }
        }
        let header = req.get_header("authorization")?;
        let (scheme, token) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }

    /// Decode and check `token`, returning the granted credentials.
    pub fn validate_token(&self, token: &str) -> Result<Credentials, String> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(sig)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err("malformed token".into());
        };
        if sig != self.signature {
            return Err("invalid signature".into());
        }
        let payload_bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| general_purpose::STANDARD.decode(payload))
            .map_err(|e| format!("invalid base64 payload: {e}"))?;
        let claims: Value = serde_json::from_slice(&payload_bytes)
            .map_err(|e| format!("invalid JSON payload: {e}"))?;

        let mut scopes: Vec<String> = claims
            .get("scope")
            .and_then(Value::as_str)
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        if let Some(list) = claims.get("scopes").and_then(Value::as_array) {
            scopes.extend(list.iter().filter_map(Value::as_str).map(str::to_string));
        }
        let subject = claims.get("sub").and_then(Value::as_str).map(str::to_string);

        Ok(Credentials {
            subject,
            scopes,
            claims,
        })
    }
}

impl SecurityProvider for BearerJwtProvider {
    fn authenticate(&self, req: &SecurityRequest<'_>) -> Authentication {
        let Some(token) = self.extract_token(req) else {
            debug!("BearerJWT: missing token (no Authorization header or cookie)");
            return Authentication::Missing;
        };
        match self.validate_token(&token) {
            Ok(credentials) => {
                debug!(subject = ?credentials.subject, "BearerJWT: token valid");
                Authentication::Granted(credentials)
            }
            Err(reason) => {
                debug!(reason = %reason, "BearerJWT: token rejected");
                Authentication::Invalid(reason)
            }
        }
    }

    fn name(&self) -> &str {
        "bearer_jwt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::RawRequest;
    use serde_json::json;

    fn token(claims: &Value, sig: &str) -> String {
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("e30.{payload}.{sig}")
    }

    #[test]
    fn test_valid_token_grants_scopes() {
        let provider = BearerJwtProvider::new("sig");
        let t = token(&json!({"sub": "alice", "scope": "read admin"}), "sig");
        let req = RawRequest::get("/").header("Authorization", format!("Bearer {t}"));
        match provider.authenticate(&SecurityRequest::new(&req)) {
            Authentication::Granted(c) => {
                assert_eq!(c.subject.as_deref(), Some("alice"));
                assert!(c.has_scope("admin"));
            }
            other => panic!("expected granted, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_signature_is_invalid() {
        let provider = BearerJwtProvider::new("sig");
        let t = token(&json!({"scope": "admin"}), "forged");
        let req = RawRequest::get("/").header("authorization", format!("Bearer {t}"));
        assert!(matches!(
            provider.authenticate(&SecurityRequest::new(&req)),
            Authentication::Invalid(_)
        ));
    }

    #[test]
    fn test_absent_header_is_missing() {
        let provider = BearerJwtProvider::new("sig");
        let req = RawRequest::get("/");
        assert_eq!(
            provider.authenticate(&SecurityRequest::new(&req)),
            Authentication::Missing
        );
    }

    #[test]
    fn test_cookie_token_and_scopes_array() {
        let provider = BearerJwtProvider::new("sig").cookie_name("auth");
        let t = token(&json!({"scopes": ["a", "b"]}), "sig");
        let req = RawRequest::get("/").header("cookie", format!("auth={t}"));
        match provider.authenticate(&SecurityRequest::new(&req)) {
            Authentication::Granted(c) => assert_eq!(c.scopes, vec!["a", "b"]),
            other => panic!("expected granted, got {other:?}"),
        }
    }
}
