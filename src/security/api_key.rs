use crate::security::{Authentication, Credentials, SecurityProvider, SecurityRequest};
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

/// Where an API key is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

/// Static API keys, each mapped to the scopes it grants.
///
/// ```rust
/// use fastroute::security::{ApiKeyLocation, ApiKeyProvider};
///
/// let provider = ApiKeyProvider::new(ApiKeyLocation::Header, "x-api-key")
///     .key("k-123", ["items:read"]);
/// ```
pub struct ApiKeyProvider {
    location: ApiKeyLocation,
    name: String,
    keys: HashMap<String, Vec<String>>,
}

impl ApiKeyProvider {
    pub fn new(location: ApiKeyLocation, name: impl Into<String>) -> Self {
        Self {
            location,
            name: name.into(),
            keys: HashMap::new(),
        }
    }

    #[must_use]
    pub fn key<I, S>(mut self, key: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys
            .insert(key.into(), scopes.into_iter().map(Into::into).collect());
        self
    }

    fn extract(&self, req: &SecurityRequest<'_>) -> Option<String> {
        match self.location {
            ApiKeyLocation::Header => req.get_header(&self.name).map(str::to_string),
            ApiKeyLocation::Query => req.get_query(&self.name),
            ApiKeyLocation::Cookie => req.get_cookie(&self.name),
        }
    }
}

impl SecurityProvider for ApiKeyProvider {
    fn authenticate(&self, req: &SecurityRequest<'_>) -> Authentication {
        let Some(presented) = self.extract(req) else {
            return Authentication::Missing;
        };
        match self.keys.get(&presented) {
            Some(scopes) => Authentication::Granted(Credentials {
                subject: None,
                scopes: scopes.clone(),
                claims: json!({ "key_name": self.name }),
            }),
            None => {
                debug!(key_name = %self.name, "API key rejected");
                Authentication::Invalid("unknown API key".into())
            }
        }
    }

    fn name(&self) -> &str {
        "api_key"
    }
}
