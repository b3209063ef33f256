use crate::dependency::{DepRef, Dependency};
use crate::dispatcher::{Handler, ResponseKind, ResponseMeta};
use crate::error::RegistrationError;
use crate::validator::SchemaValidator;
use http::Method;
use regex::Regex;
use serde_json::Value;
use std::fmt;

/// Request location a parameter is read from. Fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl ParameterLocation {
    /// First element of a validation issue's `loc`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
            ParameterLocation::Body => "body",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target type raw text (or a JSON body member) is coerced into.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    String,
    /// Whole-string `i64`
    Integer,
    /// Finite `f64`
    Float,
    /// `true/false/1/0/yes/no/on/off`, case-insensitive
    Boolean,
    /// Every repeated occurrence, each coerced to the inner type
    List(Box<ParamType>),
    /// Arbitrary JSON, optionally checked against a schema
    Json,
}

impl ParamType {
    pub fn list(inner: ParamType) -> Self {
        ParamType::List(Box::new(inner))
    }

    /// Placeholder type names accepted in path templates (`{id:int}`).
    pub(crate) fn from_template_name(name: &str) -> Option<Self> {
        match name {
            "int" | "integer" => Some(ParamType::Integer),
            "float" | "number" => Some(ParamType::Float),
            "str" | "string" => Some(ParamType::String),
            "bool" | "boolean" => Some(ParamType::Boolean),
            _ => None,
        }
    }
}

/// Validation constraints checked after coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub gt: Option<f64>,
    pub ge: Option<f64>,
    pub lt: Option<f64>,
    pub le: Option<f64>,
    /// Characters for strings, items for lists
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
}

/// Declaration of one typed input of a route or dependency.
///
/// ```rust
/// use fastroute::route::{ParameterMeta, ParamType};
///
/// let limit = ParameterMeta::query("limit", ParamType::Integer)
///     .default(serde_json::json!(10))
///     .ge(1.0)
///     .le(100.0);
/// assert!(!limit.required);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMeta {
    /// Name the bound value is exposed under
    pub name: String,
    /// Name looked up in the request instead of `name`
    pub alias: Option<String>,
    pub location: ParameterLocation,
    pub kind: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub constraints: Constraints,
    /// JSON Schema for body members
    pub schema: Option<Value>,
    /// Force the body to be an object keyed by parameter name
    pub embed: bool,
    /// Header lookups map `_` to `-` when no alias is set
    pub convert_underscores: bool,
}

impl ParameterMeta {
    pub fn new(name: impl Into<String>, location: ParameterLocation, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            alias: None,
            location,
            kind,
            required: true,
            default: None,
            constraints: Constraints::default(),
            schema: None,
            embed: false,
            convert_underscores: true,
        }
    }

    pub fn path(name: impl Into<String>, kind: ParamType) -> Self {
        Self::new(name, ParameterLocation::Path, kind)
    }

    pub fn query(name: impl Into<String>, kind: ParamType) -> Self {
        Self::new(name, ParameterLocation::Query, kind)
    }

    pub fn header(name: impl Into<String>, kind: ParamType) -> Self {
        Self::new(name, ParameterLocation::Header, kind)
    }

    pub fn cookie(name: impl Into<String>, kind: ParamType) -> Self {
        Self::new(name, ParameterLocation::Cookie, kind)
    }

    /// A JSON body member, unconstrained until [`schema`](Self::schema) is set.
    pub fn body(name: impl Into<String>) -> Self {
        Self::new(name, ParameterLocation::Body, ParamType::Json)
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Value used when the parameter is absent; implies optional.
    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self.required = false;
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn gt(mut self, bound: f64) -> Self {
        self.constraints.gt = Some(bound);
        self
    }

    #[must_use]
    pub fn ge(mut self, bound: f64) -> Self {
        self.constraints.ge = Some(bound);
        self
    }

    #[must_use]
    pub fn lt(mut self, bound: f64) -> Self {
        self.constraints.lt = Some(bound);
        self
    }

    #[must_use]
    pub fn le(mut self, bound: f64) -> Self {
        self.constraints.le = Some(bound);
        self
    }

    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.constraints.min_length = Some(len);
        self
    }

    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        self.constraints.max_length = Some(len);
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.constraints.pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn embed(mut self) -> Self {
        self.embed = true;
        self
    }

    #[must_use]
    pub fn keep_underscores(mut self) -> Self {
        self.convert_underscores = false;
        self
    }

    /// Key used to find the value in its request location.
    #[must_use]
    pub fn lookup_key(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        if self.location == ParameterLocation::Header && self.convert_underscores {
            return self.name.replace('_', "-");
        }
        self.name.clone()
    }

    /// Compile pattern and schema once; `owner` names the route or
    /// dependency for error messages.
    pub fn compile(&self, owner: &str) -> Result<CompiledParameter, RegistrationError> {
        let pattern = match &self.constraints.pattern {
            Some(p) => Some(Regex::new(p).map_err(|e| RegistrationError::InvalidPattern {
                parameter: format!("{owner}.{}", self.name),
                pattern: p.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };
        let validator = match &self.schema {
            Some(schema) => Some(SchemaValidator::compile(schema).map_err(|reason| {
                RegistrationError::InvalidSchema {
                    owner: format!("{owner}.{}", self.name),
                    reason,
                }
            })?),
            None => None,
        };
        Ok(CompiledParameter {
            key: self.lookup_key(),
            meta: self.clone(),
            pattern,
            validator,
        })
    }
}

/// A [`ParameterMeta`] with its regex and schema compiled, ready for binding.
#[derive(Debug, Clone)]
pub struct CompiledParameter {
    pub meta: ParameterMeta,
    /// Lookup key: alias, converted header name or plain name
    pub key: String,
    pub(crate) pattern: Option<Regex>,
    pub(crate) validator: Option<SchemaValidator>,
}

/// Declaration of one route: what to match, what to bind and what to call.
#[derive(Clone)]
pub struct RouteMeta {
    pub method: Method,
    pub path_pattern: String,
    pub handler_name: String,
    pub handler: Handler,
    pub parameters: Vec<ParameterMeta>,
    pub dependencies: Vec<DepRef>,
    pub response: ResponseMeta,
}

impl fmt::Debug for RouteMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMeta")
            .field("method", &self.method)
            .field("path_pattern", &self.path_pattern)
            .field("handler_name", &self.handler_name)
            .field("parameters", &self.parameters)
            .field("dependencies", &self.dependencies)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

impl RouteMeta {
    pub fn new(
        method: Method,
        path_pattern: impl Into<String>,
        handler_name: impl Into<String>,
        handler: Handler,
    ) -> Self {
        Self {
            method,
            path_pattern: path_pattern.into(),
            handler_name: handler_name.into(),
            handler,
            parameters: Vec::new(),
            dependencies: Vec::new(),
            response: ResponseMeta::default(),
        }
    }

    pub fn get(path: impl Into<String>, name: impl Into<String>, handler: Handler) -> Self {
        Self::new(Method::GET, path, name, handler)
    }

    pub fn post(path: impl Into<String>, name: impl Into<String>, handler: Handler) -> Self {
        Self::new(Method::POST, path, name, handler)
    }

    pub fn put(path: impl Into<String>, name: impl Into<String>, handler: Handler) -> Self {
        Self::new(Method::PUT, path, name, handler)
    }

    pub fn patch(path: impl Into<String>, name: impl Into<String>, handler: Handler) -> Self {
        Self::new(Method::PATCH, path, name, handler)
    }

    pub fn delete(path: impl Into<String>, name: impl Into<String>, handler: Handler) -> Self {
        Self::new(Method::DELETE, path, name, handler)
    }

    #[must_use]
    pub fn param(mut self, param: ParameterMeta) -> Self {
        self.parameters.push(param);
        self
    }

    #[must_use]
    pub fn depends(mut self, dep: impl Into<DepRef>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    /// Depend on `dep` under `name`, additionally requiring `scopes`.
    #[must_use]
    pub fn security<I, S>(mut self, name: impl Into<String>, dep: &Dependency, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.push(DepRef::security(name, dep, scopes));
        self
    }

    #[must_use]
    pub fn response_kind(mut self, kind: ResponseKind) -> Self {
        self.response.kind = Some(kind);
        self
    }

    /// Success status for non-`Response` replies.
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.response.status = Some(status);
        self
    }

    #[must_use]
    pub fn response_schema(mut self, schema: Value) -> Self {
        self.response.schema = Some(schema);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_converts_underscores() {
        let p = ParameterMeta::header("user_agent", ParamType::String);
        assert_eq!(p.lookup_key(), "user-agent");
        let p = ParameterMeta::header("user_agent", ParamType::String).keep_underscores();
        assert_eq!(p.lookup_key(), "user_agent");
        let p = ParameterMeta::header("token", ParamType::String).alias("X_Raw");
        assert_eq!(p.lookup_key(), "X_Raw");
    }

    #[test]
    fn test_query_alias_is_lookup_key() {
        let p = ParameterMeta::query("item_query", ParamType::String).alias("item-query");
        assert_eq!(p.lookup_key(), "item-query");
    }

    #[test]
    fn test_invalid_pattern_rejected_at_compile() {
        let p = ParameterMeta::query("q", ParamType::String).pattern("([a-z");
        let err = p.compile("search").unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidPattern { .. }));
    }

    #[test]
    fn test_default_makes_optional() {
        let p = ParameterMeta::query("limit", ParamType::Integer).default(serde_json::json!(10));
        assert!(!p.required);
        assert_eq!(p.default, Some(serde_json::json!(10)));
    }
}
