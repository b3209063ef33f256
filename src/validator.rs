//! # Validator Module
//!
//! Structured validation failures and the schema capability used for request
//! bodies and declared response schemas.
//!
//! Schemas are compiled exactly once, while routes are registered, and the
//! compiled validator is shared read-only by every request afterwards.
//! Failures are reported as [`ValidationIssue`]s whose `loc` names the request
//! location, the parameter and the nested path inside it, for example
//! `["body", "address", "zip"]`.

use jsonschema::error::ValidationErrorKind;
use jsonschema::JSONSchema;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One input constraint violation.
///
/// Serializes to the `{"loc", "msg", "type", "input"}` shape clients see in
/// a 422 response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// Location: request source, parameter name, then the nested path
    pub loc: Vec<String>,
    /// Human readable description of the failure
    #[serde(rename = "msg")]
    pub message: String,
    /// Machine readable constraint identifier (`missing`, `int_parsing`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// The received value, `null` when the value was absent
    pub input: Value,
}

impl ValidationIssue {
    pub fn new(
        loc: Vec<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
        input: Value,
    ) -> Self {
        ValidationIssue {
            loc,
            message: message.into(),
            kind: kind.into(),
            input,
        }
    }

    /// A required value that was not supplied at all.
    pub fn missing(loc: Vec<String>) -> Self {
        Self::new(loc, "missing", "Field required", Value::Null)
    }

    /// The location joined with dots, e.g. `body.address.zip`.
    #[must_use]
    pub fn dotted_loc(&self) -> String {
        self.loc.join(".")
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.dotted_loc(), self.message)
    }
}

/// A JSON Schema compiled at registration time.
///
/// Cloning is cheap: the compiled form lives behind an `Arc`.
#[derive(Clone)]
pub struct SchemaValidator {
    schema: Arc<Value>,
    compiled: Arc<JSONSchema>,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl SchemaValidator {
    /// Compile `schema`, returning the compiler's message on failure.
    pub fn compile(schema: &Value) -> Result<Self, String> {
        let compiled = JSONSchema::compile(schema).map_err(|e| e.to_string())?;
        Ok(Self {
            schema: Arc::new(schema.clone()),
            compiled: Arc::new(compiled),
        })
    }

    /// The structural description this validator was compiled from.
    #[must_use]
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    #[must_use]
    pub fn is_valid(&self, instance: &Value) -> bool {
        self.compiled.is_valid(instance)
    }

    /// Validate `instance`, reporting every failure with `prefix` prepended to
    /// its location.
    #[must_use]
    pub fn validate(&self, instance: &Value, prefix: &[String]) -> Vec<ValidationIssue> {
        let errors = match self.compiled.validate(instance) {
            Ok(()) => return Vec::new(),
            Err(errors) => errors,
        };

        errors
            .map(|error| {
                let mut loc = prefix.to_vec();
                loc.extend(error.instance_path.clone().into_vec());
                let kind = match &error.kind {
                    ValidationErrorKind::Required { property } => {
                        loc.push(
                            property
                                .as_str()
                                .map(str::to_string)
                                .unwrap_or_else(|| property.to_string()),
                        );
                        "missing"
                    }
                    ValidationErrorKind::Type { .. } => "type_error",
                    ValidationErrorKind::Minimum { .. }
                    | ValidationErrorKind::Maximum { .. }
                    | ValidationErrorKind::ExclusiveMinimum { .. }
                    | ValidationErrorKind::ExclusiveMaximum { .. }
                    | ValidationErrorKind::MultipleOf { .. } => "range_error",
                    ValidationErrorKind::MinLength { .. }
                    | ValidationErrorKind::MaxLength { .. }
                    | ValidationErrorKind::MinItems { .. }
                    | ValidationErrorKind::MaxItems { .. } => "length_error",
                    ValidationErrorKind::Pattern { .. } => "string_pattern_mismatch",
                    ValidationErrorKind::Enum { .. } | ValidationErrorKind::Constant { .. } => {
                        "enum"
                    }
                    ValidationErrorKind::AdditionalProperties { .. } => "extra_forbidden",
                    ValidationErrorKind::Format { .. } => "format_error",
                    _ => "schema_error",
                };
                let input = if kind == "missing" {
                    Value::Null
                } else {
                    error.instance.clone().into_owned()
                };
                ValidationIssue::new(loc, kind, error.to_string(), input)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person_schema() -> Value {
        json!({
            "type": "object",
            "required": ["name", "address"],
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": 0},
                "address": {
                    "type": "object",
                    "required": ["zip"],
                    "properties": {"zip": {"type": "string"}}
                }
            }
        })
    }

    #[test]
    fn test_valid_instance_has_no_issues() {
        let v = SchemaValidator::compile(&person_schema()).unwrap();
        let issues = v.validate(
            &json!({"name": "Alice", "address": {"zip": "12345"}}),
            &["body".to_string()],
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_nested_missing_field_reports_full_path() {
        let v = SchemaValidator::compile(&person_schema()).unwrap();
        let issues = v.validate(
            &json!({"name": "Alice", "address": {}}),
            &["body".to_string()],
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].dotted_loc(), "body.address.zip");
        assert_eq!(issues[0].kind, "missing");
    }

    #[test]
    fn test_multiple_failures_are_all_reported() {
        let v = SchemaValidator::compile(&person_schema()).unwrap();
        let issues = v.validate(
            &json!({"name": 5, "age": -1, "address": {"zip": "1"}}),
            &["body".to_string()],
        );
        assert_eq!(issues.len(), 2);
        let locs: Vec<String> = issues.iter().map(|i| i.dotted_loc()).collect();
        assert!(locs.contains(&"body.name".to_string()));
        assert!(locs.contains(&"body.age".to_string()));
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        assert!(SchemaValidator::compile(&json!({"type": 12})).is_err());
    }
}
