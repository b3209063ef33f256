//! # Binder Module
//!
//! Pulls raw values out of the five request locations (path, query, header,
//! cookie, body), coerces them to the declared [`ParamType`] and checks the
//! declared constraints.
//!
//! Binding never stops at the first failure. Every parameter of the route and
//! of every dependency reachable from it is evaluated, and all failures are
//! returned together so the client sees one 422 listing everything wrong.
//!
//! ## Coercion
//!
//! | Target    | Accepted text                                      |
//! |-----------|----------------------------------------------------|
//! | `Integer` | whole string parses as `i64`                       |
//! | `Float`   | parses as a finite `f64`                           |
//! | `Boolean` | `true/false/1/0/yes/no/on/off`, any case           |
//! | `String`  | anything                                           |
//! | `List`    | every repeated occurrence, each coerced            |
//! | `Json`    | JSON text (body members are already JSON)          |

use crate::dependency::DependencyGraph;
use crate::error::DispatchError;
use crate::route::{CompiledParameter, ParamType, ParameterLocation, Route};
use crate::router::ParamVec;
use crate::server::RawRequest;
use crate::validator::ValidationIssue;
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

#[cfg(test)]
mod tests;

/// Bound parameters of a route and of each dependency node it reaches.
#[derive(Debug, Clone, Default)]
pub struct BoundRequest {
    /// The route's own parameters, keyed by declared name
    pub route: Arc<Map<String, Value>>,
    /// Indexed like the dependency graph; `None` for nodes this route does not reach
    pub nodes: Vec<Option<Arc<Map<String, Value>>>>,
}

impl BoundRequest {
    /// Parameters bound for graph node `idx`.
    #[must_use]
    pub fn node(&self, idx: usize) -> Arc<Map<String, Value>> {
        self.nodes
            .get(idx)
            .and_then(Option::as_ref)
            .map(Arc::clone)
            .unwrap_or_default()
    }
}

/// Bind every parameter a matched route needs, aggregating all failures into
/// one [`DispatchError::Validation`].
pub fn bind_route(
    route: &Route,
    graph: &DependencyGraph,
    request: &RawRequest,
    path_params: &ParamVec,
) -> Result<BoundRequest, DispatchError> {
    let start = Instant::now();
    let mut binder = Binder::new(request, path_params, route.embed_body);

    let (route_params, mut issues) = binder.bind(&route.parameters);
    let mut nodes = vec![None; graph.len()];
    for &idx in &route.plan.reachable {
        let (params, node_issues) = binder.bind(&graph.nodes[idx].params);
        issues.extend(node_issues);
        nodes[idx] = Some(Arc::new(params));
    }

    // A parameter shared by the route and a dependency fails once; distinct
    // failures at the same location are all kept.
    let mut unique: Vec<ValidationIssue> = Vec::with_capacity(issues.len());
    for issue in issues {
        if !unique.contains(&issue) {
            unique.push(issue);
        }
    }

    debug!(
        route = %route.meta.path_pattern,
        params = route.parameters.len(),
        dependency_nodes = route.plan.reachable.len(),
        issues = unique.len(),
        duration_us = start.elapsed().as_micros() as u64,
        "Parameters bound"
    );

    if !unique.is_empty() {
        return Err(DispatchError::Validation(unique));
    }
    Ok(BoundRequest {
        route: Arc::new(route_params),
        nodes,
    })
}

/// Where a value was found, before coercion.
enum Raw {
    /// Text occurrences from path, query, header or cookie
    Text(Vec<String>),
    /// A JSON value taken from the body
    Json(Value),
}

/// Per-request binding state. The body is parsed at most once and a parse
/// failure is reported once no matter how many body parameters exist.
pub struct Binder<'r> {
    request: &'r RawRequest,
    path_params: &'r ParamVec,
    embed_body: bool,
    body: Option<Result<Option<Value>, ValidationIssue>>,
    body_error_reported: bool,
}

impl<'r> Binder<'r> {
    pub fn new(request: &'r RawRequest, path_params: &'r ParamVec, embed_body: bool) -> Self {
        Self {
            request,
            path_params,
            embed_body,
            body: None,
            body_error_reported: false,
        }
    }

    /// Bind `params`, returning the values bound so far and every failure.
    pub fn bind(
        &mut self,
        params: &[CompiledParameter],
    ) -> (Map<String, Value>, Vec<ValidationIssue>) {
        let mut values = Map::new();
        let mut issues = Vec::new();

        for param in params {
            let loc = self.location_of(param);
            let raw = match self.lookup(param, &mut issues) {
                Ok(raw) => raw,
                // Body unreadable; already reported.
                Err(()) => continue,
            };

            let Some(raw) = raw else {
                if let Some(default) = &param.meta.default {
                    values.insert(param.meta.name.clone(), default.clone());
                } else if param.meta.required {
                    issues.push(ValidationIssue::missing(loc));
                }
                continue;
            };

            let before = issues.len();
            let value = match raw {
                Raw::Text(texts) => coerce_texts(&param.meta.kind, texts, &loc, &mut issues),
                Raw::Json(value) => coerce_json(&param.meta.kind, value, &loc, &mut issues),
            };
            let Some(value) = value else { continue };
            if issues.len() > before {
                continue;
            }

            check_constraints(param, &value, &loc, &mut issues);
            if let Some(validator) = &param.validator {
                issues.extend(validator.validate(&value, &loc));
            }
            if issues.len() == before {
                values.insert(param.meta.name.clone(), value);
            }
        }

        (values, issues)
    }

    fn location_of(&self, param: &CompiledParameter) -> Vec<String> {
        let source = param.meta.location.as_str().to_string();
        if param.meta.location == ParameterLocation::Body && !self.embed_body {
            return vec![source];
        }
        vec![source, param.key.clone()]
    }

    /// `Ok(None)` when absent, `Err(())` when the body could not be read.
    fn lookup(
        &mut self,
        param: &CompiledParameter,
        issues: &mut Vec<ValidationIssue>,
    ) -> Result<Option<Raw>, ()> {
        let key = param.key.as_str();
        let is_list = matches!(param.meta.kind, ParamType::List(_));
        let texts: Vec<String> = match param.meta.location {
            ParameterLocation::Path => self
                .path_params
                .iter()
                .rfind(|(k, _)| k.as_ref() == param.meta.name)
                .map(|(_, v)| vec![v.clone()])
                .unwrap_or_default(),
            ParameterLocation::Query if is_list => self.request.query_values(key),
            ParameterLocation::Query => self.request.query_value(key).into_iter().collect(),
            ParameterLocation::Header if is_list => self
                .request
                .get_header_values(key)
                .into_iter()
                .map(str::to_string)
                .collect(),
            ParameterLocation::Header => self
                .request
                .get_header(key)
                .map(str::to_string)
                .into_iter()
                .collect(),
            ParameterLocation::Cookie => self.request.get_cookie(key).into_iter().collect(),
            ParameterLocation::Body => {
                return self.lookup_body(key, issues).map(|v| v.map(Raw::Json));
            }
        };
        Ok((!texts.is_empty()).then_some(Raw::Text(texts)))
    }

    fn lookup_body(
        &mut self,
        key: &str,
        issues: &mut Vec<ValidationIssue>,
    ) -> Result<Option<Value>, ()> {
        let embed = self.embed_body;
        let outcome = match self.parsed_body() {
            Err(issue) => Err(issue),
            Ok(None) => Ok(None),
            Ok(Some(body)) if !embed => Ok(Some(body.clone())),
            Ok(Some(Value::Object(members))) => Ok(members.get(key).cloned()),
            Ok(Some(other)) => Err(ValidationIssue::new(
                vec!["body".to_string()],
                "dict_type",
                "Input should be a valid dictionary or object to extract fields from",
                other.clone(),
            )),
        };
        outcome.map_err(|issue| {
            if !self.body_error_reported {
                self.body_error_reported = true;
                issues.push(issue);
            }
        })
    }

    fn parsed_body(&mut self) -> Result<Option<&Value>, ValidationIssue> {
        let request = self.request;
        let parsed = self.body.get_or_insert_with(|| {
            if request.body.iter().all(u8::is_ascii_whitespace) {
                return Ok(None);
            }
            serde_json::from_slice::<Value>(&request.body)
                .map(Some)
                .map_err(|e| {
                    ValidationIssue::new(
                        vec!["body".to_string(), e.column().to_string()],
                        "json_invalid",
                        format!("JSON decode error: {e}"),
                        Value::String(String::from_utf8_lossy(&request.body).into_owned()),
                    )
                })
        });
        match &*parsed {
            Ok(value) => Ok(value.as_ref()),
            Err(issue) => Err(issue.clone()),
        }
    }
}

fn coerce_texts(
    kind: &ParamType,
    mut texts: Vec<String>,
    loc: &[String],
    issues: &mut Vec<ValidationIssue>,
) -> Option<Value> {
    if let ParamType::List(inner) = kind {
        let mut items = Vec::with_capacity(texts.len());
        for (i, text) in texts.into_iter().enumerate() {
            let mut item_loc = loc.to_vec();
            item_loc.push(i.to_string());
            if let Some(v) = coerce_text(inner, text, &item_loc, issues) {
                items.push(v);
            }
        }
        return Some(Value::Array(items));
    }
    let text = texts.pop()?;
    coerce_text(kind, text, loc, issues)
}

fn coerce_text(
    kind: &ParamType,
    text: String,
    loc: &[String],
    issues: &mut Vec<ValidationIssue>,
) -> Option<Value> {
    let fail = |issues: &mut Vec<ValidationIssue>, ty: &str, msg: &str, text: String| -> Option<Value> {
        issues.push(ValidationIssue::new(loc.to_vec(), ty, msg, Value::String(text)));
        None
    };
    match kind {
        ParamType::String => Some(Value::String(text)),
        ParamType::Integer => match text.parse::<i64>() {
            Ok(n) => Some(Value::from(n)),
            Err(_) => fail(
                issues,
                "int_parsing",
                "Input should be a valid integer, unable to parse string as an integer",
                text,
            ),
        },
        ParamType::Float => match text.parse::<f64>() {
            Ok(f) if f.is_finite() => Number::from_f64(f).map(Value::Number),
            Ok(_) => fail(issues, "finite_number", "Input should be a finite number", text),
            Err(_) => fail(
                issues,
                "float_parsing",
                "Input should be a valid number, unable to parse string as a number",
                text,
            ),
        },
        ParamType::Boolean => match parse_bool(&text) {
            Some(b) => Some(Value::Bool(b)),
            None => fail(
                issues,
                "bool_parsing",
                "Input should be a valid boolean, unable to interpret input",
                text,
            ),
        },
        ParamType::Json => match serde_json::from_str::<Value>(&text) {
            Ok(v) => Some(v),
            Err(_) => fail(issues, "json_invalid", "Input should be valid JSON", text),
        },
        // Nested lists have no textual form.
        ParamType::List(_) => fail(issues, "list_type", "Input should be a valid list", text),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn coerce_json(
    kind: &ParamType,
    value: Value,
    loc: &[String],
    issues: &mut Vec<ValidationIssue>,
) -> Option<Value> {
    let type_error = |issues: &mut Vec<ValidationIssue>, ty: &str, msg: &str, value: Value| -> Option<Value> {
        issues.push(ValidationIssue::new(loc.to_vec(), ty, msg, value));
        None
    };
    match (kind, value) {
        (ParamType::Json, value) => Some(value),
        (ParamType::String, Value::String(s)) => Some(Value::String(s)),
        (ParamType::String, other) => {
            type_error(issues, "string_type", "Input should be a valid string", other)
        }
        (ParamType::Integer, Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Some(Value::from(i))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Some(Value::from(f as i64))
                    }
                    _ => type_error(
                        issues,
                        "int_from_float",
                        "Input should be a valid integer, got a number with a fractional part",
                        Value::Number(n),
                    ),
                }
            }
        }
        (ParamType::Float, Value::Number(n)) => Some(Value::Number(n)),
        (ParamType::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
        (ParamType::Integer | ParamType::Float | ParamType::Boolean, Value::String(s)) => {
            coerce_text(kind, s, loc, issues)
        }
        (ParamType::Integer, other) => {
            type_error(issues, "int_type", "Input should be a valid integer", other)
        }
        (ParamType::Float, other) => {
            type_error(issues, "float_type", "Input should be a valid number", other)
        }
        (ParamType::Boolean, other) => {
            type_error(issues, "bool_type", "Input should be a valid boolean", other)
        }
        (ParamType::List(inner), Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let mut item_loc = loc.to_vec();
                item_loc.push(i.to_string());
                if let Some(v) = coerce_json(inner, item, &item_loc, issues) {
                    out.push(v);
                }
            }
            Some(Value::Array(out))
        }
        (ParamType::List(_), other) => {
            type_error(issues, "list_type", "Input should be a valid list", other)
        }
    }
}

fn check_constraints(
    param: &CompiledParameter,
    value: &Value,
    loc: &[String],
    issues: &mut Vec<ValidationIssue>,
) {
    let c = &param.meta.constraints;
    match value {
        Value::Array(items) => {
            if let Some(min) = c.min_length.filter(|&min| items.len() < min) {
                issues.push(ValidationIssue::new(
                    loc.to_vec(),
                    "too_short",
                    format!("List should have at least {min} items after validation"),
                    value.clone(),
                ));
            }
            if let Some(max) = c.max_length.filter(|&max| items.len() > max) {
                issues.push(ValidationIssue::new(
                    loc.to_vec(),
                    "too_long",
                    format!("List should have at most {max} items after validation"),
                    value.clone(),
                ));
            }
            for (i, item) in items.iter().enumerate() {
                let mut item_loc = loc.to_vec();
                item_loc.push(i.to_string());
                check_scalar(param, item, &item_loc, issues);
            }
        }
        Value::String(s) => {
            let len = s.chars().count();
            if let Some(min) = c.min_length.filter(|&min| len < min) {
                issues.push(ValidationIssue::new(
                    loc.to_vec(),
                    "string_too_short",
                    format!("String should have at least {min} characters"),
                    value.clone(),
                ));
            }
            if let Some(max) = c.max_length.filter(|&max| len > max) {
                issues.push(ValidationIssue::new(
                    loc.to_vec(),
                    "string_too_long",
                    format!("String should have at most {max} characters"),
                    value.clone(),
                ));
            }
            check_scalar(param, value, loc, issues);
        }
        _ => check_scalar(param, value, loc, issues),
    }
}

/// Numeric bounds and pattern, which apply to scalars and to list items.
fn check_scalar(
    param: &CompiledParameter,
    value: &Value,
    loc: &[String],
    issues: &mut Vec<ValidationIssue>,
) {
    let c = &param.meta.constraints;
    if let Some(n) = value.as_f64() {
        let bounds: [(Option<f64>, fn(f64, f64) -> bool, &str, &str); 4] = [
            (c.gt, |n, b| n > b, "greater_than", "greater than"),
            (c.ge, |n, b| n >= b, "greater_than_equal", "greater than or equal to"),
            (c.lt, |n, b| n < b, "less_than", "less than"),
            (c.le, |n, b| n <= b, "less_than_equal", "less than or equal to"),
        ];
        for (bound, holds, kind, phrase) in bounds {
            let Some(bound) = bound else { continue };
            if !holds(n, bound) {
                issues.push(ValidationIssue::new(
                    loc.to_vec(),
                    kind,
                    format!("Input should be {phrase} {bound}"),
                    value.clone(),
                ));
            }
        }
    }
    if let (Some(re), Value::String(s)) = (&param.pattern, value) {
        if !re.is_match(s) {
            issues.push(ValidationIssue::new(
                loc.to_vec(),
                "string_pattern_mismatch",
                format!("String should match pattern '{}'", re.as_str()),
                value.clone(),
            ));
        }
    }
}
