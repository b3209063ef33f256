use super::Binder;
use crate::route::{CompiledParameter, ParamType, ParameterMeta};
use crate::router::ParamVec;
use crate::server::RawRequest;
use serde_json::json;
use std::sync::Arc;

fn compile(params: Vec<ParameterMeta>) -> Vec<CompiledParameter> {
    params
        .into_iter()
        .map(|p| p.compile("test").unwrap())
        .collect()
}

fn path(pairs: &[(&str, &str)]) -> ParamVec {
    pairs
        .iter()
        .map(|(k, v)| (Arc::from(*k), v.to_string()))
        .collect()
}

#[test]
fn test_path_integer_coerced() {
    let req = RawRequest::get("/items/42");
    let pp = path(&[("item_id", "42")]);
    let params = compile(vec![ParameterMeta::path("item_id", ParamType::Integer)]);
    let (values, issues) = Binder::new(&req, &pp, false).bind(&params);
    assert!(issues.is_empty());
    assert_eq!(values["item_id"], json!(42));
}

#[test]
fn test_integer_rejects_decimals_and_suffixes() {
    for raw in ["abc", "4.2", "42x", ""] {
        let req = RawRequest::get("/");
        let pp = path(&[("item_id", raw)]);
        let params = compile(vec![ParameterMeta::path("item_id", ParamType::Integer)]);
        let (values, issues) = Binder::new(&req, &pp, false).bind(&params);
        assert!(values.is_empty(), "{raw} should not bind");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, "int_parsing");
        assert_eq!(issues[0].loc, vec!["path", "item_id"]);
        assert_eq!(issues[0].input, json!(raw));
    }
}

#[test]
fn test_boolean_spellings() {
    let cases = [
        ("true", true),
        ("FALSE", false),
        ("1", true),
        ("0", false),
        ("Yes", true),
        ("no", false),
        ("on", true),
        ("Off", false),
    ];
    for (raw, expected) in cases {
        let req = RawRequest::get(&format!("/?flag={raw}"));
        let pp = ParamVec::new();
        let params = compile(vec![ParameterMeta::query("flag", ParamType::Boolean)]);
        let (values, issues) = Binder::new(&req, &pp, false).bind(&params);
        assert!(issues.is_empty(), "{raw}");
        assert_eq!(values["flag"], json!(expected), "{raw}");
    }

    let req = RawRequest::get("/?flag=maybe");
    let pp = ParamVec::new();
    let params = compile(vec![ParameterMeta::query("flag", ParamType::Boolean)]);
    let (_, issues) = Binder::new(&req, &pp, false).bind(&params);
    assert_eq!(issues[0].kind, "bool_parsing");
}

#[test]
fn test_float_must_be_finite() {
    let req = RawRequest::get("/?price=inf&ratio=0.5");
    let pp = ParamVec::new();
    let params = compile(vec![
        ParameterMeta::query("price", ParamType::Float),
        ParameterMeta::query("ratio", ParamType::Float),
    ]);
    let (values, issues) = Binder::new(&req, &pp, false).bind(&params);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, "finite_number");
    assert_eq!(values["ratio"], json!(0.5));
}

#[test]
fn test_all_failures_collected() {
    let req = RawRequest::get("/?limit=abc&offset=-1");
    let pp = ParamVec::new();
    let params = compile(vec![
        ParameterMeta::query("limit", ParamType::Integer),
        ParameterMeta::query("offset", ParamType::Integer).ge(0.0),
        ParameterMeta::query("q", ParamType::String),
    ]);
    let (_, issues) = Binder::new(&req, &pp, false).bind(&params);
    let kinds: Vec<&str> = issues.iter().map(|i| i.kind.as_str()).collect();
    assert_eq!(kinds, vec!["int_parsing", "greater_than_equal", "missing"]);
    assert_eq!(issues[1].message, "Input should be greater than or equal to 0");
    assert_eq!(issues[2].loc, vec!["query", "q"]);
}

#[test]
fn test_default_and_optional() {
    let req = RawRequest::get("/");
    let pp = ParamVec::new();
    let params = compile(vec![
        ParameterMeta::query("limit", ParamType::Integer).default(json!(10)),
        ParameterMeta::query("q", ParamType::String).optional(),
    ]);
    let (values, issues) = Binder::new(&req, &pp, false).bind(&params);
    assert!(issues.is_empty());
    assert_eq!(values["limit"], json!(10));
    assert!(!values.contains_key("q"));
}

#[test]
fn test_repeated_query_collects_list() {
    let req = RawRequest::get("/?tag=1&tag=2&tag=x");
    let pp = ParamVec::new();
    let params = compile(vec![ParameterMeta::query(
        "tag",
        ParamType::list(ParamType::Integer),
    )]);
    let (values, issues) = Binder::new(&req, &pp, false).bind(&params);
    assert!(values.is_empty());
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].loc, vec!["query", "tag", "2"]);

    let req = RawRequest::get("/?tag=a&tag=b");
    let params = compile(vec![
        ParameterMeta::query("tag", ParamType::list(ParamType::String)).max_length(1),
    ]);
    let (_, issues) = Binder::new(&req, &pp, false).bind(&params);
    assert_eq!(issues[0].kind, "too_long");
}

#[test]
fn test_header_lookup_case_and_underscores() {
    let req = RawRequest::get("/").header("User-Agent", "curl/8");
    let pp = ParamVec::new();
    let params = compile(vec![ParameterMeta::header("user_agent", ParamType::String)]);
    let (values, issues) = Binder::new(&req, &pp, false).bind(&params);
    assert!(issues.is_empty());
    assert_eq!(values["user_agent"], json!("curl/8"));

    let params = compile(vec![
        ParameterMeta::header("x_token", ParamType::String).keep_underscores()
    ]);
    let req = RawRequest::get("/").header("x-token", "abc");
    let (_, issues) = Binder::new(&req, &pp, false).bind(&params);
    assert_eq!(issues[0].loc, vec!["header", "x_token"]);
}

#[test]
fn test_cookie_and_alias() {
    let req = RawRequest::get("/?item-query=shoes").header("cookie", "session=s1; theme=dark");
    let pp = ParamVec::new();
    let params = compile(vec![
        ParameterMeta::cookie("session", ParamType::String),
        ParameterMeta::query("item_query", ParamType::String).alias("item-query"),
    ]);
    let (values, issues) = Binder::new(&req, &pp, false).bind(&params);
    assert!(issues.is_empty());
    assert_eq!(values["session"], json!("s1"));
    assert_eq!(values["item_query"], json!("shoes"));
}

#[test]
fn test_string_constraints() {
    let req = RawRequest::get("/?code=ab&name=toolongvalue");
    let pp = ParamVec::new();
    let params = compile(vec![
        ParameterMeta::query("code", ParamType::String)
            .min_length(3)
            .pattern("^[A-Z]+$"),
        ParameterMeta::query("name", ParamType::String).max_length(5),
    ]);
    let (_, issues) = Binder::new(&req, &pp, false).bind(&params);
    let kinds: Vec<&str> = issues.iter().map(|i| i.kind.as_str()).collect();
    assert_eq!(
        kinds,
        vec!["string_too_short", "string_pattern_mismatch", "string_too_long"]
    );
}

#[test]
fn test_single_body_is_whole_body() {
    let body = json!({"name": "Alice", "age": 30});
    let req = RawRequest::post("/users").json(&body);
    let pp = ParamVec::new();
    let params = compile(vec![ParameterMeta::body("user").schema(json!({
        "type": "object",
        "required": ["name"],
        "properties": {"name": {"type": "string"}, "age": {"type": "integer"}}
    }))]);
    let (values, issues) = Binder::new(&req, &pp, false).bind(&params);
    assert!(issues.is_empty());
    assert_eq!(values["user"], body);
}

#[test]
fn test_nested_body_failure_location() {
    let body = json!({"address": {"zip": 123}});
    let req = RawRequest::post("/").json(&body);
    let pp = ParamVec::new();
    let params = compile(vec![ParameterMeta::body("user").schema(json!({
        "type": "object",
        "properties": {
            "address": {
                "type": "object",
                "properties": {"zip": {"type": "string"}}
            }
        }
    }))]);
    let (_, issues) = Binder::new(&req, &pp, false).bind(&params);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].loc, vec!["body", "address", "zip"]);
    assert_eq!(issues[0].kind, "type_error");
}

#[test]
fn test_embedded_body_members() {
    let req = RawRequest::post("/").json(&json!({"item": {"id": 1}, "importance": 5}));
    let pp = ParamVec::new();
    let params = compile(vec![
        ParameterMeta::body("item"),
        ParameterMeta::new("importance", crate::route::ParameterLocation::Body, ParamType::Integer)
            .gt(0.0),
        ParameterMeta::body("note"),
    ]);
    let (values, issues) = Binder::new(&req, &pp, true).bind(&params);
    assert_eq!(values["item"], json!({"id": 1}));
    assert_eq!(values["importance"], json!(5));
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].loc, vec!["body", "note"]);
    assert_eq!(issues[0].kind, "missing");
}

#[test]
fn test_invalid_json_reported_once() {
    let req = RawRequest::post("/").body("{not json");
    let pp = ParamVec::new();
    let params = compile(vec![ParameterMeta::body("a"), ParameterMeta::body("b")]);
    let (values, issues) = Binder::new(&req, &pp, true).bind(&params);
    assert!(values.is_empty());
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, "json_invalid");
    assert_eq!(issues[0].loc[0], "body");
}

#[test]
fn test_missing_body() {
    let req = RawRequest::post("/");
    let pp = ParamVec::new();
    let params = compile(vec![ParameterMeta::body("user")]);
    let (_, issues) = Binder::new(&req, &pp, false).bind(&params);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].loc, vec!["body"]);
    assert_eq!(issues[0].kind, "missing");
}
