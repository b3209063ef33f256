use super::{MatchOutcome, Router};
use crate::dependency::DependencyOverrides;
use crate::dispatcher::Handler;
use crate::error::{DispatchError, RegistrationError};
use crate::route::{compile_routes, ParamType, ParameterMeta, RouteMeta};
use http::Method;
use serde_json::{json, Value};

fn build(routes: &[(Method, &str, &str)]) -> Result<Router, RegistrationError> {
    let metas = routes
        .iter()
        .map(|(method, path, name)| {
            RouteMeta::new(
                method.clone(),
                *path,
                *name,
                Handler::sync(|_req| Ok(Value::Null)),
            )
        })
        .collect();
    let (compiled, _graph) = compile_routes(metas, &DependencyOverrides::new())?;
    Router::new(compiled)
}

fn matched(router: &Router, method: Method, path: &str) -> (String, Vec<(String, String)>) {
    match router.route(&method, path) {
        MatchOutcome::Matched(m) => (
            m.handler_name().to_string(),
            m.path_params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ),
        other => panic!("expected a match for {method} {path}, got {other:?}"),
    }
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_root_path() {
    let router = build(&[(Method::GET, "/", "root")]).unwrap();
    assert_eq!(matched(&router, Method::GET, "/"), ("root".into(), vec![]));
}

#[test]
fn test_literal_beats_placeholder() {
    let router = build(&[
        (Method::GET, "/items/{id}", "get_item"),
        (Method::GET, "/items/new", "new_item"),
    ])
    .unwrap();
    assert_eq!(
        matched(&router, Method::GET, "/items/new"),
        ("new_item".into(), vec![])
    );
    assert_eq!(
        matched(&router, Method::GET, "/items/42"),
        ("get_item".into(), pairs(&[("id", "42")]))
    );
}

#[test]
fn test_backtracks_out_of_literal_branch() {
    let router = build(&[
        (Method::GET, "/a/b/d", "literal"),
        (Method::GET, "/a/{x}/c", "param"),
    ])
    .unwrap();
    assert_eq!(
        matched(&router, Method::GET, "/a/b/c"),
        ("param".into(), pairs(&[("x", "b")]))
    );
    assert_eq!(
        matched(&router, Method::GET, "/a/b/d"),
        ("literal".into(), vec![])
    );
}

#[test]
fn test_nested_params_in_template_order() {
    let router = build(&[(
        Method::GET,
        "/users/{user_id}/posts/{post_id}",
        "get_post",
    )])
    .unwrap();
    assert_eq!(
        matched(&router, Method::GET, "/users/7/posts/99"),
        (
            "get_post".into(),
            pairs(&[("user_id", "7"), ("post_id", "99")])
        )
    );
}

#[test]
fn test_same_shape_other_method_is_405() {
    let router = build(&[
        (Method::POST, "/items", "create"),
        (Method::GET, "/items", "list"),
    ])
    .unwrap();
    match router.route(&Method::DELETE, "/items") {
        MatchOutcome::MethodNotAllowed(allowed) => {
            assert_eq!(allowed, vec![Method::GET, Method::POST]);
        }
        other => panic!("expected 405, got {other:?}"),
    }
}

#[test]
fn test_no_shape_is_404() {
    let router = build(&[(Method::GET, "/items/{id}", "get_item")]).unwrap();
    assert!(matches!(
        router.route(&Method::GET, "/users/1"),
        MatchOutcome::NotFound
    ));
    assert!(matches!(
        router.route(&Method::GET, "/items/1/extra"),
        MatchOutcome::NotFound
    ));
}

#[test]
fn test_empty_segments_ignored() {
    let router = build(&[(Method::GET, "/items/{id}", "get_item")]).unwrap();
    assert_eq!(
        matched(&router, Method::GET, "//items//42/"),
        ("get_item".into(), pairs(&[("id", "42")]))
    );
}

#[test]
fn test_captures_are_percent_decoded() {
    let router = build(&[(Method::GET, "/files/{name}", "get_file")]).unwrap();
    assert_eq!(
        matched(&router, Method::GET, "/files/annual%20report"),
        ("get_file".into(), pairs(&[("name", "annual report")]))
    );
}

#[test]
fn test_identical_shapes_are_ambiguous() {
    let err = build(&[
        (Method::GET, "/items/{id}", "by_id"),
        (Method::GET, "/items/{slug}", "by_slug"),
    ])
    .unwrap_err();
    assert!(matches!(err, RegistrationError::AmbiguousRoute { .. }));
}

#[test]
fn test_same_shape_different_methods_allowed() {
    let router = build(&[
        (Method::GET, "/items/{id}", "get_item"),
        (Method::DELETE, "/items/{id}", "delete_item"),
    ])
    .unwrap();
    assert_eq!(router.route_count(), 2);
    assert_eq!(
        matched(&router, Method::DELETE, "/items/3").0,
        "delete_item"
    );
}

#[test]
fn test_resolve_turns_misses_into_errors() {
    let router = build(&[(Method::GET, "/items", "list")]).unwrap();
    let err = router.resolve(&Method::PUT, "/items").unwrap_err();
    assert!(matches!(err, DispatchError::MethodNotAllowed { .. }));
    assert_eq!(err.status(), 405);
    let err = router.resolve(&Method::GET, "/nothing").unwrap_err();
    assert_eq!(err.status(), 404);
}

#[test]
fn test_path_patterns_in_registration_order() {
    let router = build(&[
        (Method::GET, "/b", "b"),
        (Method::POST, "/a", "a"),
    ])
    .unwrap();
    assert_eq!(router.path_patterns(), vec!["GET /b", "POST /a"]);
}

fn compile_one(meta: RouteMeta) -> Result<Router, RegistrationError> {
    let (compiled, _graph) = compile_routes(vec![meta], &DependencyOverrides::new())?;
    Router::new(compiled)
}

fn noop() -> Handler {
    Handler::sync(|_req| Ok(Value::Null))
}

#[test]
fn test_duplicate_parameter_rejected() {
    let meta = RouteMeta::get("/items", "list", noop())
        .param(ParameterMeta::query("limit", ParamType::Integer))
        .param(ParameterMeta::query("limit", ParamType::String));
    assert!(matches!(
        compile_one(meta),
        Err(RegistrationError::DuplicateParameter { .. })
    ));
}

#[test]
fn test_same_name_in_other_location_allowed() {
    let meta = RouteMeta::get("/items", "list", noop())
        .param(ParameterMeta::query("token", ParamType::String))
        .param(ParameterMeta::header("token", ParamType::String));
    assert!(compile_one(meta).is_ok());
}

#[test]
fn test_bad_pattern_rejected() {
    let meta = RouteMeta::get("/items", "list", noop())
        .param(ParameterMeta::query("q", ParamType::String).pattern("(unclosed"));
    let err = compile_one(meta).unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidPattern { .. }));
    assert!(err.to_string().contains("GET /items.q"));
}

#[test]
fn test_bad_schemas_rejected() {
    let body = RouteMeta::post("/items", "create", noop())
        .param(ParameterMeta::body("item").schema(json!({ "type": 12 })));
    assert!(matches!(
        compile_one(body),
        Err(RegistrationError::InvalidSchema { .. })
    ));

    let response =
        RouteMeta::get("/items", "list", noop()).response_schema(json!({ "type": 12 }));
    match compile_one(response) {
        Err(RegistrationError::InvalidSchema { owner, .. }) => {
            assert_eq!(owner, "GET /items response");
        }
        other => panic!("expected an invalid response schema, got {other:?}"),
    }
}
