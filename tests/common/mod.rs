#![allow(dead_code)]

use fastroute::dispatcher::HandlerResponse;
use fastroute::server::{AppService, RawRequest};
use serde_json::Value;

/// JSON body of a response, `Null` when the body is not JSON.
pub fn body(resp: &HandlerResponse) -> Value {
    resp.json_body().cloned().unwrap_or(Value::Null)
}

/// The `detail` list of a 422 response.
pub fn issues(resp: &HandlerResponse) -> Vec<Value> {
    match body(resp).get("detail") {
        Some(Value::Array(items)) => items.clone(),
        other => panic!("expected a validation detail list, got {other:?}"),
    }
}

/// `loc` of every issue, joined with dots.
pub fn issue_locs(resp: &HandlerResponse) -> Vec<String> {
    issues(resp)
        .iter()
        .map(|issue| {
            issue["loc"]
                .as_array()
                .map(|loc| {
                    loc.iter()
                        .map(|part| match part {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(".")
                })
                .unwrap_or_default()
        })
        .collect()
}

pub async fn send(app: &AppService, request: RawRequest) -> HandlerResponse {
    app.dispatch(request).await.response
}
