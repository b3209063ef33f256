use fastroute::config::AppConfig;
use fastroute::dispatcher::Handler;
use fastroute::logging::LogFormat;
use fastroute::server::{AppBuilder, RawRequest};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

mod common;
use common::send;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = config_file(
        "service_name: inventory\nmax_body_bytes: 0x40\nallow_header: false\nlog:\n  level: debug\n  format: pretty\n",
    );
    let config = AppConfig::load(file.path()).unwrap();
    assert_eq!(config.service_name, "inventory");
    assert_eq!(config.max_body_bytes, 64);
    assert!(!config.allow_header);
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.log.format, LogFormat::Pretty);
}

#[test]
fn test_missing_file_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    let err = AppConfig::load(&path).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("failed to read config file"));
    assert!(message.contains("absent.yaml"));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let file = config_file("max_body_bytes: [1, 2]\n");
    let err = AppConfig::load(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse config file"));
}

#[tokio::test]
async fn test_loaded_limits_reach_the_pipeline() {
    let file = config_file("max_body_bytes: 16\nallow_header: false\n");
    let config = AppConfig::load(file.path()).unwrap();
    let app = AppBuilder::new()
        .with_config(config)
        .post("/upload", "upload", Handler::sync(|_req| Ok(json!({ "ok": true }))))
        .build()
        .unwrap();

    assert_eq!(app.config().max_body_bytes, 16);

    let resp = send(&app, RawRequest::post("/upload").body(vec![b'x'; 17])).await;
    assert_eq!(resp.status, 413);

    let resp = send(&app, RawRequest::post("/upload").body(vec![b'x'; 16])).await;
    assert_eq!(resp.status, 200);

    let resp = send(&app, RawRequest::get("/upload")).await;
    assert_eq!(resp.status, 405);
    assert_eq!(resp.get_header("allow"), None);
}
