use fastroute::dependency::Dependency;
use fastroute::dispatcher::Handler;
use fastroute::error::DispatchError;
use fastroute::route::RouteMeta;
use fastroute::server::{AppBuilder, AppService, RawRequest, WireResponse};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::oneshot;

type Log = Arc<Mutex<Vec<String>>>;

fn notify_app(log: &Log) -> AppService {
    let handler_log = Arc::clone(log);
    let dep_log = Arc::clone(log);
    let audit = Dependency::sync("audit", move |args| {
        let log = Arc::clone(&dep_log);
        args.background().add("audit", async move {
            log.lock().push("audit".to_string());
            Ok(())
        });
        Ok(())
    })
    .build();

    AppBuilder::new()
        .route(
            RouteMeta::post(
                "/orders",
                "create_order",
                Handler::sync(move |req| {
                    let log = Arc::clone(&handler_log);
                    handler_log.lock().push("handler".to_string());
                    req.background().add("email", async move {
                        log.lock().push("email".to_string());
                        Ok(())
                    });
                    req.background()
                        .add("flaky", async { Err(anyhow::anyhow!("smtp unavailable")) });
                    Ok(json!({ "queued": true }))
                }),
            )
            .depends(&audit)
            .status(202),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_dispatch_returns_tasks_unrun() {
    let log: Log = Arc::default();
    let app = notify_app(&log);

    let dispatched = app.dispatch(RawRequest::post("/orders")).await;
    assert_eq!(dispatched.response.status, 202);
    assert_eq!(dispatched.background.len(), 3);
    assert_eq!(*log.lock(), vec!["handler"]);

    dispatched.background.run().await;
    assert_eq!(*log.lock(), vec!["handler", "audit", "email"]);
}

#[tokio::test]
async fn test_serve_sends_before_running_tasks() {
    let log: Log = Arc::default();
    let app = notify_app(&log);

    let (tx, rx) = oneshot::channel::<WireResponse>();
    let handle = app
        .serve(RawRequest::post("/orders"), tx)
        .await
        .unwrap()
        .expect("tasks were queued");

    let wire = rx.await.unwrap();
    assert_eq!(wire.status, 202);
    assert_eq!(wire.reason, "Accepted");
    assert_eq!(wire.body, br#"{"queued":true}"#.to_vec());

    handle.await.unwrap();
    assert_eq!(*log.lock(), vec!["handler", "audit", "email"]);
}

#[tokio::test]
async fn test_tasks_dropped_when_sink_fails() {
    let log: Log = Arc::default();
    let app = notify_app(&log);

    let (tx, rx) = oneshot::channel::<WireResponse>();
    drop(rx);
    let err = app.serve(RawRequest::post("/orders"), tx).await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    tokio::task::yield_now().await;
    assert_eq!(*log.lock(), vec!["handler"]);
}

#[tokio::test]
async fn test_tasks_from_failed_requests_still_run() {
    let log: Log = Arc::default();
    let task_log = Arc::clone(&log);
    let app = AppBuilder::new()
        .get(
            "/fail",
            "fail",
            Handler::sync(move |req| -> Result<(), DispatchError> {
                let log = Arc::clone(&task_log);
                req.background().add("cleanup", async move {
                    log.lock().push("cleanup".to_string());
                    Ok(())
                });
                Err(DispatchError::internal("boom"))
            }),
        )
        .build()
        .unwrap();

    let (tx, rx) = oneshot::channel::<WireResponse>();
    let handle = app.serve(RawRequest::get("/fail"), tx).await.unwrap();
    assert_eq!(rx.await.unwrap().status, 500);
    handle.unwrap().await.unwrap();
    assert_eq!(*log.lock(), vec!["cleanup"]);
}

#[tokio::test]
async fn test_no_tasks_no_spawn() {
    let app = AppBuilder::new()
        .get("/", "root", Handler::sync(|_req| Ok(())))
        .build()
        .unwrap();
    let (tx, rx) = oneshot::channel::<WireResponse>();
    let handle = app.serve(RawRequest::get("/"), tx).await.unwrap();
    assert!(handle.is_none());
    let wire = rx.await.unwrap();
    assert_eq!(wire.status, 204);
    assert_eq!(wire.reason, "No Content");
}
