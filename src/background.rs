//! Work scheduled by a request to run after its response was handed to the
//! transport.
//!
//! Tasks run in registration order on one spawned tokio task. A failing or
//! panicking task is logged at `error` and the remaining tasks still run;
//! nothing is ever reported to the client.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

type Task = (String, BoxFuture<'static, anyhow::Result<()>>);

/// Per-request queue of deferred work.
///
/// Cloning shares the queue, so handlers and dependencies can add tasks to
/// the same list the service drains after sending the response.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tasks: Arc<Mutex<Vec<Task>>>,
}

impl fmt::Debug for BackgroundTasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundTasks")
            .field("pending", &self.len())
            .finish()
    }
}

impl BackgroundTasks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a future. It is not polled until the response has been sent.
    pub fn add<F>(&self, name: impl Into<String>, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tasks.lock().push((name.into(), task.boxed()));
    }

    /// Queue a blocking closure; it runs on tokio's blocking pool.
    pub fn add_blocking<F>(&self, name: impl Into<String>, task: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let name = name.into();
        let label = name.clone();
        self.add(name, async move {
            match tokio::task::spawn_blocking(task).await {
                Ok(result) => result,
                Err(e) => Err(anyhow::anyhow!(
                    "blocking task '{label}' did not complete: {e}"
                )),
            }
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Drain the queue and run every task in order, in place.
    pub async fn run(self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for (name, task) in tasks {
            debug!(task = %name, "Running background task");
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => debug!(task = %name, "Background task complete"),
                Ok(Err(e)) => {
                    error!(task = %name, error = %format!("{e:#}"), "Background task failed");
                }
                Err(panic) => {
                    error!(
                        task = %name,
                        panic_message = %panic_message(panic.as_ref()),
                        "Background task panicked"
                    );
                }
            }
        }
    }

    /// Drain the queue onto the tokio runtime. Returns `None` when nothing
    /// was queued.
    #[must_use]
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if self.is_empty() {
            return None;
        }
        Some(tokio::spawn(self.run()))
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
