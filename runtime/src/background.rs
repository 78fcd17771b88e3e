//! Background tasks with a panic boundary.
//!
//! Work that must never take down its caller (mail delivery, per-message
//! handlers) runs through [`spawn_guarded`]. Errors and panics are logged and
//! counted, then dropped.

use futures::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;

/// Spawn `fut` on the runtime, logging its error or panic under `task`.
pub fn spawn_guarded<F, E>(task: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                tracing::error!(task, error = %e, "Background task failed");
                metrics::counter!("background.tasks.failed", "task" => task).increment(1);
            },
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(task, panic = %message, "Background task panicked");
                metrics::counter!("background.tasks.panicked", "task" => task).increment(1);
            },
        }
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn panics_are_contained() {
        let handle = spawn_guarded("boom", async {
            let relay_up = false;
            if !relay_up {
                panic!("mail relay exploded");
            }
            Ok::<(), String>(())
        });
        // The join itself succeeds because the panic was caught inside the task
        handle.await.expect("guarded task should not propagate the panic");
    }

    #[tokio::test]
    async fn errors_are_contained() {
        let handle = spawn_guarded("fails", async { Err::<(), _>("smtp refused") });
        handle.await.expect("guarded task should finish");
    }

    #[tokio::test]
    async fn successful_work_runs() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        spawn_guarded("ok", async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<(), String>(())
        })
        .await
        .expect("join");
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn panic_message_reads_both_payload_kinds() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
    }
}
