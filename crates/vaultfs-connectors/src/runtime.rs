//! Blocking bridge for async storage clients.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::Runtime;

use crate::error::FsError;

/// Worker threads of the shared storage runtime.
const IO_WORKER_THREADS: usize = 2;

static IO_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Returns the process-wide runtime that drives storage requests.
///
/// Clients keep pooled connections bound to the runtime that opened them, so
/// every call goes through this one runtime.
fn io_runtime() -> Result<&'static Runtime, FsError> {
    if let Some(rt) = IO_RUNTIME.get() {
        return Ok(rt);
    }
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(IO_WORKER_THREADS)
        .thread_name("vaultfs-io")
        .enable_all()
        .build()
        .map_err(|e| FsError::io_with_source("failed to create storage runtime", e))?;
    Ok(IO_RUNTIME.get_or_init(|| rt))
}

/// Runs an async storage operation from synchronous code.
///
/// The future always runs on the shared storage runtime. Inside a caller's
/// Tokio runtime it is driven from a scoped helper thread, so a
/// current-thread caller never has to drive its own I/O while blocked.
///
/// # Errors
///
/// Returns the future's error, or `FsError::Io` if the runtime could not be
/// created or the helper thread panicked.
pub fn run_blocking<F, Fut, T>(make_future: F) -> Result<T, FsError>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T, FsError>> + Send,
    T: Send,
{
    if tokio::runtime::Handle::try_current().is_ok() {
        std::thread::scope(|s| {
            s.spawn(|| io_runtime()?.block_on(make_future()))
                .join()
                .map_err(|_| FsError::io("storage worker thread panicked"))?
        })
    } else {
        io_runtime()?.block_on(make_future())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_outside_runtime() {
        let value = run_blocking(|| async { Ok::<_, FsError>(42) }).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_error_passes_through() {
        let err = run_blocking(|| async { Err::<(), _>(FsError::NotFound("x".into())) }).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_timers_fire_outside_runtime() {
        let value = run_blocking(|| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, FsError>("slept")
        })
        .unwrap();
        assert_eq!(value, "slept");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_inside_multi_thread_runtime() {
        let value = run_blocking(|| async {
            tokio::task::yield_now().await;
            Ok::<_, FsError>("done")
        })
        .unwrap();
        assert_eq!(value, "done");
    }

    #[tokio::test]
    async fn test_inside_current_thread_runtime() {
        let value = run_blocking(|| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, FsError>("slept")
        })
        .unwrap();
        assert_eq!(value, "slept");
    }

    #[test]
    fn test_user_current_thread_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let value = rt.block_on(async {
            run_blocking(|| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, FsError>(7)
            })
        });
        assert_eq!(value.unwrap(), 7);
    }
}
