// Runs a blocking adapter/storage call on a helper thread and waits at most
// `limit` for it. A call that overruns is not killed: the caller keeps the
// `Pending` handle and decides whether to wait for it again, withdraw it, or
// drop it and let the thread finish detached.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundedError {
    /// No result within the limit.
    TimedOut(Duration),
    /// The helper thread could not be spawned or died without a result.
    Worker(String),
}

impl std::fmt::Display for BoundedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundedError::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
            BoundedError::Worker(msg) => write!(f, "worker thread failed: {}", msg),
        }
    }
}

impl std::error::Error for BoundedError {}

/// A call running on its own thread.
pub struct Pending<T> {
    name: String,
    rx: mpsc::Receiver<T>,
}

impl<T> Pending<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait up to `limit`. After a timeout the call is still running and can
    /// be waited on again.
    pub fn wait(&self, limit: Duration) -> Result<T, BoundedError> {
        match self.rx.recv_timeout(limit) {
            Ok(value) => Ok(value),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(BoundedError::TimedOut(limit)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(BoundedError::Worker(format!("{} panicked", self.name)))
            }
        }
    }

    /// Wait for as long as it takes.
    pub fn join(self) -> Result<T, BoundedError> {
        self.rx
            .recv()
            .map_err(|_| BoundedError::Worker(format!("{} panicked", self.name)))
    }
}

pub fn spawn_bounded<T, F>(name: &str, op: F) -> Result<Pending<T>, BoundedError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            // Receiver may be gone if the caller stopped waiting.
            let _ = tx.send(op());
        })
        .map_err(|e| BoundedError::Worker(format!("spawning {name}: {e}")))?;
    Ok(Pending { name: name.to_string(), rx })
}

/// `spawn_bounded` + one `wait`. An overrunning call is left to finish
/// detached and its result is dropped.
pub fn run_bounded<T, F>(name: &str, limit: Duration, op: F) -> Result<T, BoundedError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let result = spawn_bounded(name, op)?.wait(limit);
    if let Err(BoundedError::TimedOut(_)) = result {
        log::warn!("{} exceeded {:?}; abandoning it", name, limit);
    }
    result
}
