use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of [`Shutdown::sleep`].
const POLL: Duration = Duration::from_millis(50);

/// Cooperative stop flag shared by the run and whoever wants to end it
/// (a Ctrl-C handler, a test). Cycles finish their current phase and then
/// stop; nothing is interrupted mid-write.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            log::info!("shutdown requested; finishing in-flight phases");
        }
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless shutdown is requested first.
    /// Returns `false` if woken by shutdown.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(POLL.min(deadline - now));
        }
    }
}
