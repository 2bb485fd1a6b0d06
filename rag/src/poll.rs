use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{RagError, Result};

#[derive(Clone, Copy, Debug)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Some(Duration::from_secs(300)))
    }
}

/// Shared flag the UI flips to abandon an in-flight wait.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RagError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Re-fetches `initial` every `policy.interval` until `is_pending` is false.
///
/// Each loop iteration sleeps first, then fetches, so a value that starts pending
/// costs exactly one fetch per observed status. Fetch errors abort the wait.
pub fn wait_until<T, F, P>(
    initial: T,
    mut fetch: F,
    is_pending: P,
    policy: PollPolicy,
    cancel: &CancelToken,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
    P: Fn(&T) -> bool,
{
    let started = Instant::now();
    let mut current = initial;
    while is_pending(&current) {
        cancel.check()?;
        if let Some(limit) = policy.timeout {
            if started.elapsed() >= limit {
                return Err(RagError::TimedOut(limit));
            }
        }
        sleep_interruptibly(policy.interval, cancel)?;
        current = fetch()?;
    }
    Ok(current)
}

fn sleep_interruptibly(total: Duration, cancel: &CancelToken) -> Result<()> {
    const SLICE: Duration = Duration::from_millis(50);
    let deadline = Instant::now() + total;
    loop {
        cancel.check()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        thread::sleep((deadline - now).min(SLICE));
    }
}
