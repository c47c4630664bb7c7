//! mount::monitor
//!
//! Background poller that re-resolves the tracked reference.
//!
//! The monitor is a plain OS thread. It sleeps on a stop channel with the
//! poll interval as timeout, so stopping never waits for a full interval;
//! an interval of zero polls in a tight loop. Stopping joins the thread,
//! which means a poll in progress completes first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::MountError;

/// Handle to a running poller thread.
#[derive(Debug)]
pub struct Monitor {
    interval: Duration,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    polls: Arc<AtomicU64>,
}

impl Monitor {
    /// Start calling `poll` every `interval`.
    ///
    /// # Errors
    ///
    /// [`MountError::ResourceExhausted`] if the thread cannot be spawned.
    pub fn spawn<F>(interval: Duration, mut poll: F) -> Result<Self, MountError>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let polls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&polls);

        let thread = thread::Builder::new()
            .name("gitmod-monitor".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        poll();
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| MountError::ResourceExhausted(format!("cannot spawn monitor: {}", e)))?;

        debug!(interval_ms = interval.as_millis() as u64, "monitor started");
        Ok(Self {
            interval,
            stop: Some(stop),
            thread: Some(thread),
            polls,
        })
    }

    /// The configured poll interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of completed polls.
    pub fn poll_count(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Ask the thread to stop and wait for it. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            // the thread may already be gone; disconnecting has the same effect
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("monitor thread panicked");
            }
            debug!(polls = self.poll_count(), "monitor stopped");
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}
