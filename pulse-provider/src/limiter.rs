//! Sliding-window admission control for upstream calls.
//!
//! [`SlidingWindow`] is the pure core: it takes explicit instants, so its
//! behaviour can be checked without a clock. [`AdmissionLimiter`] is the
//! async shell that sleeps on `tokio::time` until the window has room.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Recent admission timestamps within a rolling window.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    window: Duration,
    max_calls: usize,
    admitted: VecDeque<Instant>,
}

impl SlidingWindow {
    /// `max_calls` below 1 is raised to 1.
    pub fn new(window: Duration, max_calls: u32) -> Self {
        let max_calls = max_calls.max(1) as usize;
        Self {
            window,
            max_calls,
            admitted: VecDeque::with_capacity(max_calls),
        }
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admit a call at `now`, or return how long until the oldest admission
    /// leaves the window.
    pub fn try_admit(&mut self, now: Instant) -> Result<(), Duration> {
        self.evict(now);
        if self.admitted.len() < self.max_calls {
            self.admitted.push_back(now);
            return Ok(());
        }
        let wait = self
            .admitted
            .front()
            .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
            .unwrap_or_default();
        Err(wait.max(Duration::from_millis(1)))
    }

    /// Admissions still inside the window at `now`.
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.evict(now);
        self.admitted.len()
    }
}

/// Shared, injectable admission limiter.
///
/// Callers over the cap wait cooperatively instead of failing.
#[derive(Debug)]
pub struct AdmissionLimiter {
    window: Mutex<SlidingWindow>,
}

impl AdmissionLimiter {
    pub fn new(window: Duration, max_calls: u32) -> Self {
        Self {
            window: Mutex::new(SlidingWindow::new(window, max_calls)),
        }
    }

    /// Wait for a slot and consume it. Returns how long the caller waited.
    pub async fn consume_slot(&self) -> Duration {
        let started = Instant::now();
        loop {
            let wait = {
                let mut window = self.window.lock().await;
                match window.try_admit(Instant::now()) {
                    Ok(()) => return started.elapsed(),
                    Err(wait) => wait,
                }
            };
            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                "Provider admission window full, waiting for a slot"
            );
            tokio::time::sleep(wait).await;
        }
    }

    pub async fn in_window(&self) -> usize {
        self.window.lock().await.in_window(Instant::now())
    }
}
