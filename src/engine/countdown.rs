// src/engine/countdown.rs

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};
use std::time::Duration;

use tokio::{task::JoinHandle, time};

/// Per-question timer. Ticks once per second on the tokio runtime.
///
/// The ticking task is aborted by `cancel` and on drop, so a countdown can never
/// outlive the question (or session) that owns it.
#[derive(Debug)]
pub struct Countdown {
    limit: u32,
    remaining: Arc<AtomicU32>,
    handle: Option<JoinHandle<()>>,
}

impl Countdown {
    /// Must be called from within a tokio runtime.
    pub fn start(seconds: u32) -> Self {
        let remaining = Arc::new(AtomicU32::new(seconds));
        let ticker = remaining.clone();

        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut interval = time::interval_at(time::Instant::now() + period, period);

            loop {
                interval.tick().await;
                let left = ticker.load(Ordering::Acquire).saturating_sub(1);
                ticker.store(left, Ordering::Release);
                if left == 0 {
                    break;
                }
            }
        });

        Self {
            limit: seconds,
            remaining,
            handle: Some(handle),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_expired(&self) -> bool {
        self.remaining() == 0
    }

    /// Stops ticking and freezes `remaining` at its current value.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}
