use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub const TICK: Duration = Duration::from_secs(1);

/// Seconds-remaining countdown driven by a background tick task.
///
/// The value is published through a `watch` channel so the presentation layer can
/// follow it. The tick task is owned here and aborted on `stop`, `reset` and drop,
/// so a countdown can never outlive its interview.
pub struct Countdown {
    remaining: Arc<watch::Sender<u64>>,
    ticker: Option<JoinHandle<()>>,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Countdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            remaining: Arc::new(tx),
            ticker: None,
        }
    }

    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops ticking and sets the remaining time.
    pub fn reset(&mut self, seconds: u64) {
        self.stop();
        self.remaining.send_replace(seconds);
    }

    /// Starts ticking from the current value. Must be called inside a Tokio runtime.
    pub fn resume(&mut self) {
        if self.is_running() || self.remaining() == 0 {
            return;
        }
        let remaining = Arc::clone(&self.remaining);
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let mut left = 0;
                remaining.send_modify(|secs| {
                    *secs = secs.saturating_sub(1);
                    left = *secs;
                });
                if left == 0 {
                    tracing::info!("Countdown reached zero");
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn decrements_once_per_second() {
        let mut countdown = Countdown::new();
        countdown.reset(3);
        countdown.resume();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(countdown.remaining(), 2);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(countdown.remaining(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_zero() {
        let mut countdown = Countdown::new();
        countdown.reset(2);
        countdown.resume();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(countdown.remaining(), 0);
        assert!(!countdown.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_the_value() {
        let mut countdown = Countdown::new();
        countdown.reset(60);
        countdown.resume();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        countdown.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(countdown.remaining(), 58);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_every_tick() {
        let mut countdown = Countdown::new();
        countdown.reset(5);
        let mut rx = countdown.subscribe();
        countdown.resume();

        let mut seen = Vec::new();
        while seen.len() < 5 {
            rx.changed().await.expect("countdown dropped");
            seen.push(*rx.borrow_and_update());
        }
        assert_eq!(seen, vec![4, 3, 2, 1, 0]);
    }
}
