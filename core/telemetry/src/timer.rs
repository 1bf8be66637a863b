// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Timer scheduler for sampled subscriptions. One worker task executes all
// callbacks serially; each timer runs its own ticker task that forwards
// fires to the worker. A one-permit gate per timer coalesces ticks while a
// callback is still running, so there is never a backlog and ticks never
// overlap.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::errors::TelemetryError;

pub type TimerCallback =
    Arc<dyn Fn() -> BoxFuture<'static, Result<(), TelemetryError>> + Send + Sync>;

struct Fire {
    callback: TimerCallback,
    _gate: tokio::sync::OwnedSemaphorePermit,
}

/// Process-wide timer scheduler; create one at server startup and share it.
pub struct TimerDaemon {
    tx: mpsc::Sender<Fire>,
}

impl Default for TimerDaemon {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerDaemon {
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::channel::<Fire>(16);
        tokio::spawn(async move {
            while let Some(fire) = rx.recv().await {
                if let Err(err) = (fire.callback)().await {
                    error!(%err, "timer callback returned non-OK status");
                }
                // The gate permit drops here, re-arming the timer.
            }
            debug!("timer worker exiting");
        });
        Self { tx }
    }

    /// Schedule `callback` to fire after `delay_ms` and then every
    /// `period_ms`. The returned token cancels the timer when dropped; a
    /// callback already handed to the worker may still run once.
    pub fn request_periodic_timer(
        &self,
        delay_ms: u64,
        period_ms: u64,
        callback: TimerCallback,
    ) -> TimerToken {
        let token = CancellationToken::new();
        let ticker_token = token.clone();
        let tx = self.tx.clone();
        let gate = Arc::new(Semaphore::new(1));

        tokio::spawn(async move {
            let start = time::Instant::now() + Duration::from_millis(delay_ms);
            let mut interval =
                time::interval_at(start, Duration::from_millis(period_ms.max(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker_token.cancelled() => {
                        trace!("timer cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        // Skip the tick while the previous callback is
                        // still queued or running.
                        let permit = match gate.clone().try_acquire_owned() {
                            Ok(permit) => permit,
                            Err(_) => {
                                trace!("tick coalesced");
                                continue;
                            }
                        };
                        let fire = Fire { callback: callback.clone(), _gate: permit };
                        if tx.send(fire).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        TimerToken { token }
    }

    /// Schedule `callback` to fire exactly once after `delay_ms`.
    pub fn request_one_shot_timer(
        &self,
        delay_ms: u64,
        callback: TimerCallback,
    ) -> TimerToken {
        let token = CancellationToken::new();
        let ticker_token = token.clone();
        let tx = self.tx.clone();
        let gate = Arc::new(Semaphore::new(1));

        tokio::spawn(async move {
            tokio::select! {
                _ = ticker_token.cancelled() => {}
                _ = time::sleep(Duration::from_millis(delay_ms)) => {
                    if let Ok(permit) = gate.try_acquire_owned() {
                        let _ = tx.send(Fire { callback, _gate: permit }).await;
                    }
                }
            }
        });

        TimerToken { token }
    }
}

/// Cancellation handle for a scheduled timer. Cancelling is best-effort:
/// a fire already queued on the worker still runs.
pub struct TimerToken {
    token: CancellationToken,
}

impl TimerToken {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for TimerToken {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    fn counting_callback(counter: Arc<AtomicUsize>) -> TimerCallback {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_timer_fires_after_delay_then_period() {
        let daemon = TimerDaemon::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let _token =
            daemon.request_periodic_timer(100, 50, counting_callback(counter.clone()));

        time::sleep(Duration::from_millis(90)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_millis(110)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_future_fires() {
        let daemon = TimerDaemon::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let token =
            daemon.request_periodic_timer(10, 10, counting_callback(counter.clone()));

        time::sleep(Duration::from_millis(35)).await;
        let fired = counter.load(Ordering::SeqCst);
        assert!(fired >= 2);

        token.cancel();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), fired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let daemon = TimerDaemon::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let token =
            daemon.request_periodic_timer(10, 10, counting_callback(counter.clone()));

        drop(token);
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_fires_once() {
        let daemon = TimerDaemon::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let _token = daemon.request_one_shot_timer(30, counting_callback(counter.clone()));

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_callback_keeps_timer_running() {
        let daemon = TimerDaemon::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_cb = counter.clone();
        let callback: TimerCallback = Arc::new(move || {
            let counter = counter_cb.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TelemetryError::Internal("expected failure".to_string()))
            }
            .boxed()
        });
        let _token = daemon.request_periodic_timer(10, 10, callback);

        time::sleep(Duration::from_millis(45)).await;
        assert!(counter.load(Ordering::SeqCst) >= 3);
    }
}
