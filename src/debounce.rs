//! Per-key collapse of event bursts.
//!
//! A call runs its action right away if the key has not run within the
//! interval. Otherwise the action is parked until the interval is up,
//! replacing whatever was parked for that key before.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::Duration,
};

use tokio::{runtime::Handle, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::log_debug;

const ENABLE_LOGS: bool = false;

#[derive(Default)]
struct KeyState {
    last_run_at: Option<Instant>,
    /// Bumped by every call; a parked action only runs if it still holds
    /// the latest generation when it wakes.
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct DebounceState {
    keys: HashMap<String, KeyState>,
    closed: bool,
}

pub struct RateDebouncer {
    interval: Duration,
    runtime: Handle,
    state: Mutex<DebounceState>,
    cancel: CancellationToken,
}

impl RateDebouncer {
    pub fn new(interval: Duration, runtime: Handle) -> Arc<Self> {
        Arc::new(Self {
            interval,
            runtime,
            state: Mutex::new(DebounceState::default()),
            cancel: CancellationToken::new(),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `false` once the debouncer has been shut down.
    pub fn debounce<F>(self: &Arc<Self>, key: &str, action: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let now = Instant::now();
        let mut state = self.lock_state();
        if state.closed {
            return false;
        }

        let entry = state.keys.entry(key.to_string()).or_default();
        if let Some(pending) = entry.pending.take() {
            pending.abort();
        }
        entry.generation += 1;

        let elapsed = entry.last_run_at.map(|last| now.duration_since(last));
        match elapsed {
            Some(elapsed) if elapsed < self.interval => {
                let delay = self.interval - elapsed;
                let generation = entry.generation;
                log_debug!("Debounced {key}; running in {delay:?}");
                entry.pending = Some(self.park(key.to_string(), generation, delay, action));
            }
            _ => {
                entry.last_run_at = Some(now);
                drop(state);
                log_debug!("Running {key} immediately");
                action();
            }
        }
        true
    }

    /// Drops the parked action for `key`, if any.
    pub fn cancel(&self, key: &str) {
        let mut state = self.lock_state();
        if let Some(entry) = state.keys.get_mut(key) {
            entry.generation += 1;
            if let Some(pending) = entry.pending.take() {
                pending.abort();
            }
        }
    }

    /// Cancels and forgets `key`, so its next call runs immediately.
    pub fn reset(&self, key: &str) {
        self.cancel(key);
        self.lock_state().keys.remove(key);
    }

    pub fn reset_all(&self) {
        let mut state = self.lock_state();
        for (_, entry) in state.keys.drain() {
            if let Some(pending) = entry.pending {
                pending.abort();
            }
        }
    }

    /// Cancels everything parked and rejects later calls.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let mut state = self.lock_state();
        state.closed = true;
        for entry in state.keys.values_mut() {
            if let Some(pending) = entry.pending.take() {
                pending.abort();
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock_state()
            .keys
            .values()
            .filter(|entry| entry.pending.is_some())
            .count()
    }

    fn park<F>(self: &Arc<Self>, key: String, generation: u64, delay: Duration, action: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let weak: Weak<Self> = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let Some(debouncer) = weak.upgrade() else {
                return;
            };
            {
                let mut state = debouncer.lock_state();
                if state.closed {
                    return;
                }
                let Some(entry) = state.keys.get_mut(&key) else {
                    return;
                };
                if entry.generation != generation {
                    return;
                }
                entry.last_run_at = Some(Instant::now());
                entry.pending = None;
            }
            action();
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, DebounceState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for RateDebouncer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::settle;

    type Log = Arc<Mutex<Vec<(&'static str, Duration)>>>;

    fn recorder(log: &Log, start: Instant, name: &'static str) -> impl FnOnce() + Send + 'static {
        let log = log.clone();
        move || log.lock().unwrap().push((name, start.elapsed()))
    }

    fn debouncer() -> Arc<RateDebouncer> {
        RateDebouncer::new(Duration::from_millis(100), Handle::current())
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_latest_call() {
        let debouncer = debouncer();
        let log: Log = Arc::default();
        let start = Instant::now();

        debouncer.debounce("yt", recorder(&log, start, "prime"));
        sleep_ms(10).await;
        debouncer.debounce("yt", recorder(&log, start, "first"));
        sleep_ms(30).await;
        debouncer.debounce("yt", recorder(&log, start, "second"));
        sleep_ms(200).await;

        let log = log.lock().unwrap();
        let names: Vec<_> = log.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["prime", "second"]);
        let fired_at = log[1].1;
        assert!(fired_at >= Duration::from_millis(100) && fired_at < Duration::from_millis(110));
    }

    #[tokio::test(start_paused = true)]
    async fn calls_further_apart_than_interval_both_run() {
        let debouncer = debouncer();
        let log: Log = Arc::default();
        let start = Instant::now();

        debouncer.debounce("yt", recorder(&log, start, "t0"));
        sleep_ms(150).await;
        debouncer.debounce("yt", recorder(&log, start, "t150"));

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].0, "t150");
        assert!(log[1].1 >= Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_do_not_interfere() {
        let debouncer = debouncer();
        let log: Log = Arc::default();
        let start = Instant::now();

        debouncer.debounce("yt", recorder(&log, start, "yt-prime"));
        debouncer.debounce("yt", recorder(&log, start, "yt"));
        debouncer.debounce("ig", recorder(&log, start, "ig"));
        sleep_ms(150).await;

        let names: Vec<_> = log.lock().unwrap().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["yt-prime", "ig", "yt"]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_parked_actions() {
        let debouncer = debouncer();
        let log: Log = Arc::default();
        let start = Instant::now();

        debouncer.debounce("yt", recorder(&log, start, "prime"));
        debouncer.debounce("yt", recorder(&log, start, "parked"));
        assert_eq!(debouncer.pending_count(), 1);

        debouncer.shutdown();
        sleep_ms(200).await;

        assert!(!debouncer.debounce("yt", recorder(&log, start, "late")));
        let names: Vec<_> = log.lock().unwrap().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["prime"]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_lets_next_call_run_immediately() {
        let debouncer = debouncer();
        let log: Log = Arc::default();
        let start = Instant::now();

        debouncer.debounce("yt", recorder(&log, start, "prime"));
        debouncer.debounce("yt", recorder(&log, start, "parked"));
        debouncer.reset("yt");
        debouncer.debounce("yt", recorder(&log, start, "after-reset"));
        sleep_ms(200).await;

        let names: Vec<_> = log.lock().unwrap().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["prime", "after-reset"]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_all_forgets_every_key() {
        let debouncer = debouncer();
        let log: Log = Arc::default();
        let start = Instant::now();

        debouncer.debounce("yt", recorder(&log, start, "yt-prime"));
        debouncer.debounce("ig", recorder(&log, start, "ig-prime"));
        debouncer.debounce("yt", recorder(&log, start, "yt-parked"));
        debouncer.debounce("ig", recorder(&log, start, "ig-parked"));
        assert_eq!(debouncer.pending_count(), 2);

        debouncer.reset_all();
        assert_eq!(debouncer.pending_count(), 0);
        debouncer.debounce("yt", recorder(&log, start, "yt-again"));
        sleep_ms(200).await;

        let names: Vec<_> = log.lock().unwrap().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["yt-prime", "ig-prime", "yt-again"]);
    }
}
