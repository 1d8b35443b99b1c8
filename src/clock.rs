//! Timer scheduling for the simulator.
//!
//! [`TokioClock`] drives real rides on the tokio runtime. [`ManualClock`] keeps
//! virtual time that only moves when [`ManualClock::advance`] is called, so
//! whole ride scenarios run instantly and deterministically.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::task::noop_waker_ref;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

use crate::error::RideError;

/// One-shot callback.
pub type Task = Box<dyn FnOnce() + Send + 'static>;
/// Periodic callback.
pub type Tick = Box<dyn FnMut() + Send + 'static>;

/// Handle to a scheduled callback. Cancelling is idempotent and guarantees
/// the callback will not start afterwards.
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl CancelToken {
    fn new(cancelled: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self { cancelled, abort }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Scheduler abstraction used by the simulator for every delay, tick and
/// background fetch.
pub trait Clock: Send + Sync + 'static {
    /// Run `task` once after `delay`.
    fn after(&self, delay: Duration, task: Task) -> CancelToken;

    /// Run `tick` every `period`, first at `period` from now.
    fn every(&self, period: Duration, tick: Tick) -> CancelToken;

    /// Drive `future` to completion in the background.
    fn spawn(&self, future: BoxFuture<'static, ()>);
}

/// Clock backed by tokio timers.
#[derive(Debug, Clone)]
pub struct TokioClock {
    handle: Handle,
}

impl TokioClock {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on.
    pub fn current() -> Result<Self, RideError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| RideError::Internal(format!("no tokio runtime: {}", e)))
    }
}

impl Clock for TokioClock {
    fn after(&self, delay: Duration, task: Task) -> CancelToken {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let handle = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::Acquire) {
                task();
            }
        });
        CancelToken::new(cancelled, Some(handle.abort_handle()))
    }

    fn every(&self, period: Duration, mut tick: Tick) -> CancelToken {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let handle = self.handle.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                tick();
            }
        });
        CancelToken::new(cancelled, Some(handle.abort_handle()))
    }

    fn spawn(&self, future: BoxFuture<'static, ()>) {
        self.handle.spawn(future);
    }
}

enum Job {
    Once(Task),
    Every { period: Duration, tick: Tick },
}

struct Scheduled {
    due: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    job: Job,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reverse ordering to make BinaryHeap a min-heap by due time,
        // falling back to scheduling order for equal deadlines.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    seq: u64,
    timers: BinaryHeap<Scheduled>,
    fresh: Vec<BoxFuture<'static, ()>>,
    parked: Vec<BoxFuture<'static, ()>>,
}

impl ManualState {
    fn push(&mut self, due: Duration, cancelled: Arc<AtomicBool>, job: Job) {
        self.seq += 1;
        self.timers.push(Scheduled {
            due,
            seq: self.seq,
            cancelled,
            job,
        });
    }
}

/// Virtual-time clock.
///
/// Callbacks run on the thread calling [`advance`](Self::advance), in due-time
/// order. Spawned futures are polled with a no-op waker between callbacks, so
/// they must make progress without a tokio timer.
#[derive(Default)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since the clock was created.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of scheduled callbacks that have not been cancelled.
    pub fn pending_timers(&self) -> usize {
        self.state
            .lock()
            .timers
            .iter()
            .filter(|s| !s.cancelled.load(Ordering::Acquire))
            .count()
    }

    /// Number of spawned futures that have not completed.
    pub fn pending_futures(&self) -> usize {
        let state = self.state.lock();
        state.fresh.len() + state.parked.len()
    }

    /// Moves virtual time forward by `by`, running every callback that falls
    /// due on the way.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now + by;
        loop {
            self.poll_spawned();

            let next = {
                let mut state = self.state.lock();
                match state.timers.peek().map(|s| s.due) {
                    Some(due) if due <= target => {
                        state.now = due;
                        state.timers.pop()
                    }
                    _ => None,
                }
            };
            let Some(next) = next else { break };
            if next.cancelled.load(Ordering::Acquire) {
                continue;
            }

            match next.job {
                Job::Once(task) => task(),
                Job::Every { period, mut tick } => {
                    tick();
                    if !next.cancelled.load(Ordering::Acquire) {
                        self.state.lock().push(
                            next.due + period,
                            next.cancelled,
                            Job::Every { period, tick },
                        );
                    }
                }
            }
        }
        self.state.lock().now = target;
        self.poll_spawned();
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Runs spawned futures and anything due at the current instant.
    pub fn run_until_idle(&self) {
        self.advance(Duration::ZERO);
    }

    fn poll_spawned(&self) {
        let mut batch = {
            let mut state = self.state.lock();
            let mut batch = std::mem::take(&mut state.parked);
            batch.append(&mut state.fresh);
            batch
        };
        let mut cx = Context::from_waker(noop_waker_ref());
        loop {
            let mut still_pending = Vec::new();
            for mut future in batch.drain(..) {
                if let Poll::Pending = Pin::as_mut(&mut future).poll(&mut cx) {
                    still_pending.push(future);
                }
            }
            let mut state = self.state.lock();
            state.parked.extend(still_pending);
            if state.fresh.is_empty() {
                break;
            }
            batch = std::mem::take(&mut state.fresh);
        }
    }
}

impl Clock for ManualClock {
    fn after(&self, delay: Duration, task: Task) -> CancelToken {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock();
        let due = state.now + delay;
        state.push(due, cancelled.clone(), Job::Once(task));
        CancelToken::new(cancelled, None)
    }

    fn every(&self, period: Duration, tick: Tick) -> CancelToken {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock();
        let due = state.now + period;
        state.push(due, cancelled.clone(), Job::Every { period, tick });
        CancelToken::new(cancelled, None)
    }

    fn spawn(&self, future: BoxFuture<'static, ()>) {
        self.state.lock().fresh.push(future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<(u64, &'static str)>>>, Arc<ManualClock>) {
        (Arc::new(Mutex::new(Vec::new())), Arc::new(ManualClock::new()))
    }

    #[test]
    fn manual_clock_runs_callbacks_in_time_order() {
        let (log, clock) = recorder();
        for (ms, name) in [(300, "c"), (100, "a"), (200, "b")] {
            let log = log.clone();
            let inner = clock.clone();
            clock.after(
                Duration::from_millis(ms),
                Box::new(move || log.lock().push((inner.now().as_millis() as u64, name))),
            );
        }

        clock.advance_ms(250);
        assert_eq!(*log.lock(), vec![(100, "a"), (200, "b")]);
        assert_eq!(clock.now(), Duration::from_millis(250));

        clock.advance_ms(50);
        assert_eq!(log.lock().last(), Some(&(300, "c")));
    }

    #[test]
    fn cancelled_callbacks_never_run() {
        let clock = ManualClock::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let token = clock.after(
            Duration::from_millis(10),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(clock.pending_timers(), 1);

        token.cancel();
        assert_eq!(clock.pending_timers(), 0);
        clock.advance_ms(100);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn periodic_ticks_repeat_until_cancelled() {
        let clock = ManualClock::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let token = clock.every(
            Duration::from_millis(800),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        clock.advance_ms(799);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        clock.advance_ms(1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        clock.advance_ms(1600);
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        token.cancel();
        clock.advance_ms(8000);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn spawned_futures_resolve_when_their_input_arrives() {
        let clock = ManualClock::new();
        let (tx, rx) = futures::channel::oneshot::channel::<u32>();
        let seen = Arc::new(AtomicUsize::new(0));
        let out = seen.clone();
        clock.spawn(Box::pin(async move {
            if let Ok(v) = rx.await {
                out.store(v as usize, Ordering::SeqCst);
            }
        }));

        clock.run_until_idle();
        assert_eq!(clock.pending_futures(), 1);

        tx.send(7).unwrap();
        clock.run_until_idle();
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(clock.pending_futures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_fires_and_cancels() {
        let clock = TokioClock::current().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let _kept = clock.after(
            Duration::from_millis(100),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let counter = hits.clone();
        let dropped = clock.after(
            Duration::from_millis(100),
            Box::new(move || {
                counter.fetch_add(10, Ordering::SeqCst);
            }),
        );
        dropped.cancel();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
