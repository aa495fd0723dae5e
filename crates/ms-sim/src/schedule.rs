//! Periodic stepping on a dedicated timer thread.
//!
//! The thread waits on a stop channel with a deadline. Each firing runs one
//! complete step under the engine lock. The next deadline is one period after
//! the previous firing; when a step overruns, the next firing happens at once
//! and every other missed period is dropped. A step that panics is caught
//! and reported as [`SimError::Poisoned`]; the schedule stops either way.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{SimError, SimResult};
use crate::simulator::Shared;

/// Counters for the periodic schedule, accumulated across start/stop cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScheduleStats {
    /// Steps run by the timer thread.
    pub fired: u64,
    /// Whole periods skipped because a step overran.
    pub lost_periods: u64,
}

#[derive(Debug, Default)]
pub(crate) struct ScheduleCounters {
    fired: AtomicU64,
    lost_periods: AtomicU64,
}

impl ScheduleCounters {
    pub(crate) fn snapshot(&self) -> ScheduleStats {
        ScheduleStats {
            fired: self.fired.load(Ordering::Relaxed),
            lost_periods: self.lost_periods.load(Ordering::Relaxed),
        }
    }
}

/// A running timer thread.
#[derive(Debug)]
pub(crate) struct Schedule {
    id: u64,
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl Schedule {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Signal the timer thread and wait for an in-flight step to finish.
    ///
    /// From the timer thread itself (a callback stopping its own schedule)
    /// the join is skipped and the thread exits after the current step.
    pub(crate) fn cancel(self) {
        let _ = self.stop_tx.send(());
        if self.handle.thread().id() == thread::current().id() {
            return;
        }
        if self.handle.join().is_err() {
            warn!(schedule = self.id, "timer thread panicked");
        }
    }
}

/// Number of whole periods lost when a firing that started at `fired_at`
/// finished at `finished`. The first missed period is made up by firing
/// immediately.
pub(crate) fn lost_periods(fired_at: Instant, finished: Instant, period: Duration) -> u64 {
    let busy = finished.saturating_duration_since(fired_at);
    let whole = busy.as_nanos() / period.as_nanos().max(1);
    u64::try_from(whole.saturating_sub(1)).unwrap_or(u64::MAX)
}

pub(crate) fn spawn<A: Send + 'static>(
    weak: Weak<Shared<A>>,
    id: u64,
    period: Duration,
) -> SimResult<Schedule> {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let handle = thread::Builder::new()
        .name(format!("ms-sim-timer-{id}"))
        .spawn(move || {
            debug!(schedule = id, ?period, "timer thread started");
            let mut deadline = Instant::now() + period;
            loop {
                let wait = deadline.saturating_duration_since(Instant::now());
                match stop_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let fired_at = Instant::now();
                // The engine mutex is left poisoned by the unwind.
                let result = panic::catch_unwind(AssertUnwindSafe(|| shared.step()))
                    .unwrap_or(Err(SimError::Poisoned));
                shared.counters.fired.fetch_add(1, Ordering::Relaxed);

                match result {
                    Ok(outcome) if outcome.stop_requested => {
                        debug!(schedule = id, "stop requested from callback");
                        shared.release_schedule(id);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(schedule = id, error = %e, "scheduled step failed, stopping");
                        shared.record_error(e);
                        shared.release_schedule(id);
                        break;
                    }
                }

                let finished = Instant::now();
                let lost = lost_periods(fired_at, finished, period);
                if lost > 0 {
                    warn!(schedule = id, lost, "step overran its period");
                    shared
                        .counters
                        .lost_periods
                        .fetch_add(lost, Ordering::Relaxed);
                }
                deadline = fired_at + period;
            }
            debug!(schedule = id, "timer thread exiting");
        })
        .map_err(|e| SimError::Scheduler {
            message: e.to_string(),
        })?;

    Ok(Schedule {
        id,
        stop_tx,
        handle,
    })
}
