//! The shareable simulator handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SimConfig;
use crate::engine::{Engine, StepOutcome};
use crate::error::{SimError, SimResult};
use crate::model::Model;
use crate::schedule::{self, Schedule, ScheduleCounters, ScheduleStats};

/// Point-in-time copy of the simulation clock and state vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub t: f64,
    pub steps: u64,
    pub x: Vec<f64>,
}

/// State shared between user handles and the timer thread.
pub(crate) struct Shared<A> {
    engine: Mutex<Engine<A>>,
    schedule: Mutex<Option<Schedule>>,
    last_error: Mutex<Option<SimError>>,
    pub(crate) counters: ScheduleCounters,
    next_schedule_id: AtomicU64,
    period: Duration,
    delta_t: f64,
    delta_t_ms: f64,
    cont_states: usize,
    len: usize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<A> Shared<A> {
    pub(crate) fn step(&self) -> SimResult<StepOutcome> {
        let mut engine = self.engine.lock().map_err(|_| SimError::Poisoned)?;
        engine.next()
    }

    /// Drop the schedule slot if it still belongs to timer `id`.
    pub(crate) fn release_schedule(&self, id: u64) {
        let mut slot = lock(&self.schedule);
        if slot.as_ref().is_some_and(|s| s.id() == id) {
            // Dropping the handle detaches the calling timer thread.
            slot.take();
        }
    }

    pub(crate) fn record_error(&self, e: SimError) {
        *lock(&self.last_error) = Some(e);
    }
}

impl<A> Drop for Shared<A> {
    fn drop(&mut self) {
        let slot = self
            .schedule
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(schedule) = slot {
            schedule.cancel();
        }
    }
}

/// Fixed-step hybrid continuous/discrete simulator.
///
/// Cloning is cheap and every clone drives the same simulation. All steps,
/// manual or scheduled, run one at a time.
///
/// Methods take the engine lock, so they must not be called from inside a
/// model or output callback; those get a [`StepHandle`](crate::StepHandle)
/// instead.
pub struct Simulator<A = ()> {
    shared: Arc<Shared<A>>,
}

impl<A> Clone for Simulator<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: Send + 'static> Simulator<A> {
    /// Validate `config` and build a stopped simulator at `t = 0`.
    pub fn new<M: Model<A> + 'static>(config: SimConfig<A>, model: M) -> SimResult<Self> {
        let resolved = config.options.resolve()?;
        let delta_t_ms = config.options.delta_t_ms;
        let len = config.options.x0.len();
        debug!(
            delta_t = resolved.delta_t,
            delta_t_ms,
            len,
            cont_states = resolved.cont_states,
            "simulator created"
        );

        let engine = Engine::new(
            config,
            resolved.delta_t,
            resolved.cont_states,
            Box::new(model),
        );
        Ok(Self {
            shared: Arc::new(Shared {
                engine: Mutex::new(engine),
                schedule: Mutex::new(None),
                last_error: Mutex::new(None),
                counters: ScheduleCounters::default(),
                next_schedule_id: AtomicU64::new(0),
                period: resolved.period,
                delta_t: resolved.delta_t,
                delta_t_ms,
                cont_states: resolved.cont_states,
                len,
            }),
        })
    }

    /// Begin periodic stepping. No-op when already running.
    pub fn start(&self) -> SimResult<()> {
        let mut slot = lock(&self.shared.schedule);
        if slot.is_some() {
            return Ok(());
        }
        let id = self.shared.next_schedule_id.fetch_add(1, Ordering::Relaxed);
        *slot = Some(schedule::spawn(
            Arc::downgrade(&self.shared),
            id,
            self.shared.period,
        )?);
        debug!(schedule = id, "simulation started");
        Ok(())
    }

    /// `None` toggles between running and stopped, `Some` forces a state.
    pub fn set_state(&self, desired: Option<bool>) -> SimResult<()> {
        match desired.unwrap_or(!self.is_running()) {
            true => self.start(),
            false => {
                self.stop();
                Ok(())
            }
        }
    }
}

impl<A> Simulator<A> {
    /// Cancel periodic stepping. An in-flight step always completes.
    pub fn stop(&self) {
        let schedule = lock(&self.shared.schedule).take();
        if let Some(schedule) = schedule {
            let id = schedule.id();
            schedule.cancel();
            debug!(schedule = id, "simulation stopped");
        }
    }

    /// Run exactly one step, whether or not the schedule is running.
    ///
    /// A stop requested by a callback during this step stops the schedule.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> SimResult<()> {
        let outcome = self.shared.step()?;
        if outcome.stop_requested {
            self.stop();
        }
        Ok(())
    }

    /// Queue an override applied during the next step.
    ///
    /// See [`crate::StepHandle::force_x`] for the in-step variant.
    pub fn force_x(&self, values: &[f64], indices: Option<&[usize]>) -> SimResult<()> {
        let mut engine = self.shared.engine.lock().map_err(|_| SimError::Poisoned)?;
        engine.force_x(values, indices)
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared.schedule).is_some()
    }

    /// Current simulated time (seconds).
    pub fn t(&self) -> f64 {
        lock(&self.shared.engine).t()
    }

    /// Copy of the current state vector.
    pub fn x(&self) -> Vec<f64> {
        lock(&self.shared.engine).x().to_vec()
    }

    /// State vector as it was before the last step's update.
    pub fn prev_x(&self) -> Option<Vec<f64>> {
        lock(&self.shared.engine).prev_x().map(<[f64]>::to_vec)
    }

    pub fn steps(&self) -> u64 {
        lock(&self.shared.engine).steps()
    }

    pub fn snapshot(&self) -> SimSnapshot {
        let engine = lock(&self.shared.engine);
        SimSnapshot {
            t: engine.t(),
            steps: engine.steps(),
            x: engine.x().to_vec(),
        }
    }

    /// Integration step in simulated seconds.
    pub fn delta_t(&self) -> f64 {
        self.shared.delta_t
    }

    /// Wall-clock period between scheduled steps (milliseconds).
    pub fn delta_t_ms(&self) -> f64 {
        self.shared.delta_t_ms
    }

    pub fn cont_states(&self) -> usize {
        self.shared.cont_states
    }

    pub fn len(&self) -> usize {
        self.shared.len
    }

    pub fn is_empty(&self) -> bool {
        self.shared.len == 0
    }

    /// Read the opaque callback arguments.
    pub fn with_args<R>(&self, f: impl FnOnce(&A) -> R) -> R {
        f(lock(&self.shared.engine).args())
    }

    /// Change the callback arguments between steps.
    pub fn update_args<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        f(lock(&self.shared.engine).args_mut())
    }

    /// Error that made the periodic schedule stop itself, if any.
    pub fn take_error(&self) -> Option<SimError> {
        lock(&self.shared.last_error).take()
    }

    pub fn stats(&self) -> ScheduleStats {
        self.shared.counters.snapshot()
    }
}

impl<A> std::fmt::Debug for Simulator<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("delta_t", &self.shared.delta_t)
            .field("cont_states", &self.shared.cont_states)
            .field("len", &self.shared.len)
            .field("running", &self.is_running())
            .finish()
    }
}
