//! State vector, clock and the fixed-step update.

use tracing::trace;

use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::forcing::{Override, StepHandle};
use crate::model::{Model, OutputCallback};

/// Result of one completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct StepOutcome {
    /// A callback asked for the schedule to stop.
    pub stop_requested: bool,
}

/// Owns everything `next()` mutates. Always accessed under one lock.
pub(crate) struct Engine<A> {
    t: f64,
    steps: u64,
    delta_t: f64,
    cont_states: usize,
    x: Vec<f64>,
    prev_x: Vec<f64>,
    args: A,
    model: Box<dyn Model<A>>,
    output: Option<Box<dyn OutputCallback<A>>>,
    pending: Option<Override>,
}

impl<A> Engine<A> {
    /// `config` must already be validated; `delta_t` and `cont_states` are the
    /// resolved values.
    pub(crate) fn new(
        config: SimConfig<A>,
        delta_t: f64,
        cont_states: usize,
        model: Box<dyn Model<A>>,
    ) -> Self {
        let SimConfig {
            options,
            args,
            output,
        } = config;
        Self {
            t: 0.0,
            steps: 0,
            delta_t,
            cont_states,
            x: options.x0,
            prev_x: Vec::new(),
            args,
            model,
            output,
            pending: None,
        }
    }

    /// Advance one fixed step.
    ///
    /// On error nothing is committed: `x`, `prev_x`, `t` and the pending
    /// override are exactly as before the call.
    pub(crate) fn next(&mut self) -> SimResult<StepOutcome> {
        let t = self.t;
        let dt = self.delta_t;
        let len = self.x.len();
        let cont = self.cont_states;
        let saved = self.pending.clone();
        let mut stop_requested = false;

        let evaluated = {
            let mut handle =
                StepHandle::new(t, dt, len, cont, &mut self.pending, &mut stop_requested);
            self.model.evaluate(t, dt, &self.args, &self.x, &mut handle)
        };
        let returned = match evaluated {
            Ok(v) if v.len() == len => v,
            Ok(v) => {
                self.pending = saved;
                return Err(SimError::LengthMismatch {
                    what: "model output vs state vector",
                    expected: len,
                    actual: v.len(),
                });
            }
            Err(e) => {
                self.pending = saved;
                return Err(e);
            }
        };

        self.prev_x.clear();
        self.prev_x.extend_from_slice(&self.x);

        // Forward Euler on the continuous block, verbatim copy for the rest.
        for (xi, dxi) in self.x[..cont].iter_mut().zip(&returned[..cont]) {
            *xi += dt * dxi;
        }
        self.x[cont..].copy_from_slice(&returned[cont..]);

        if let Some(forced) = self.pending.take() {
            trace!(t, ?forced, "applying forced state");
            forced.apply(&mut self.x);
        }

        if let Some(output) = self.output.as_mut() {
            let mut handle =
                StepHandle::new(t, dt, len, cont, &mut self.pending, &mut stop_requested);
            output.on_step(t, dt, &self.args, &self.x, &mut handle);
        }

        self.steps += 1;
        self.t = self.steps as f64 * dt;
        trace!(step = self.steps, t = self.t, "step complete");

        Ok(StepOutcome { stop_requested })
    }

    /// Queue an override from outside a step; applied during the next step.
    pub(crate) fn force_x(&mut self, values: &[f64], indices: Option<&[usize]>) -> SimResult<()> {
        self.pending = Some(Override::new(self.x.len(), values, indices)?);
        Ok(())
    }

    pub(crate) fn t(&self) -> f64 {
        self.t
    }

    pub(crate) fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn x(&self) -> &[f64] {
        &self.x
    }

    pub(crate) fn prev_x(&self) -> Option<&[f64]> {
        (self.steps > 0).then_some(self.prev_x.as_slice())
    }

    pub(crate) fn args(&self) -> &A {
        &self.args
    }

    pub(crate) fn args_mut(&mut self) -> &mut A {
        &mut self.args
    }

    #[cfg(test)]
    pub(crate) fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}
