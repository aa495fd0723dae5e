//! Model and output callback traits.

use crate::error::SimResult;
use crate::forcing::StepHandle;

/// Dynamics of the simulated system, evaluated once per step.
///
/// `evaluate` receives the current time, the fixed step size, the opaque
/// arguments and the current state vector. It must return a vector of the
/// same length as `x` where:
/// - entries below `cont_states` are derivatives of the continuous states
/// - the remaining entries are the new values of the discrete states
///
/// Returning an error aborts the step and leaves the simulator untouched.
///
/// The step runs with the simulator's engine locked. Forcing and stopping
/// from inside `evaluate` go through `sim`; calling a captured
/// [`Simulator`](crate::Simulator) handle from here (`x()`, `next()`,
/// `force_x()` and so on) blocks on that lock forever.
pub trait Model<A>: Send {
    fn evaluate(
        &mut self,
        t: f64,
        dt: f64,
        args: &A,
        x: &[f64],
        sim: &mut StepHandle<'_>,
    ) -> SimResult<Vec<f64>>;
}

/// Invoked after each step's state has settled, before the clock advances.
///
/// Same locking rule as [`Model`]: use `sim` and `x`, never a captured
/// [`Simulator`](crate::Simulator).
pub trait OutputCallback<A>: Send {
    fn on_step(&mut self, t: f64, dt: f64, args: &A, x: &[f64], sim: &mut StepHandle<'_>);
}

/// Closure adapter for [`Model`], built by [`model_fn`].
pub struct FnModel<F>(F);

/// Closure adapter for [`OutputCallback`], built by [`output_fn`].
pub struct FnOutput<F>(F);

/// Wrap a closure as a [`Model`].
pub fn model_fn<A, F>(f: F) -> FnModel<F>
where
    F: FnMut(f64, f64, &A, &[f64], &mut StepHandle<'_>) -> SimResult<Vec<f64>> + Send,
{
    FnModel(f)
}

/// Wrap a closure as an [`OutputCallback`].
pub fn output_fn<A, F>(f: F) -> FnOutput<F>
where
    F: FnMut(f64, f64, &A, &[f64], &mut StepHandle<'_>) + Send,
{
    FnOutput(f)
}

impl<A, F> Model<A> for FnModel<F>
where
    F: FnMut(f64, f64, &A, &[f64], &mut StepHandle<'_>) -> SimResult<Vec<f64>> + Send,
{
    fn evaluate(
        &mut self,
        t: f64,
        dt: f64,
        args: &A,
        x: &[f64],
        sim: &mut StepHandle<'_>,
    ) -> SimResult<Vec<f64>> {
        (self.0)(t, dt, args, x, sim)
    }
}

impl<A, F> OutputCallback<A> for FnOutput<F>
where
    F: FnMut(f64, f64, &A, &[f64], &mut StepHandle<'_>) + Send,
{
    fn on_step(&mut self, t: f64, dt: f64, args: &A, x: &[f64], sim: &mut StepHandle<'_>) {
        (self.0)(t, dt, args, x, sim)
    }
}

impl<A, M: Model<A> + ?Sized> Model<A> for Box<M> {
    fn evaluate(
        &mut self,
        t: f64,
        dt: f64,
        args: &A,
        x: &[f64],
        sim: &mut StepHandle<'_>,
    ) -> SimResult<Vec<f64>> {
        (**self).evaluate(t, dt, args, x, sim)
    }
}

impl<A, O: OutputCallback<A> + ?Sized> OutputCallback<A> for Box<O> {
    fn on_step(&mut self, t: f64, dt: f64, args: &A, x: &[f64], sim: &mut StepHandle<'_>) {
        (**self).on_step(t, dt, args, x, sim)
    }
}

/// Runs several output callbacks in order on every step.
pub struct OutputChain<A>(Vec<Box<dyn OutputCallback<A>>>);

impl<A> OutputChain<A> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn then(mut self, output: impl OutputCallback<A> + 'static) -> Self {
        self.0.push(Box::new(output));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<A> Default for OutputChain<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> OutputCallback<A> for OutputChain<A> {
    fn on_step(&mut self, t: f64, dt: f64, args: &A, x: &[f64], sim: &mut StepHandle<'_>) {
        for output in &mut self.0 {
            output.on_step(t, dt, args, x, sim);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tally(usize);

    impl OutputCallback<Vec<usize>> for Tally {
        fn on_step(
            &mut self,
            _t: f64,
            _dt: f64,
            _args: &Vec<usize>,
            _x: &[f64],
            sim: &mut StepHandle<'_>,
        ) {
            self.0 += 1;
            if self.0 == 2 {
                sim.request_stop();
            }
        }
    }

    #[test]
    fn chain_runs_every_callback_in_order() {
        let mut pending = None;
        let mut stop = false;
        let mut chain = OutputChain::new()
            .then(Tally(0))
            .then(output_fn(|_, _, _, _, sim| {
                sim.force_x(&[1.0], None).unwrap();
            }))
            .then(Tally(1));
        assert_eq!(chain.len(), 3);

        let mut handle = StepHandle::new(0.0, 0.1, 1, 1, &mut pending, &mut stop);
        chain.on_step(0.0, 0.1, &vec![], &[0.0], &mut handle);

        assert!(stop);
        assert!(pending.is_some());
    }

    #[test]
    fn boxed_model_forwards() {
        let mut model: Box<dyn Model<()>> = Box::new(model_fn(|t, _, _: &(), _, _| Ok(vec![t])));
        let mut pending = None;
        let mut stop = false;
        let mut handle = StepHandle::new(2.0, 0.1, 1, 1, &mut pending, &mut stop);
        let out = model.evaluate(2.0, 0.1, &(), &[0.0], &mut handle).unwrap();
        assert_eq!(out, vec![2.0]);
    }
}
