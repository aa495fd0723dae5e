//! Full simulator configuration: options, opaque arguments and output callback.

use std::fmt;

use crate::model::OutputCallback;
use crate::options::SimOptions;

/// Configuration consumed by [`crate::Simulator::new`].
///
/// `args` is never inspected by the simulator; it is handed to both callbacks
/// on every step.
pub struct SimConfig<A = ()> {
    pub options: SimOptions,
    pub args: A,
    pub(crate) output: Option<Box<dyn OutputCallback<A>>>,
}

impl SimConfig<()> {
    pub fn new(options: SimOptions) -> Self {
        Self::with_args(options, ())
    }
}

impl<A> SimConfig<A> {
    pub fn with_args(options: SimOptions, args: A) -> Self {
        Self {
            options,
            args,
            output: None,
        }
    }

    /// Attach an output callback, replacing any previous one.
    pub fn with_output(mut self, output: impl OutputCallback<A> + 'static) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }
}

impl Default for SimConfig<()> {
    fn default() -> Self {
        Self::new(SimOptions::default())
    }
}

impl<A: fmt::Debug> fmt::Debug for SimConfig<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimConfig")
            .field("options", &self.options)
            .field("args", &self.args)
            .field("output", &self.output.as_ref().map(|_| "<callback>"))
            .finish()
    }
}
