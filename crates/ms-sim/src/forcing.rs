//! Pending state overrides and the handle callbacks use to request them.

use ms_core::ensure_index;

use crate::error::{SimError, SimResult};

/// A validated replacement for all or part of the state vector.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Override {
    /// Replace every element.
    Whole(Vec<f64>),
    /// Replace `x[indices[k]]` with `values[k]`.
    Indexed {
        indices: Vec<usize>,
        values: Vec<f64>,
    },
}

impl Override {
    /// Validate an override request against a state vector of length `len`.
    pub(crate) fn new(len: usize, values: &[f64], indices: Option<&[usize]>) -> SimResult<Self> {
        match indices {
            None => {
                if values.len() != len {
                    return Err(SimError::LengthMismatch {
                        what: "force_x values vs state vector",
                        expected: len,
                        actual: values.len(),
                    });
                }
                Ok(Override::Whole(values.to_vec()))
            }
            Some(indices) => {
                if indices.len() != values.len() {
                    return Err(SimError::LengthMismatch {
                        what: "force_x values vs indices",
                        expected: indices.len(),
                        actual: values.len(),
                    });
                }
                for &idx in indices {
                    ensure_index(idx, len, "force_x index")?;
                }
                Ok(Override::Indexed {
                    indices: indices.to_vec(),
                    values: values.to_vec(),
                })
            }
        }
    }

    pub(crate) fn apply(&self, x: &mut [f64]) {
        match self {
            Override::Whole(values) => x.copy_from_slice(values),
            Override::Indexed { indices, values } => {
                for (&idx, &v) in indices.iter().zip(values) {
                    x[idx] = v;
                }
            }
        }
    }
}

/// Handle passed to model and output callbacks for the duration of one step.
///
/// Callbacks cannot touch the state vector directly; they queue changes with
/// [`StepHandle::force_x`] and may ask the schedule to stop once the step is
/// finished.
#[derive(Debug)]
pub struct StepHandle<'a> {
    t: f64,
    delta_t: f64,
    len: usize,
    cont_states: usize,
    pending: &'a mut Option<Override>,
    stop_requested: &'a mut bool,
}

impl<'a> StepHandle<'a> {
    pub(crate) fn new(
        t: f64,
        delta_t: f64,
        len: usize,
        cont_states: usize,
        pending: &'a mut Option<Override>,
        stop_requested: &'a mut bool,
    ) -> Self {
        Self {
            t,
            delta_t,
            len,
            cont_states,
            pending,
            stop_requested,
        }
    }

    /// Queue an override of the state vector.
    ///
    /// Called from the model callback, the override is applied at the end of
    /// the current step and wins over the integrated values. Called from the
    /// output callback, it is applied during the following step. A later call
    /// within the same step replaces an earlier one.
    pub fn force_x(&mut self, values: &[f64], indices: Option<&[usize]>) -> SimResult<()> {
        *self.pending = Some(Override::new(self.len, values, indices)?);
        Ok(())
    }

    /// Stop the periodic schedule after this step completes.
    pub fn request_stop(&mut self) {
        *self.stop_requested = true;
    }

    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn delta_t(&self) -> f64 {
        self.delta_t
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn cont_states(&self) -> usize {
        self.cont_states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_override_requires_full_length() {
        let err = Override::new(3, &[1.0, 2.0], None).unwrap_err();
        assert_eq!(
            err,
            SimError::LengthMismatch {
                what: "force_x values vs state vector",
                expected: 3,
                actual: 2,
            }
        );
    }

    #[test]
    fn indexed_override_requires_matching_lengths() {
        let err = Override::new(3, &[1.0, 2.0], Some(&[0])).unwrap_err();
        assert!(matches!(err, SimError::LengthMismatch { .. }));
    }

    #[test]
    fn indexed_override_rejects_out_of_range_index() {
        let err = Override::new(2, &[1.0], Some(&[2])).unwrap_err();
        assert_eq!(err, SimError::IndexOutOfRange { index: 2, len: 2 });
    }

    #[test]
    fn indexed_override_touches_only_listed_entries() {
        let mut x = vec![1.0, 2.0, 3.0, 4.0];
        Override::new(4, &[-1.0, -3.0], Some(&[0, 2]))
            .unwrap()
            .apply(&mut x);
        assert_eq!(x, vec![-1.0, 2.0, -3.0, 4.0]);
    }

    #[test]
    fn whole_override_replaces_everything() {
        let mut x = vec![1.0, 2.0];
        Override::new(2, &[7.0, 8.0], None).unwrap().apply(&mut x);
        assert_eq!(x, vec![7.0, 8.0]);
    }

    #[test]
    fn handle_keeps_last_request() {
        let mut pending = None;
        let mut stop = false;
        let mut handle = StepHandle::new(0.0, 0.1, 2, 2, &mut pending, &mut stop);
        handle.force_x(&[1.0, 1.0], None).unwrap();
        handle.force_x(&[5.0], Some(&[1])).unwrap();
        handle.request_stop();

        assert!(stop);
        assert_eq!(
            pending,
            Some(Override::Indexed {
                indices: vec![1],
                values: vec![5.0],
            })
        );
    }

    #[test]
    fn rejected_request_leaves_previous_one_queued() {
        let mut pending = None;
        let mut stop = false;
        let mut handle = StepHandle::new(0.0, 0.1, 1, 1, &mut pending, &mut stop);
        handle.force_x(&[3.0], None).unwrap();
        assert!(handle.force_x(&[3.0, 4.0], None).is_err());
        assert_eq!(pending, Some(Override::Whole(vec![3.0])));
    }
}
