use crate::{CoreError, CoreResult};

pub fn ensure_finite(v: f64, what: &'static str) -> CoreResult<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Finite and strictly greater than zero.
pub fn ensure_positive(v: f64, what: &'static str) -> CoreResult<f64> {
    match ensure_finite(v, what)? {
        v if v > 0.0 => Ok(v),
        v => Err(CoreError::NotPositive { what, value: v }),
    }
}

pub fn ensure_index(index: usize, len: usize, what: &'static str) -> CoreResult<usize> {
    if index < len {
        Ok(index)
    } else {
        Err(CoreError::IndexOutOfBounds { what, index, len })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn positive_values_pass_through_unchanged(v in 1e-12_f64..1e12) {
            prop_assert_eq!(ensure_positive(v, "v"), Ok(v));
        }

        #[test]
        fn non_positive_values_are_rejected(v in -1e12_f64..=0.0) {
            let rejected = matches!(ensure_positive(v, "v"), Err(CoreError::NotPositive { .. }));
            prop_assert!(rejected);
        }
    }
}
