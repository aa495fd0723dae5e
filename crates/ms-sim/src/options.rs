//! Serializable simulator options.
//!
//! Every field has a default, so an empty YAML/JSON map is a valid
//! (empty, all-continuous) configuration.

use std::time::Duration;

use ms_core::{ensure_finite, ensure_positive};
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

fn default_delta_t_ms() -> f64 {
    100.0
}

fn default_speed_factor() -> f64 {
    1.0
}

/// Options for a simulator instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimOptions {
    /// Wall-clock period between scheduled steps (milliseconds).
    #[serde(default = "default_delta_t_ms")]
    pub delta_t_ms: f64,
    /// Simulated seconds per wall-clock second.
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,
    /// Initial state vector. Its length is fixed for the simulator lifetime.
    #[serde(default)]
    pub x0: Vec<f64>,
    /// Number of leading continuous states. `None` means all of `x0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cont_states: Option<usize>,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            delta_t_ms: default_delta_t_ms(),
            speed_factor: default_speed_factor(),
            x0: Vec::new(),
            cont_states: None,
        }
    }
}

/// Options after validation, with derived quantities resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ResolvedOptions {
    pub delta_t: f64,
    pub period: Duration,
    pub cont_states: usize,
}

impl SimOptions {
    /// Create options around an initial state vector.
    pub fn new(x0: impl Into<Vec<f64>>) -> Self {
        Self {
            x0: x0.into(),
            ..Self::default()
        }
    }

    pub fn with_delta_t_ms(mut self, delta_t_ms: f64) -> Self {
        self.delta_t_ms = delta_t_ms;
        self
    }

    pub fn with_speed_factor(mut self, speed_factor: f64) -> Self {
        self.speed_factor = speed_factor;
        self
    }

    pub fn with_cont_states(mut self, cont_states: usize) -> Self {
        self.cont_states = Some(cont_states);
        self
    }

    /// Integration step in simulated seconds: `delta_t_ms * 1e-3 * speed_factor`.
    pub fn delta_t(&self) -> f64 {
        self.delta_t_ms * 1e-3 * self.speed_factor
    }

    /// Check the options without building a simulator.
    pub fn validate(&self) -> SimResult<()> {
        self.resolve().map(|_| ())
    }

    pub(crate) fn resolve(&self) -> SimResult<ResolvedOptions> {
        let delta_t_ms = ensure_positive(self.delta_t_ms, "delta_t_ms")?;
        ensure_positive(self.speed_factor, "speed_factor")?;
        for &v in &self.x0 {
            ensure_finite(v, "x0")?;
        }

        let len = self.x0.len();
        let cont_states = self.cont_states.unwrap_or(len);
        if cont_states > len {
            return Err(SimError::InvalidConfig {
                what: format!("cont_states ({cont_states}) exceeds state length ({len})"),
            });
        }

        let period = Duration::try_from_secs_f64(delta_t_ms / 1000.0).map_err(|e| {
            SimError::InvalidConfig {
                what: format!("delta_t_ms out of range: {e}"),
            }
        })?;
        let delta_t = ensure_positive(self.delta_t(), "delta_t")?;

        Ok(ResolvedOptions {
            delta_t,
            period,
            cont_states,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_documented_values() {
        let opts = SimOptions::default();
        assert_eq!(opts.delta_t_ms, 100.0);
        assert_eq!(opts.speed_factor, 1.0);
        assert!(opts.x0.is_empty());
        assert_eq!(opts.cont_states, None);
    }

    #[test]
    fn cont_states_defaults_to_state_length() {
        let resolved = SimOptions::new([1.0, 2.0, 3.0]).resolve().unwrap();
        assert_eq!(resolved.cont_states, 3);
        assert!((resolved.period.as_secs_f64() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn delta_t_scales_with_speed_factor() {
        let opts = SimOptions::new([0.0])
            .with_delta_t_ms(20.0)
            .with_speed_factor(2.0);
        assert!((opts.delta_t() - 0.04).abs() < 1e-15);
        let resolved = opts.resolve().unwrap();
        assert!((resolved.period.as_secs_f64() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn cont_states_beyond_length_is_rejected() {
        let err = SimOptions::new([0.0, 1.0])
            .with_cont_states(3)
            .validate()
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig { .. }));
    }

    #[test]
    fn zero_continuous_states_is_allowed() {
        let resolved = SimOptions::new([0.0, 1.0])
            .with_cont_states(0)
            .resolve()
            .unwrap();
        assert_eq!(resolved.cont_states, 0);
    }

    #[test]
    fn non_positive_timing_is_rejected() {
        assert!(SimOptions::new([0.0]).with_delta_t_ms(0.0).validate().is_err());
        assert!(SimOptions::new([0.0]).with_delta_t_ms(-5.0).validate().is_err());
        assert!(SimOptions::new([0.0]).with_speed_factor(0.0).validate().is_err());
        assert!(
            SimOptions::new([0.0])
                .with_speed_factor(f64::NAN)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn non_finite_initial_state_is_rejected() {
        assert!(SimOptions::new([0.0, f64::INFINITY]).validate().is_err());
    }
}
