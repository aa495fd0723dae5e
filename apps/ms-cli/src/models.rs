//! Electric-machine teaching models.

use ms_sim::{Model, OutputCallback, SimResult, StepHandle};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Inputs an operator adjusts while the simulation runs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MachineInputs {
    /// Supply voltage (V).
    #[serde(default)]
    pub voltage: f64,
    /// Load torque on the shaft (N·m).
    #[serde(default)]
    pub load_torque: f64,
}

/// Series RL circuit driven by the supply voltage.
///
/// State: `[i]`, continuous.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RlCircuit {
    pub r_ohm: f64,
    pub l_h: f64,
}

impl RlCircuit {
    pub const STATES: usize = 1;
    pub const CONT_STATES: usize = 1;

    pub fn time_constant(&self) -> f64 {
        self.l_h / self.r_ohm
    }

    pub fn steady_current(&self, voltage: f64) -> f64 {
        voltage / self.r_ohm
    }
}

impl Model<MachineInputs> for RlCircuit {
    fn evaluate(
        &mut self,
        _t: f64,
        _dt: f64,
        args: &MachineInputs,
        x: &[f64],
        _sim: &mut StepHandle<'_>,
    ) -> SimResult<Vec<f64>> {
        let i = x[0];
        Ok(vec![(args.voltage - self.r_ohm * i) / self.l_h])
    }
}

/// Separately excited DC motor fed through an on/off chopper.
///
/// State: `[i_a, omega, supply_toggles]`. Armature current and speed are
/// continuous; the discrete state counts how often the chopper has switched
/// the supply on or off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DcMotor {
    /// Armature resistance (ohm).
    pub r_ohm: f64,
    /// Armature inductance (H).
    pub l_h: f64,
    /// Flux constant (V·s/rad, equal to N·m/A).
    pub k_phi: f64,
    /// Rotor inertia (kg·m²).
    pub j_kgm2: f64,
    /// Viscous friction (N·m·s/rad).
    pub b_nms: f64,
    /// Chopper period (s).
    pub chopper_period_s: f64,
    /// Fraction of each chopper period the supply is connected.
    pub duty: f64,
    /// Armature current limit (A), enforced through [`Saturation`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i_max: Option<f64>,
}

impl DcMotor {
    pub const STATES: usize = 3;
    pub const CONT_STATES: usize = 2;

    pub fn supply_on(&self, t: f64) -> bool {
        (t / self.chopper_period_s).fract() < self.duty
    }

    /// No-load speed for a constant applied voltage, ignoring friction.
    pub fn no_load_speed(&self, voltage: f64) -> f64 {
        voltage / self.k_phi
    }
}

impl Model<MachineInputs> for DcMotor {
    fn evaluate(
        &mut self,
        t: f64,
        dt: f64,
        args: &MachineInputs,
        x: &[f64],
        _sim: &mut StepHandle<'_>,
    ) -> SimResult<Vec<f64>> {
        let (i_a, omega, toggles) = (x[0], x[1], x[2]);
        let on = self.supply_on(t);
        let u = if on { args.voltage } else { 0.0 };
        let switched = t >= dt && on != self.supply_on(t - dt);

        let di = (u - self.r_ohm * i_a - self.k_phi * omega) / self.l_h;
        let domega = (self.k_phi * i_a - self.b_nms * omega - args.load_torque) / self.j_kgm2;
        Ok(vec![di, domega, toggles + f64::from(u8::from(switched))])
    }
}

/// Clamps one state to `[-limit, limit]` by forcing it on the next step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Saturation {
    pub index: usize,
    pub limit: f64,
}

impl<A> OutputCallback<A> for Saturation {
    fn on_step(&mut self, t: f64, _dt: f64, _args: &A, x: &[f64], sim: &mut StepHandle<'_>) {
        let v = x[self.index];
        if v.abs() > self.limit {
            let clamped = self.limit.copysign(v);
            if let Err(e) = sim.force_x(&[clamped], Some(&[self.index])) {
                warn!(t, error = %e, "saturation could not be applied");
            }
        }
    }
}
