//! Scenario files: simulator options, model choice, inputs and run settings.

use std::path::Path;

use ms_core::ensure_positive;
use ms_sim::{Model, OutputCallback, OutputChain, SimConfig, SimOptions, Simulator};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{DcMotor, MachineInputs, RlCircuit, Saturation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub sim: SimOptions,
    pub model: ModelDef,
    #[serde(default)]
    pub inputs: MachineInputs,
    #[serde(default)]
    pub run: RunDef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelDef {
    RlCircuit(RlCircuit),
    DcMotor(DcMotor),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

fn default_steps() -> u64 {
    100
}

fn default_print_every() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDef {
    /// Steps to run in batch mode.
    #[serde(default = "default_steps")]
    pub steps: u64,
    /// Pace steps against the wall clock instead of running flat out.
    #[serde(default)]
    pub realtime: bool,
    /// Simulated duration for real-time runs (seconds). Defaults to `steps * delta_t`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_s: Option<f64>,
    /// Print every N-th step.
    #[serde(default = "default_print_every")]
    pub print_every: u64,
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for RunDef {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            realtime: false,
            duration_s: None,
            print_every: default_print_every(),
            format: OutputFormat::default(),
        }
    }
}

impl ModelDef {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelDef::RlCircuit(_) => "rl_circuit",
            ModelDef::DcMotor(_) => "dc_motor",
        }
    }

    pub fn state_len(&self) -> usize {
        match self {
            ModelDef::RlCircuit(_) => RlCircuit::STATES,
            ModelDef::DcMotor(_) => DcMotor::STATES,
        }
    }

    pub fn cont_states(&self) -> usize {
        match self {
            ModelDef::RlCircuit(_) => RlCircuit::CONT_STATES,
            ModelDef::DcMotor(_) => DcMotor::CONT_STATES,
        }
    }

    pub fn state_names(&self) -> &'static [&'static str] {
        match self {
            ModelDef::RlCircuit(_) => &["i"],
            ModelDef::DcMotor(_) => &["i_a", "omega", "supply_toggles"],
        }
    }

    /// Derived figures worth showing next to the raw parameters.
    pub fn characteristics(&self, inputs: &MachineInputs) -> Vec<(&'static str, f64)> {
        match self {
            ModelDef::RlCircuit(circuit) => vec![
                ("time constant (s)", circuit.time_constant()),
                ("steady current (A)", circuit.steady_current(inputs.voltage)),
            ],
            ModelDef::DcMotor(motor) => vec![
                ("mean supply (V)", inputs.voltage * motor.duty),
                (
                    "no-load speed (rad/s)",
                    motor.no_load_speed(inputs.voltage * motor.duty),
                ),
            ],
        }
    }

    fn validate(&self) -> AppResult<()> {
        match self {
            ModelDef::RlCircuit(circuit) => {
                ensure_positive(circuit.r_ohm, "r_ohm")?;
                ensure_positive(circuit.l_h, "l_h")?;
            }
            ModelDef::DcMotor(motor) => {
                ensure_positive(motor.r_ohm, "r_ohm")?;
                ensure_positive(motor.l_h, "l_h")?;
                ensure_positive(motor.k_phi, "k_phi")?;
                ensure_positive(motor.j_kgm2, "j_kgm2")?;
                ensure_positive(motor.chopper_period_s, "chopper_period_s")?;
                if motor.b_nms.is_nan() || motor.b_nms < 0.0 {
                    return Err(AppError::Scenario {
                        what: "b_nms must be non-negative".to_string(),
                    });
                }
                if !(0.0..=1.0).contains(&motor.duty) {
                    return Err(AppError::Scenario {
                        what: format!("duty must lie in [0, 1], got {}", motor.duty),
                    });
                }
                if let Some(limit) = motor.i_max {
                    ensure_positive(limit, "i_max")?;
                }
            }
        }
        Ok(())
    }

    fn into_parts(self) -> (Box<dyn Model<MachineInputs>>, Option<Saturation>) {
        match self {
            ModelDef::RlCircuit(circuit) => {
                let model: Box<dyn Model<MachineInputs>> = Box::new(circuit);
                (model, None)
            }
            ModelDef::DcMotor(motor) => {
                let saturation = motor.i_max.map(|limit| Saturation { index: 0, limit });
                let model: Box<dyn Model<MachineInputs>> = Box::new(motor);
                (model, saturation)
            }
        }
    }
}

impl Scenario {
    pub fn validate(&self) -> AppResult<()> {
        self.sim.validate()?;
        self.model.validate()?;

        let len = self.sim.x0.len();
        if len != self.model.state_len() {
            return Err(AppError::Scenario {
                what: format!(
                    "{} expects {} states, x0 has {}",
                    self.model.kind(),
                    self.model.state_len(),
                    len
                ),
            });
        }
        let cont = self.sim.cont_states.unwrap_or(len);
        if cont != self.model.cont_states() {
            return Err(AppError::Scenario {
                what: format!(
                    "{} has {} continuous states, cont_states is {}",
                    self.model.kind(),
                    self.model.cont_states(),
                    cont
                ),
            });
        }
        if self.run.print_every == 0 {
            return Err(AppError::Scenario {
                what: "print_every must be at least 1".to_string(),
            });
        }
        if let Some(d) = self.run.duration_s {
            ensure_positive(d, "duration_s")?;
        }
        Ok(())
    }

    /// Simulated time a run covers.
    pub fn duration_s(&self) -> f64 {
        self.run
            .duration_s
            .unwrap_or(self.run.steps as f64 * self.sim.delta_t())
    }

    /// Build a stopped simulator. `output` runs after the model's own
    /// output callbacks (saturation).
    pub fn build(
        &self,
        output: impl OutputCallback<MachineInputs> + 'static,
    ) -> AppResult<Simulator<MachineInputs>> {
        self.validate()?;
        let (model, saturation) = self.model.clone().into_parts();

        let mut chain = OutputChain::new();
        if let Some(saturation) = saturation {
            chain = chain.then(saturation);
        }
        let config = SimConfig::with_args(self.sim.clone(), self.inputs).with_output(chain.then(output));
        Ok(Simulator::new(config, model)?)
    }
}

pub fn load(path: &Path) -> AppResult<Scenario> {
    let content = std::fs::read_to_string(path)?;
    let scenario: Scenario = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };
    scenario.validate()?;
    Ok(scenario)
}
