//! Batch and real-time scenario runs.

use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use ms_sim::{OutputCallback, Simulator, StepHandle};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::models::MachineInputs;
use crate::scenario::{OutputFormat, Scenario};

/// One printed line of simulation output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub step: u64,
    pub t: f64,
    pub x: Vec<f64>,
}

/// Output callback forwarding every N-th settled state to the printer.
pub struct Recorder {
    tx: Sender<Row>,
    every: u64,
    step: u64,
}

impl Recorder {
    pub fn new(tx: Sender<Row>, every: u64) -> Self {
        Self {
            tx,
            every: every.max(1),
            step: 0,
        }
    }
}

impl OutputCallback<MachineInputs> for Recorder {
    fn on_step(
        &mut self,
        _t: f64,
        dt: f64,
        _args: &MachineInputs,
        x: &[f64],
        _sim: &mut StepHandle<'_>,
    ) {
        self.step += 1;
        if self.step % self.every == 0 {
            // A closed channel only means nobody is printing any more.
            let _ = self.tx.send(Row {
                step: self.step,
                t: self.step as f64 * dt,
                x: x.to_vec(),
            });
        }
    }
}

pub struct Printer<W: Write> {
    out: W,
    format: OutputFormat,
    names: &'static [&'static str],
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, format: OutputFormat, names: &'static [&'static str]) -> Self {
        Self { out, format, names }
    }

    pub fn header(&mut self) -> AppResult<()> {
        if self.format == OutputFormat::Table {
            write!(self.out, "{:>8} {:>12}", "step", "t")?;
            for name in self.names {
                write!(self.out, " {:>14}", name)?;
            }
            writeln!(self.out)?;
        }
        Ok(())
    }

    pub fn row(&mut self, row: &Row) -> AppResult<()> {
        match self.format {
            OutputFormat::Table => {
                write!(self.out, "{:>8} {:>12.6}", row.step, row.t)?;
                for v in &row.x {
                    write!(self.out, " {:>14.6}", v)?;
                }
                writeln!(self.out)?;
            }
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, row)?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Summary returned after a run finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps: u64,
    pub t: f64,
    pub x: Vec<f64>,
}

fn build(scenario: &Scenario) -> AppResult<(Simulator<MachineInputs>, Receiver<Row>)> {
    let (tx, rx) = mpsc::channel();
    let sim = scenario.build(Recorder::new(tx, scenario.run.print_every))?;
    Ok((sim, rx))
}

fn summarize(sim: &Simulator<MachineInputs>) -> RunSummary {
    let snap = sim.snapshot();
    RunSummary {
        steps: snap.steps,
        t: snap.t,
        x: snap.x,
    }
}

/// Step `steps` times as fast as possible.
pub fn run_batch<W: Write>(
    scenario: &Scenario,
    steps: u64,
    printer: &mut Printer<W>,
) -> AppResult<RunSummary> {
    let (sim, rx) = build(scenario)?;
    printer.header()?;
    for _ in 0..steps {
        sim.next()?;
        for row in rx.try_iter() {
            printer.row(&row)?;
        }
    }
    Ok(summarize(&sim))
}

/// Step on the wall clock until `duration_s` of simulated time has passed.
pub fn run_realtime<W: Write>(
    scenario: &Scenario,
    duration_s: f64,
    printer: &mut Printer<W>,
) -> AppResult<RunSummary> {
    let (sim, rx) = build(scenario)?;
    let target = (duration_s / sim.delta_t()).ceil() as u64;
    let poll = Duration::from_secs_f64(sim.delta_t_ms() / 1000.0);

    printer.header()?;
    sim.start()?;
    info!(target_steps = target, "running in real time");

    while sim.steps() < target {
        match rx.recv_timeout(poll) {
            Ok(row) => printer.row(&row)?,
            Err(RecvTimeoutError::Timeout) => {
                if !sim.is_running() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    sim.stop();
    for row in rx.try_iter() {
        printer.row(&row)?;
    }

    if let Some(e) = sim.take_error() {
        return Err(e.into());
    }
    let stats = sim.stats();
    if stats.lost_periods > 0 {
        warn!(lost = stats.lost_periods, "steps overran their period");
    }
    Ok(summarize(&sim))
}

pub fn run(scenario: &Scenario) -> AppResult<RunSummary> {
    let stdout = io::stdout();
    let mut printer = Printer::new(
        stdout.lock(),
        scenario.run.format,
        scenario.model.state_names(),
    );
    if scenario.run.realtime {
        run_realtime(scenario, scenario.duration_s(), &mut printer)
    } else {
        run_batch(scenario, scenario.run.steps, &mut printer)
    }
}
