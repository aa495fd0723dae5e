//! Real-time hybrid continuous/discrete simulation engine.
//!
//! Provides:
//! - A mixed state vector: leading continuous states integrated with
//!   fixed-step forward Euler, trailing discrete states replaced verbatim
//! - State forcing requested from inside model/output callbacks
//! - Wall-clock paced periodic stepping on a timer thread, with manual
//!   single-stepping available at any time
//!
//! Simulated time advances by the configured step on every step and never
//! depends on measured wall-clock time.

pub mod config;
pub mod error;
pub mod forcing;
pub mod model;
pub mod options;
pub mod schedule;
pub mod simulator;

// Internal modules
mod engine;

// Re-exports for public API
pub use config::SimConfig;
pub use error::{SimError, SimResult};
pub use forcing::StepHandle;
pub use model::{FnModel, FnOutput, Model, OutputCallback, OutputChain, model_fn, output_fn};
pub use options::SimOptions;
pub use schedule::ScheduleStats;
pub use simulator::{SimSnapshot, Simulator};
