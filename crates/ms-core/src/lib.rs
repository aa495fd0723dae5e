//! ms-core: value guards shared by the simulator and its drivers.
//!
//! Contains:
//! - guard (finite / positive / in-bounds checks for configuration values)
//! - error (the error those checks report)

pub mod error;
pub mod guard;

pub use error::{CoreError, CoreResult};
pub use guard::{ensure_finite, ensure_index, ensure_positive};
