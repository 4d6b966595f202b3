//! Command implementations.

mod control;
mod run;
mod validate;

pub use control::{run_control, ControlAction};
pub use run::run_router;
pub use validate::run_validate;
