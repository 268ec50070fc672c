//! App module - wiring and the operational command runner.

mod runtime;
mod state;

pub use runtime::{Command, run};
pub use state::AppState;
