// Library exports shared by the `escrow` binary and its tests

pub mod logging;
pub mod state;

pub use state::{AppConfig, AppState, StateError};
