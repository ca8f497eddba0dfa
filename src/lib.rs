// Public API - the lifecycle manager and the runner that builds it
pub mod error;
pub mod io;
pub mod lifecycle;
pub mod runner;
pub mod telemetry;

// Internal modules
mod config;
