// ABOUTME: evald service assembly: configuration, logging and the HTTP server
// ABOUTME: The `evald` binary is a thin clap front end over this library

pub mod config;
pub mod logging;
pub mod server;

pub use config::{Config, ConfigError};
pub use server::{build_app, run_server};
