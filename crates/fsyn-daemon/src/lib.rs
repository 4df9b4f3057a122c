//! # fsyn-daemon
//!
//! HTTP front end for fsyn endpoints.
//!
//! [`config`] loads `fsyn.toml`, [`api`] builds the axum router over
//! [`fsyn_core::Transfer`], and [`envelope`] renders results as
//! `{ok, data}` / `{ok, message}` JSON with the status of each failure kind.

pub mod api;
pub mod config;
pub mod envelope;

pub use api::{app, routes, AppState, Limits};
pub use config::{ConfigError, DaemonConfig};
