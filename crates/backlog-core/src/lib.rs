//! backlog-core library: sprint lifecycle, backlog items and the dual
//! history ledger over SQLite.
//!
//! # Conventions
//!
//! - **Errors**: services return [`error::Result`]; `anyhow::Result` only
//!   where a failure is reported rather than matched (database open, config
//!   loading).
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod service;

pub use error::{BacklogError, ErrorKind, Result};
pub use service::Services;
