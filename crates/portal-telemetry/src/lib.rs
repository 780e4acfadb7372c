//! # Portal Telemetry
//!
//! Structured logging for the client portal, built on `tracing` and
//! `tracing-subscriber`. Libraries in the workspace only emit events; the
//! binary installs the subscriber once through [`init_logging`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
