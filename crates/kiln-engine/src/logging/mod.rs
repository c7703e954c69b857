//! Logging setup.
//!
//! The engine itself only emits through the `log` facade. Hosts that want the
//! default `env_logger` backend call [`init_logging`] once at startup.

mod init;

pub use init::{init_logging, LoggingConfig};
