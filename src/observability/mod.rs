//! Observability: structured logging setup for host services.

pub mod logging;

pub use logging::{ColorChoice, LogFormat, init_logging};
