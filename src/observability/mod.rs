//! Logging setup for applications embedding the client.

mod logging;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
