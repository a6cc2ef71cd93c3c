//! Error types and taxonomy.

mod error;

pub use error::{ErrorKind, TransportError, TransportResult};
