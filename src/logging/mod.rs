//! Structured logging setup and JSON-lines output.

mod format;

pub use format::StructuredLogger;
