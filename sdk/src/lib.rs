//! TiaBridge SDK
//!
//! Shared library providing the error taxonomy and wire types used across
//! TiaBridge components. This crate is used by the engine and by any
//! transport layer built on top of it.

/// Error types and handling
pub mod errors;

/// Wire types shared between the engine and transports
pub mod types;

// Re-export commonly used types
pub use errors::{BridgeErrorExt, EngineError};
pub use types::{Answer, Cursor, Page, StepErrorKind};
