//! TiaBridge Engine Library
//!
//! This library provides the core functionality of the TiaBridge engine:
//! a natural-language query execution engine over Celestia analytics. A
//! free-form question is turned into a validated plan of API calls against
//! the local analytics API and the upstream Cosmos REST API, executed with
//! transparent pagination and incremental aggregation, and rendered into a
//! bounded, source-faithful answer.
//!
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Operation registry: the declarative catalog of callable operations
pub mod registry;

/// Data endpoint adapters (local analytics API, upstream Cosmos REST)
pub mod endpoint;

/// Pagination walker and incremental reducers
pub mod paginate;

/// LLM provider abstraction layer
pub mod llm;

/// Query planner: question -> validated plan
pub mod planner;

/// Plan executor: plan -> result bundle
pub mod executor;

/// Response formatter: result bundle -> answer
pub mod formatter;

/// Language detection and localized strings
pub mod locale;

/// Chat assistant wiring planner, executor, and formatter
pub mod assistant;

/// Web chat transport
pub mod server;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
