// CVEMAP-RELAY: Streaming Text-Command Front End for Vulnerability Lookup
// Copyright (c) 2025 CVEMAP-RELAY Core Team

//! # CVEMAP-RELAY Library
//!
//! A command-grammar front end to a vulnerability lookup service. Text lines
//! in the `/cvemap` family are recognized, parsed into typed option sets,
//! projected into search requests, and driven through a streaming pipeline
//! that keeps the caller informed while the lookup runs and renders the
//! results as markdown reports.

#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_qualifications,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

// Core modules
pub mod client;
pub mod command;
pub mod config;
pub mod derive;
pub mod error;
pub mod render;
pub mod request;
pub mod stream;
pub mod types;

// Re-exports for convenience
pub use crate::client::{LookupClient, VulnLookup};
pub use crate::command::{CommandRecognizer, OptionSet};
pub use crate::config::RelayConfig;
pub use crate::derive::{CommandModel, Derivation, DerivedCommand};
pub use crate::error::{Error, Result};
pub use crate::request::RequestBody;
pub use crate::stream::{ResultStreamAssembler, StreamOutcome, StreamedResponse};
pub use crate::types::CveRecord;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    pub use crate::client::{LookupClient, VulnLookup};
    pub use crate::command::{CommandRecognizer, OptionSet};
    pub use crate::config::RelayConfig;
    pub use crate::error::{Error, Result};
    pub use crate::request::RequestBody;
    pub use crate::stream::{ResultStreamAssembler, StreamOutcome, StreamedResponse};
    pub use async_trait::async_trait;
}
