//! Error types for CVEMAP-RELAY
//!
//! Every failure in the pipeline is recovered at the boundary where it occurs
//! and converted into one in-band text chunk; nothing here ever reaches the
//! end caller as a broken stream.

use std::io;
use thiserror::Error;

/// Result type alias for CVEMAP-RELAY operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for CVEMAP-RELAY
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Command line exceeds the input ceiling
    #[error("Command too long: {length} characters (limit: {limit})")]
    InputTooLong {
        /// Actual input length
        length: usize,
        /// Maximum accepted length
        limit: usize,
    },

    /// A value-taking flag appeared as the last token
    #[error("Flag {0} expects a value but none was given")]
    MissingFlagValue(String),

    /// Natural-language derivation produced no usable command
    #[error("No JSON command block found in model response")]
    NoJsonCommand,

    /// Network errors
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Repaired lookup payload failed to parse
    #[error("Upstream decode failure: {0}")]
    UpstreamDecode(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Model invocation error
    #[error("Model error: {0}")]
    Model(String),
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config(message.into())
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Error::Network(message.into())
    }

    /// Check whether the error carries a message worth showing verbatim
    /// to the end user, as opposed to the generic unknown-failure fallback.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Error::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_too_long_message() {
        let err = Error::InputTooLong {
            length: 620,
            limit: 500,
        };
        let text = err.to_string();
        assert!(text.contains("620"));
        assert!(text.contains("500"));
    }

    #[test]
    fn test_missing_flag_value_names_flag() {
        let err = Error::MissingFlagValue("-severity".to_string());
        assert!(err.to_string().contains("-severity"));
    }

    #[test]
    fn test_reportable() {
        assert!(Error::network("connection reset").is_reportable());
        assert!(!Error::Io(io::Error::other("disk gone")).is_reportable());
    }
}
