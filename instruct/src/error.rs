//! Error types for adapters and the instruct loop.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::usage::Metadata;
use crate::validation::ValidationErrors;

/// Failures raised by an adapter while talking to its provider.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Adapter is misconfigured or missing credentials.
    #[error("adapter not configured: {reason}")]
    Configuration {
        /// Additional context for the failure.
        reason: String,
    },

    /// The parameters could not be turned into a provider request.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Why the request could not be built.
        reason: String,
    },

    /// Network, protocol or process failure.
    #[error("transport error: {reason}")]
    Transport {
        /// Additional context about the error.
        reason: String,
    },

    /// The provider rejected the request due to rate limiting.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Suggested delay before retrying.
        retry_after: Option<Duration>,
    },

    /// The provider answered with something the adapter cannot read.
    #[error("response error: {reason}")]
    Response {
        /// Additional context about the response failure.
        reason: String,
    },
}

impl AdapterError {
    /// Convenience constructor for configuration issues.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for invalid requests.
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for unreadable responses.
    #[must_use]
    pub fn response(reason: impl Into<String>) -> Self {
        Self::Response {
            reason: reason.into(),
        }
    }
}

/// The expected structure could not be found in a provider response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ParseError {
    /// What was missing or malformed.
    pub reason: String,
    /// The raw text that was inspected, when the response had any.
    pub raw_text: Option<String>,
}

impl ParseError {
    /// Creates a parse error without raw text.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raw_text: None,
        }
    }

    /// Attaches the raw text that failed to parse.
    #[must_use]
    pub fn with_raw_text(mut self, raw_text: impl Into<String>) -> Self {
        self.raw_text = Some(raw_text.into());
        self
    }
}

/// Record of one failed attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// The attempt number (1-indexed).
    pub attempt_number: usize,
    /// The decoded JSON, or `None` when the response could not be parsed.
    pub submitted_json: Option<Value>,
    /// Why the attempt was rejected.
    pub errors: ValidationErrors,
    /// Time since the call began when the attempt finished.
    pub elapsed: Duration,
}

/// Errors returned by [`crate::instruct`].
#[derive(Debug, Error)]
pub enum InstructError {
    /// Sending a request failed. Never retried.
    #[error("request failed on attempt {attempt}: {source}")]
    Transport {
        /// The adapter failure.
        #[source]
        source: AdapterError,
        /// The attempt (1-indexed) whose request failed.
        attempt: usize,
        /// Usage of the attempts completed before the failure, when requested.
        metadata: Option<Metadata>,
    },

    /// Every attempt failed validation.
    #[error("response failed validation after {attempts} attempt(s):\n{errors}")]
    Validation {
        /// Errors of the last attempt.
        errors: ValidationErrors,
        /// Number of attempts made.
        attempts: usize,
        /// Every failed attempt, oldest first.
        history: Vec<AttemptRecord>,
        /// Usage of every attempt, when requested.
        metadata: Option<Metadata>,
    },

    /// The response schema is not a valid JSON Schema.
    #[error("invalid response schema: {0}")]
    Schema(String),
}

impl InstructError {
    /// Usage metadata attached to the failure, if it was requested.
    #[must_use]
    pub const fn metadata(&self) -> Option<&Metadata> {
        match self {
            Self::Transport { metadata, .. } | Self::Validation { metadata, .. } => {
                metadata.as_ref()
            }
            Self::Schema(_) => None,
        }
    }

    /// The final validation errors, if retries were exhausted.
    #[must_use]
    pub const fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }
}
