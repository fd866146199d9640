//! The provider contract consumed by the retry loop.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Mode;
use crate::error::{AdapterError, ParseError};
use crate::params::Params;
use crate::usage::Usage;
use crate::validation::{ResponseSchema, ValidationErrors};

/// Per-attempt view of the call handed to every adapter hook.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    /// The schema the response must satisfy.
    pub schema: &'a ResponseSchema,
    /// How the model is asked to emit JSON.
    pub mode: Mode,
    /// Current attempt, starting at 0.
    pub attempt: usize,
    /// Retries allowed after the first attempt.
    pub max_retries: usize,
}

impl PromptContext<'_> {
    /// Total attempts the call may make.
    #[must_use]
    pub const fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    /// Whether another attempt follows a failure of this one.
    #[must_use]
    pub const fn has_retries_left(&self) -> bool {
        self.attempt < self.max_retries
    }
}

/// A provider-specific strategy for prompting, sending and parsing.
///
/// The loop calls [`Adapter::initial_prompt`] once, then for every attempt
/// [`Adapter::send_request`], [`Adapter::extract_usage`] (only when usage was
/// requested) and [`Adapter::parse_response`]; [`Adapter::retry_prompt`] runs
/// between a rejected attempt and the next one.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// The raw provider answer.
    type Response: Send + Sync;

    /// Prepares the first request, e.g. by adding schema instructions.
    fn initial_prompt(&self, params: Params, ctx: &PromptContext<'_>) -> Params;

    /// Performs one request.
    async fn send_request(
        &self,
        params: &Params,
        ctx: &PromptContext<'_>,
    ) -> Result<Self::Response, AdapterError>;

    /// Prepares the next request after a rejected attempt.
    ///
    /// `response_params` is the decoded JSON of the rejected attempt, or
    /// `None` when the response could not be parsed.
    fn retry_prompt(
        &self,
        params: Params,
        response_params: Option<&Value>,
        errors: &ValidationErrors,
        response: &Self::Response,
        ctx: &PromptContext<'_>,
    ) -> Params;

    /// Pulls the JSON document out of a response.
    fn parse_response(
        &self,
        response: &Self::Response,
        ctx: &PromptContext<'_>,
    ) -> Result<Value, ParseError>;

    /// Token usage of a response; `None` means the adapter does not report
    /// usage, and an empty record is used instead.
    fn extract_usage(&self, _response: &Self::Response) -> Option<Usage> {
        None
    }

    /// Retries used when the configuration does not set `max_retries`.
    fn default_max_retries(&self) -> usize {
        0
    }
}
