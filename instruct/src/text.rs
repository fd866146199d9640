//! An adapter over any async text-completion function.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::adapter::{Adapter, PromptContext};
use crate::error::{AdapterError, ParseError};
use crate::json::extract_json;
use crate::params::Params;
use crate::prompt::{render_transcript, with_retry_feedback, with_schema_instructions};
use crate::usage::{estimate_tokens, Usage};
use crate::validation::ValidationErrors;

type CompleteFn = Arc<dyn Fn(Params) -> BoxFuture<'static, Result<String, String>> + Send + Sync>;

/// Text answer of an [`FnAdapter`] request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextResponse {
    /// What the function returned.
    pub text: String,
    /// The transcript that was sent, used for usage estimates.
    pub prompt: String,
}

/// Adapter that delegates the request to a caller-supplied async function.
///
/// Useful for backends without a dedicated adapter (local models, CLI agents,
/// test doubles). The function receives the full [`Params`] and returns the
/// model's text, or an error string treated as a transport failure.
///
/// # Examples
///
/// ```
/// use rig_instruct::text::FnAdapter;
///
/// let adapter = FnAdapter::from_prompt_fn(|prompt: String| async move {
///     assert!(prompt.starts_with("System:"));
///     Ok::<_, String>(r#"{"name": "John", "age": 25}"#.to_string())
/// })
/// .estimate_usage(true);
/// ```
#[derive(Clone)]
pub struct FnAdapter {
    complete: CompleteFn,
    estimate_usage: bool,
    max_retries: usize,
}

impl fmt::Debug for FnAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAdapter")
            .field("estimate_usage", &self.estimate_usage)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl FnAdapter {
    /// Wraps a function that receives the request parameters.
    pub fn new<F, Fut>(complete: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        Self {
            complete: Arc::new(move |params| complete(params).boxed()),
            estimate_usage: false,
            max_retries: 0,
        }
    }

    /// Wraps a function that receives the conversation flattened to one string.
    pub fn from_prompt_fn<F, Fut>(complete: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        Self::new(move |params: Params| complete(render_transcript(&params)))
    }

    /// Report usage estimated with the 4-chars-per-token heuristic.
    #[must_use]
    pub fn estimate_usage(mut self, enabled: bool) -> Self {
        self.estimate_usage = enabled;
        self
    }

    /// Retries used when the call does not configure `max_retries`.
    #[must_use]
    pub fn with_default_max_retries(mut self, max: usize) -> Self {
        self.max_retries = max;
        self
    }
}

#[async_trait]
impl Adapter for FnAdapter {
    type Response = TextResponse;

    fn initial_prompt(&self, params: Params, ctx: &PromptContext<'_>) -> Params {
        with_schema_instructions(params, ctx)
    }

    async fn send_request(
        &self,
        params: &Params,
        _ctx: &PromptContext<'_>,
    ) -> Result<TextResponse, AdapterError> {
        let prompt = render_transcript(params);
        let text = (self.complete)(params.clone())
            .await
            .map_err(AdapterError::transport)?;
        Ok(TextResponse { text, prompt })
    }

    fn retry_prompt(
        &self,
        params: Params,
        response_params: Option<&Value>,
        errors: &ValidationErrors,
        response: &TextResponse,
        ctx: &PromptContext<'_>,
    ) -> Params {
        with_retry_feedback(params, response_params, errors, &response.text, ctx)
    }

    fn parse_response(
        &self,
        response: &TextResponse,
        ctx: &PromptContext<'_>,
    ) -> Result<Value, ParseError> {
        extract_json(&response.text, ctx.mode)
    }

    fn extract_usage(&self, response: &TextResponse) -> Option<Usage> {
        self.estimate_usage.then(|| {
            Usage::new()
                .with("input_tokens", estimate_tokens(&response.prompt))
                .with("output_tokens", estimate_tokens(&response.text))
        })
    }

    fn default_max_retries(&self) -> usize {
        self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::Instructor;

    #[test]
    fn test_debug_skips_the_function() {
        let adapter = FnAdapter::new(|_params: Params| async { Ok::<_, String>(String::new()) })
            .with_default_max_retries(2);
        let printed = format!("{:?}", Instructor::new(adapter));
        assert!(printed.contains("FnAdapter { estimate_usage: false, max_retries: 2, .. }"));
    }
}
