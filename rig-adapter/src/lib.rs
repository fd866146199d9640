//! # rig-instruct-adapter
//!
//! Drive the rig-instruct retry loop through any Rig `CompletionModel`.
//!
//! Every provider Rig supports (OpenAI, Anthropic, Gemini, Ollama, ...) can
//! produce validated, typed responses by wrapping its completion model in a
//! [`RigAdapter`].
//!
//! ## Example
//!
//! ```no_run
//! # use rig::client::{CompletionClient, ProviderClient};
//! # use rig_instruct::prelude::*;
//! # use rig_instruct_adapter::RigAdapter;
//! # use schemars::JsonSchema;
//! # use serde::Deserialize;
//! #[derive(Debug, Deserialize, JsonSchema)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! impl ResponseModel for Person {}
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = rig::providers::openai::Client::from_env();
//! let adapter = RigAdapter::new(client.completion_model("gpt-4o"));
//!
//! let person = Instructor::new(adapter)
//!     .max_retries(2)
//!     .include_usage(true)
//!     .instruct::<Person>(Params::from_prompt("John is 25 years old."))
//!     .await?;
//! # Ok(())
//! # }
//! ```

/// Conversions between rig-instruct params and Rig types.
pub mod convert;

use std::fmt;

use async_trait::async_trait;
use rig::completion::{CompletionModel, ToolDefinition};
use rig_instruct::json::extract_json;
use rig_instruct::prompt::{with_retry_feedback, with_schema_instructions};
use rig_instruct::{
    AdapterError, Adapter, Mode, Params, ParseError, PromptContext, Usage, ValidationErrors,
};
use serde_json::Value;

pub use convert::{RigRequest, RigResponse};

/// Retries used when the call does not set `max_retries`.
pub const DEFAULT_MAX_RETRIES: usize = 1;

/// Adapter over a Rig completion model.
///
/// Prompts follow the chat conventions of `rig_instruct::prompt`: schema
/// instructions become the preamble, and retries echo the rejected answer
/// followed by the validation feedback. In [`Mode::Tools`] the schema is
/// also registered as a tool and the tool-call arguments are parsed instead
/// of the text.
#[derive(Clone)]
pub struct RigAdapter<M> {
    model: M,
    max_retries: usize,
}

impl<M> fmt::Debug for RigAdapter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RigAdapter")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl<M: CompletionModel> RigAdapter<M> {
    /// Wraps `model`.
    #[must_use]
    pub const fn new(model: M) -> Self {
        Self {
            model,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Retries used when the call does not set `max_retries`.
    #[must_use]
    pub fn with_default_max_retries(mut self, max: usize) -> Self {
        self.max_retries = max;
        self
    }

    /// The wrapped model.
    #[must_use]
    pub const fn model(&self) -> &M {
        &self.model
    }
}

fn schema_tool(ctx: &PromptContext<'_>) -> ToolDefinition {
    ToolDefinition {
        name: ctx.schema.name.clone(),
        description: ctx
            .schema
            .description
            .clone()
            .unwrap_or_else(|| format!("Respond with a {} object.", ctx.schema.name)),
        parameters: ctx.schema.schema.clone(),
    }
}

#[async_trait]
impl<M> Adapter for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    type Response = RigResponse;

    fn initial_prompt(&self, params: Params, ctx: &PromptContext<'_>) -> Params {
        with_schema_instructions(params, ctx)
    }

    async fn send_request(
        &self,
        params: &Params,
        ctx: &PromptContext<'_>,
    ) -> Result<RigResponse, AdapterError> {
        let request = convert::to_rig_request(params)?;
        tracing::debug!(
            target: "rig_instruct",
            history = request.history.len(),
            attempt = ctx.attempt + 1,
            "Sending Rig completion request"
        );

        let mut builder = self
            .model
            .completion_request(request.prompt)
            .messages(request.history);
        if let Some(preamble) = request.preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        if ctx.mode == Mode::Tools {
            builder = builder.tool(schema_tool(ctx));
        }

        let response = builder.send().await.map_err(convert::adapter_error)?;
        Ok(convert::from_rig_choice(
            &response.choice,
            &response.usage,
            &ctx.schema.name,
        ))
    }

    fn retry_prompt(
        &self,
        params: Params,
        response_params: Option<&Value>,
        errors: &ValidationErrors,
        response: &RigResponse,
        ctx: &PromptContext<'_>,
    ) -> Params {
        with_retry_feedback(params, response_params, errors, &response.raw_text(), ctx)
    }

    fn parse_response(
        &self,
        response: &RigResponse,
        ctx: &PromptContext<'_>,
    ) -> Result<Value, ParseError> {
        match (&response.tool_arguments, ctx.mode) {
            (Some(arguments), _) => Ok(arguments.clone()),
            (None, Mode::Tools) if response.text.trim().is_empty() => Err(ParseError::new(
                format!("model did not call the {} tool", ctx.schema.name),
            )),
            (None, mode) => extract_json(&response.text, mode),
        }
    }

    fn extract_usage(&self, response: &RigResponse) -> Option<Usage> {
        Some(response.usage.clone())
    }

    fn default_max_retries(&self) -> usize {
        self.max_retries
    }
}
