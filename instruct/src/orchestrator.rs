//! The bounded request, validate and retry loop.

use serde_json::Value;
use tokio::time::Instant;

use crate::adapter::{Adapter, PromptContext};
use crate::config::{InstructConfig, Mode};
use crate::error::{AttemptRecord, InstructError};
use crate::params::Params;
use crate::usage::{Metadata, Usage};
use crate::validation::{ResponseModel, ResponseSchema, SchemaValidator, ValidationErrors};

/// A validated response.
#[derive(Debug, Clone, PartialEq)]
pub struct Instructed<T> {
    /// The decoded and validated value.
    pub value: T,
    /// Attempts made, including the successful one.
    pub attempts: usize,
    /// Usage of every attempt; `None` unless usage was requested.
    pub metadata: Option<Metadata>,
}

impl<T> Instructed<T> {
    /// Splits into the value and the optional metadata.
    pub fn into_parts(self) -> (T, Option<Metadata>) {
        (self.value, self.metadata)
    }
}

/// State carried from one attempt to the next.
struct Attempts {
    index: usize,
    params: Params,
    usages: Vec<Usage>,
}

impl Attempts {
    fn metadata(&self, include_usage: bool) -> Option<Metadata> {
        include_usage.then(|| Metadata::from_attempts(self.usages.clone()))
    }
}

/// Runs the retry loop for `T`, deriving the schema from its `JsonSchema` impl.
///
/// # Errors
///
/// See [`instruct_with_schema`].
pub async fn instruct<T, A>(
    adapter: &A,
    params: Params,
    config: &InstructConfig,
) -> Result<Instructed<T>, InstructError>
where
    T: ResponseModel,
    A: Adapter + ?Sized,
{
    instruct_with_schema(adapter, params, &ResponseSchema::of::<T>(), config).await
}

/// Runs the retry loop against an explicit schema.
///
/// Makes at most `max_retries + 1` attempts. Each attempt sends the current
/// params, records usage when requested, parses the response and validates
/// it; a parse failure counts as a validation failure. A rejected attempt with
/// retries left asks the adapter for a corrective prompt and loops.
///
/// # Errors
///
/// - `InstructError::Schema` if `schema` does not compile; nothing is sent.
/// - `InstructError::Transport` as soon as a request fails. Not retried.
/// - `InstructError::Validation` when the last allowed attempt is rejected.
#[tracing::instrument(
    target = "rig_instruct",
    skip_all,
    fields(schema = %schema.name, mode = ?config.mode)
)]
pub async fn instruct_with_schema<T, A>(
    adapter: &A,
    params: Params,
    schema: &ResponseSchema,
    config: &InstructConfig,
) -> Result<Instructed<T>, InstructError>
where
    T: ResponseModel,
    A: Adapter + ?Sized,
{
    let start = Instant::now();
    let validator = SchemaValidator::new(schema)?;
    let max_retries = config
        .max_retries
        .unwrap_or_else(|| adapter.default_max_retries());
    let context = |attempt| PromptContext {
        schema,
        mode: config.mode,
        attempt,
        max_retries,
    };

    let mut history: Vec<AttemptRecord> = Vec::new();
    let mut state = Attempts {
        index: 0,
        params: adapter.initial_prompt(params, &context(0)),
        usages: Vec::new(),
    };

    loop {
        let ctx = context(state.index);
        let attempt_number = state.index + 1;
        tracing::debug!(
            target: "rig_instruct",
            attempt = attempt_number,
            max_attempts = ctx.max_attempts(),
            "Sending request"
        );

        let response = match adapter.send_request(&state.params, &ctx).await {
            Ok(response) => response,
            Err(source) => {
                tracing::error!(
                    target: "rig_instruct",
                    attempt = attempt_number,
                    error = %source,
                    "Request failed"
                );
                return Err(InstructError::Transport {
                    source,
                    attempt: attempt_number,
                    metadata: state.metadata(config.include_usage),
                });
            }
        };

        if config.include_usage {
            state
                .usages
                .push(adapter.extract_usage(&response).unwrap_or_default());
        }

        let (response_params, outcome) = match adapter.parse_response(&response, &ctx) {
            Ok(decoded) => {
                let outcome = validator.decode::<T>(&decoded, &config.validation_context);
                (Some(decoded), outcome)
            }
            Err(e) => (
                None,
                Err(ValidationErrors::single("", format!("could not parse response: {e}"))),
            ),
        };

        let errors = match outcome {
            Ok(value) => {
                tracing::info!(
                    target: "rig_instruct",
                    attempts = attempt_number,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Response validated"
                );
                return Ok(Instructed {
                    value,
                    attempts: attempt_number,
                    metadata: state.metadata(config.include_usage),
                });
            }
            Err(errors) => errors,
        };

        tracing::warn!(
            target: "rig_instruct",
            attempt = attempt_number,
            error_count = errors.len(),
            retries_left = max_retries - state.index,
            "Response rejected"
        );
        history.push(AttemptRecord {
            attempt_number,
            submitted_json: response_params.clone(),
            errors: errors.clone(),
            elapsed: start.elapsed(),
        });

        if !ctx.has_retries_left() {
            return Err(InstructError::Validation {
                errors,
                attempts: attempt_number,
                history,
                metadata: state.metadata(config.include_usage),
            });
        }

        let params = adapter.retry_prompt(
            state.params,
            response_params.as_ref(),
            &errors,
            &response,
            &ctx,
        );
        state = Attempts {
            index: state.index + 1,
            params,
            usages: state.usages,
        };
    }
}

/// Builder bundling an adapter with its configuration.
///
/// ```no_run
/// use rig_instruct::{FnAdapter, Instructor, Params};
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize, JsonSchema)]
/// struct Person {
///     name: String,
///     age: u32,
/// }
///
/// impl rig_instruct::ResponseModel for Person {}
///
/// # async fn example() -> Result<(), rig_instruct::InstructError> {
/// let adapter = FnAdapter::from_prompt_fn(|_prompt: String| async move {
///     Ok::<_, String>(r#"{"name": "John", "age": 25}"#.to_string())
/// });
///
/// let person = Instructor::new(adapter)
///     .max_retries(2)
///     .include_usage(true)
///     .instruct::<Person>(Params::from_prompt("John is 25 years old."))
///     .await?;
///
/// println!("{:?} {:?}", person.value, person.metadata);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Instructor<A> {
    adapter: A,
    config: InstructConfig,
}

impl<A: Adapter> Instructor<A> {
    /// Creates an instructor with the default configuration.
    #[must_use]
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            config: InstructConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn with_config(mut self, config: InstructConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the retries allowed after the first attempt.
    #[must_use]
    pub fn max_retries(mut self, max: usize) -> Self {
        self.config.max_retries = Some(max);
        self
    }

    /// Sets whether usage metadata is returned.
    #[must_use]
    pub fn include_usage(mut self, include: bool) -> Self {
        self.config.include_usage = include;
        self
    }

    /// Sets the JSON mode.
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Sets the context handed to `ResponseModel::validate`.
    #[must_use]
    pub fn validation_context(mut self, context: Value) -> Self {
        self.config.validation_context = context;
        self
    }

    /// The wrapped adapter.
    #[must_use]
    pub const fn adapter(&self) -> &A {
        &self.adapter
    }

    /// The current configuration.
    #[must_use]
    pub const fn config(&self) -> &InstructConfig {
        &self.config
    }

    /// Runs [`instruct`] with this adapter and configuration.
    pub async fn instruct<T: ResponseModel>(
        &self,
        params: Params,
    ) -> Result<Instructed<T>, InstructError> {
        instruct(&self.adapter, params, &self.config).await
    }

    /// Runs [`instruct_with_schema`] with this adapter and configuration.
    pub async fn instruct_with_schema<T: ResponseModel>(
        &self,
        params: Params,
        schema: &ResponseSchema,
    ) -> Result<Instructed<T>, InstructError> {
        instruct_with_schema(&self.adapter, params, schema, &self.config).await
    }
}
