//! Configuration for an instruct call.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How the model is asked to return JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Answer through a tool call whose arguments follow the schema.
    Tools,
    /// Answer with a bare JSON document.
    #[default]
    Json,
    /// Answer with JSON inside a fenced Markdown code block.
    MdJson,
}

/// Configuration for the retry loop.
#[derive(Debug, Clone)]
pub struct InstructConfig {
    /// Retries allowed after the first attempt (`None` = adapter default).
    pub max_retries: Option<usize>,
    /// Whether to return usage metadata (default: false).
    pub include_usage: bool,
    /// How the model is asked to emit JSON (default: [`Mode::Json`]).
    pub mode: Mode,
    /// Passed to `ResponseModel::validate` (default: empty object).
    pub validation_context: Value,
}

impl Default for InstructConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            include_usage: false,
            mode: Mode::default(),
            validation_context: Value::Object(Map::new()),
        }
    }
}

impl InstructConfig {
    /// Set the number of retries allowed after the first attempt.
    #[must_use]
    pub const fn with_max_retries(mut self, max: usize) -> Self {
        self.max_retries = Some(max);
        self
    }

    /// Set whether usage metadata is returned.
    #[must_use]
    pub const fn with_usage(mut self, include: bool) -> Self {
        self.include_usage = include;
        self
    }

    /// Set the JSON mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the validation context.
    #[must_use]
    pub fn with_validation_context(mut self, context: Value) -> Self {
        self.validation_context = context;
        self
    }
}
