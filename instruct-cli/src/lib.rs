//! Command-line front end for rig-instruct.
//!
//! Loads a JSON Schema from disk, asks an OpenAI model for a matching
//! document, and prints the validated JSON (with usage metadata on request).

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use rig_instruct::{
    ChatMessage, InstructConfig, InstructError, Instructed, Mode, Params, ResponseSchema,
};
use serde_json::{json, Value};
use thiserror::Error;

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// The schema file could not be read.
    #[error("Failed to read schema {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The schema file is not JSON.
    #[error("Schema {path} is not valid JSON: {source}")]
    Json {
        /// File that failed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The result could not be rendered.
    #[error("Failed to render output: {0}")]
    Output(#[source] serde_json::Error),

    /// Missing credentials or inconsistent flags.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The instruct call failed.
    #[error(transparent)]
    Instruct(#[from] InstructError),
}

/// Answer mode accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliMode {
    /// Bare JSON answer.
    Json,
    /// JSON in a fenced Markdown block.
    MdJson,
    /// Tool call whose arguments follow the schema.
    Tools,
}

impl From<CliMode> for Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Json => Self::Json,
            CliMode::MdJson => Self::MdJson,
            CliMode::Tools => Self::Tools,
        }
    }
}

/// Extract structured JSON from a prompt, retrying until it matches a schema.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON Schema the answer must satisfy
    #[arg(long)]
    pub schema: PathBuf,

    /// Schema name used in prompts and tool definitions
    #[arg(long)]
    pub name: Option<String>,

    /// The user prompt
    #[arg(long)]
    pub prompt: String,

    /// Extra system instructions
    #[arg(long)]
    pub system: Option<String>,

    /// OpenAI model name
    #[arg(long, default_value = "gpt-4o")]
    pub model: String,

    /// Retries after the first attempt (defaults to the adapter's setting)
    #[arg(long)]
    pub max_retries: Option<usize>,

    /// How the model is asked to answer
    #[arg(long, value_enum, default_value_t = CliMode::Json)]
    pub mode: CliMode,

    /// Print token usage for every attempt
    #[arg(long)]
    pub usage: bool,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f64>,
}

impl Cli {
    /// The loop configuration selected by the flags.
    #[must_use]
    pub fn config(&self) -> InstructConfig {
        let config = InstructConfig::default()
            .with_usage(self.usage)
            .with_mode(self.mode.into());
        match self.max_retries {
            Some(max) => config.with_max_retries(max),
            None => config,
        }
    }

    /// Request parameters built from the flags.
    #[must_use]
    pub fn params(&self) -> Params {
        let mut params = Params::new().model(self.model.clone());
        if let Some(system) = &self.system {
            params.push_message(ChatMessage::system(system.clone()));
        }
        params.push_message(ChatMessage::user(self.prompt.clone()));
        if let Some(temperature) = self.temperature {
            params.insert("temperature", temperature);
        }
        params
    }
}

/// Reads a schema file, naming it after `name`, its `title`, or the file stem.
pub fn load_schema(path: &Path, name: Option<&str>) -> Result<ResponseSchema, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let schema: Value = serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let name = name
        .map(ToString::to_string)
        .or_else(|| schema.get("title").and_then(Value::as_str).map(ToString::to_string))
        .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(ToString::to_string))
        .unwrap_or_else(|| "Response".to_string());

    Ok(ResponseSchema::from_value(name, schema))
}

/// The JSON printed on success.
#[must_use]
pub fn render_output(result: Instructed<Value>) -> Value {
    match result.metadata {
        Some(metadata) => json!({
            "value": result.value,
            "metadata": metadata,
        }),
        None => result.value,
    }
}
