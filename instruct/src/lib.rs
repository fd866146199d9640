//! Structured output from language models.
//!
//! `rig-instruct` asks a model for JSON matching a schema, validates and
//! decodes the answer into a Rust type, and when validation fails sends the
//! errors back to the model and tries again, up to `max_retries` times. Token
//! usage can be collected for every attempt.
//!
//! - [`Adapter`] - the provider contract (prompting, sending, parsing, usage)
//! - [`instruct`] / [`Instructor`] - the retry loop
//! - [`ResponseModel`] - schema-derived response types with business rules
//! - [`Metadata`] - per-attempt usage and its key-wise total
//! - [`FnAdapter`] - an adapter over any async text-completion function
//!
//! ## Example
//!
//! ```no_run
//! use rig_instruct::prelude::*;
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize, JsonSchema)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! impl ResponseModel for Person {}
//!
//! # async fn example(adapter: FnAdapter) -> Result<(), InstructError> {
//! let config = InstructConfig::default().with_max_retries(1).with_usage(true);
//! let params = Params::from_prompt("John is 25.");
//! let result = instruct::<Person, _>(&adapter, params, &config).await?;
//! let (person, metadata) = result.into_parts();
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod feedback;
pub mod json;
pub mod orchestrator;
pub mod params;
pub mod prompt;
pub mod text;
pub mod usage;
pub mod validation;

pub use adapter::{Adapter, PromptContext};
pub use config::{InstructConfig, Mode};
pub use error::{AdapterError, AttemptRecord, InstructError, ParseError};
pub use orchestrator::{instruct, instruct_with_schema, Instructed, Instructor};
pub use params::{ChatMessage, Params, Role};
pub use text::{FnAdapter, TextResponse};
pub use usage::{Metadata, Usage};
pub use validation::{
    FieldError, ResponseModel, ResponseSchema, SchemaValidator, ValidationErrors,
};

/// Commonly used types and traits.
pub mod prelude {
    pub use crate::{
        instruct, instruct_with_schema, Adapter, AdapterError, ChatMessage, FnAdapter,
        InstructConfig, InstructError, Instructed, Instructor, Metadata, Mode, Params,
        ParseError, PromptContext, ResponseModel, ResponseSchema, Usage, ValidationErrors,
    };
}
