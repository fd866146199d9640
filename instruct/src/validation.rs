//! Schema derivation, JSON Schema validation and typed decoding of responses.

use std::fmt;

use jsonschema::Validator;
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::InstructError;

/// A single failed check, located by JSON Pointer into the decoded value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// JSON Pointer to the offending value (`""` for the whole document).
    pub path: String,
    /// Human-readable description of the failure.
    pub message: String,
}

impl FieldError {
    /// Creates an error for `path`. Bare field names are turned into pointers
    /// (`"name"` becomes `"/name"`).
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.is_empty() || path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            path,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Every failure found while validating one response.
///
/// Displays as one `path: message` line per error, which is also the form
/// fed back to the model on retry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// Creates an empty error set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Error set holding a single failure.
    #[must_use]
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![FieldError::new(path, message)])
    }

    /// Records a failure.
    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(path, message));
    }

    /// Builder-style variant of [`ValidationErrors::add`].
    #[must_use]
    pub fn with(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.add(path, message);
        self
    }

    /// Returns `true` when no failure was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the failures in the order they were found.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Appends all failures of `other`.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A type the model is asked to produce.
///
/// The JSON Schema comes from [`JsonSchema`]; values are decoded with serde
/// after passing the schema. Override [`ResponseModel::validate`] for rules a
/// schema cannot express. `context` is the caller's validation context.
///
/// ```
/// use rig_instruct::validation::{ResponseModel, ValidationErrors};
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct Person {
///     name: String,
///     age: u32,
/// }
///
/// impl ResponseModel for Person {
///     fn validate(&self, _context: &serde_json::Value) -> Result<(), ValidationErrors> {
///         if self.name.chars().count() < 2 {
///             return Err(ValidationErrors::single("name", "should be at least 2 characters"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait ResponseModel: DeserializeOwned + JsonSchema + Send {
    /// Business-rule validation run after schema validation and decoding.
    fn validate(&self, _context: &Value) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

impl ResponseModel for Value {}

/// The JSON Schema describing the expected response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    /// Name used for tool definitions and prompts.
    pub name: String,
    /// Optional description, taken from the schema's `description`.
    pub description: Option<String>,
    /// The JSON Schema document.
    pub schema: Value,
}

impl ResponseSchema {
    /// Derives the schema of `T`.
    #[must_use]
    pub fn of<T: JsonSchema>() -> Self {
        Self::from_value(T::schema_name().into_owned(), json!(schema_for!(T)))
    }

    /// Wraps an explicit JSON Schema document.
    #[must_use]
    pub fn from_value(name: impl Into<String>, schema: Value) -> Self {
        let description = schema
            .get("description")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        Self {
            name: name.into(),
            description,
            schema,
        }
    }

    /// Pretty-printed schema for embedding in prompts.
    #[must_use]
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(&self.schema).unwrap_or_else(|_| self.schema.to_string())
    }
}

/// A compiled [`ResponseSchema`].
pub struct SchemaValidator {
    validator: Validator,
}

impl SchemaValidator {
    /// Compiles `schema`.
    ///
    /// # Errors
    ///
    /// Returns `InstructError::Schema` if the document is not a valid JSON
    /// Schema.
    pub fn new(schema: &ResponseSchema) -> Result<Self, InstructError> {
        let validator = Validator::new(&schema.schema)
            .map_err(|e| InstructError::Schema(format!("{}: {e}", schema.name)))?;
        Ok(Self { validator })
    }

    /// Collects every schema violation in `instance`, not just the first.
    pub fn check(&self, instance: &Value) -> Result<(), ValidationErrors> {
        self.validator
            .iter_errors(instance)
            .fold(ValidationErrors::new(), |errors, error| {
                errors.with(error.instance_path.to_string(), error.to_string())
            })
            .into_result()
    }

    /// Schema check, then serde decoding, then [`ResponseModel::validate`].
    pub fn decode<T: ResponseModel>(
        &self,
        instance: &Value,
        context: &Value,
    ) -> Result<T, ValidationErrors> {
        self.check(instance)?;
        let value = T::deserialize(instance)
            .map_err(|e| ValidationErrors::single("", format!("could not be decoded: {e}")))?;
        value.validate(context)?;
        Ok(value)
    }
}
