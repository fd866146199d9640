//! Request parameters threaded through the retry loop.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const MESSAGES_KEY: &str = "messages";
const MODEL_KEY: &str = "model";

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model.
    System,
    /// Caller input.
    User,
    /// Model output.
    Assistant,
}

/// A single chat message as stored under the `messages` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: Role,
    /// Plain-text content.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Provider-specific request parameters.
///
/// An open JSON object owned by the orchestrator and rewritten by adapter
/// hooks between attempts. Adapters are free to store anything here; the
/// helpers below only cover the `messages` and `model` keys that most chat
/// providers share.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    /// Creates empty parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters holding a single user message.
    #[must_use]
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self::new().message(ChatMessage::user(prompt))
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style variant of [`Params::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Sets the `model` key.
    #[must_use]
    pub fn model(self, model: impl Into<String>) -> Self {
        self.with(MODEL_KEY, model.into())
    }

    /// Returns the `model` key if it holds a string.
    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.get(MODEL_KEY).and_then(Value::as_str)
    }

    /// Appends a message, builder style.
    #[must_use]
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.push_message(message);
        self
    }

    /// Appends a message to the `messages` list, creating it if needed.
    ///
    /// A non-array `messages` value is replaced.
    pub fn push_message(&mut self, message: ChatMessage) {
        let encoded = serde_json::to_value(message).unwrap_or(Value::Null);
        match self.0.get_mut(MESSAGES_KEY) {
            Some(Value::Array(messages)) => messages.push(encoded),
            _ => {
                self.0
                    .insert(MESSAGES_KEY.to_string(), Value::Array(vec![encoded]));
            }
        }
    }

    /// Inserts a message at the front of the `messages` list.
    pub fn prepend_message(&mut self, message: ChatMessage) {
        let mut messages = self.messages();
        messages.insert(0, message);
        self.set_messages(messages);
    }

    /// Replaces the `messages` list.
    pub fn set_messages(&mut self, messages: Vec<ChatMessage>) {
        let encoded = serde_json::to_value(messages).unwrap_or_else(|_| Value::Array(Vec::new()));
        self.0.insert(MESSAGES_KEY.to_string(), encoded);
    }

    /// Decodes the `messages` list.
    ///
    /// Entries that are not `{role, content}` objects are skipped.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.get(MESSAGES_KEY)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Borrows the underlying JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the parameters, returning the JSON object.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Params> for Value {
    fn from(params: Params) -> Self {
        Self::Object(params.0)
    }
}
