//! Translation between rig-instruct params and Rig completion types.

use rig::completion::message::{AssistantContent, Message};
use rig::completion::{CompletionError, Usage as RigUsage};
use rig::OneOrMany;
use rig_instruct::{AdapterError, Params, Role, Usage};
use serde_json::Value;

/// A chat request split the way Rig's request builder expects it.
#[derive(Debug, Clone)]
pub struct RigRequest {
    /// All system messages, joined by blank lines.
    pub preamble: Option<String>,
    /// Messages before the prompt, oldest first.
    pub history: Vec<Message>,
    /// The last non-system message.
    pub prompt: Message,
    /// Sampling temperature from the `temperature` param.
    pub temperature: Option<f64>,
    /// Output limit from the `max_tokens` param.
    pub max_tokens: Option<u64>,
}

/// Splits `params.messages` into preamble, history and prompt.
///
/// # Errors
///
/// Returns `AdapterError::InvalidRequest` when there is no user or assistant
/// message to send.
pub fn to_rig_request(params: &Params) -> Result<RigRequest, AdapterError> {
    let mut system = Vec::new();
    let mut chat = Vec::new();

    for message in params.messages() {
        match message.role {
            Role::System => system.push(message.content),
            Role::User => chat.push(Message::user(message.content)),
            Role::Assistant => chat.push(Message::assistant(message.content)),
        }
    }

    let prompt = chat
        .pop()
        .ok_or_else(|| AdapterError::invalid_request("params contain no user message"))?;

    Ok(RigRequest {
        preamble: (!system.is_empty()).then(|| system.join("\n\n")),
        history: chat,
        prompt,
        temperature: params.get("temperature").and_then(Value::as_f64),
        max_tokens: params.get("max_tokens").and_then(Value::as_u64),
    })
}

/// What the model answered, reduced to the parts the loop needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RigResponse {
    /// Concatenated text content.
    pub text: String,
    /// Arguments of the first call to the schema tool, if any.
    pub tool_arguments: Option<Value>,
    /// Token usage reported by the provider.
    pub usage: Usage,
}

impl RigResponse {
    /// Raw form echoed back to the model on retry.
    #[must_use]
    pub fn raw_text(&self) -> String {
        self.tool_arguments
            .as_ref()
            .map_or_else(|| self.text.clone(), ToString::to_string)
    }
}

/// Collects text and the schema tool call out of an assistant choice.
#[must_use]
pub fn from_rig_choice(
    choice: &OneOrMany<AssistantContent>,
    usage: &RigUsage,
    tool_name: &str,
) -> RigResponse {
    let mut texts = Vec::new();
    let mut tool_arguments = None;

    for content in choice.iter() {
        match content {
            AssistantContent::Text(t) => texts.push(t.text.clone()),
            AssistantContent::ToolCall(call) if call.function.name == tool_name => {
                if tool_arguments.is_none() {
                    tool_arguments = Some(call.function.arguments.clone());
                }
            }
            _ => {}
        }
    }

    RigResponse {
        text: texts.join("\n"),
        tool_arguments,
        usage: usage_record(usage),
    }
}

/// Rig's fixed usage struct as an open usage record.
#[must_use]
pub fn usage_record(usage: &RigUsage) -> Usage {
    Usage::new()
        .with("input_tokens", usage.input_tokens)
        .with("output_tokens", usage.output_tokens)
        .with("total_tokens", usage.total_tokens)
}

/// Maps a Rig completion failure onto the adapter error taxonomy.
#[must_use]
pub fn adapter_error(error: CompletionError) -> AdapterError {
    match error {
        CompletionError::ResponseError(reason) => AdapterError::response(reason),
        other => AdapterError::transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig::completion::message::UserContent;
    use rig_instruct::ChatMessage;

    fn user_text(message: &Message) -> Option<String> {
        match message {
            Message::User { content } => content.iter().find_map(|c| match c {
                UserContent::Text(t) => Some(t.text.clone()),
                _ => None,
            }),
            Message::Assistant { .. } => None,
        }
    }

    #[test]
    fn test_request_splits_system_history_and_prompt() {
        let params = Params::new()
            .message(ChatMessage::system("schema rules"))
            .message(ChatMessage::user("John is 25."))
            .message(ChatMessage::assistant("{\"name\": \"J\"}"))
            .message(ChatMessage::user("fix the name"))
            .with("temperature", 0.2)
            .with("max_tokens", 512);

        let request = to_rig_request(&params).unwrap();

        assert_eq!(request.preamble.as_deref(), Some("schema rules"));
        assert_eq!(request.history.len(), 2);
        assert_eq!(user_text(&request.history[0]).as_deref(), Some("John is 25."));
        assert_eq!(user_text(&request.prompt).as_deref(), Some("fix the name"));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(512));
    }

    #[test]
    fn test_request_without_chat_messages_is_invalid() {
        let params = Params::new().message(ChatMessage::system("only rules"));
        assert!(matches!(
            to_rig_request(&params),
            Err(AdapterError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_choice_text_and_usage() {
        let mut usage = RigUsage::default();
        usage.input_tokens = 100;
        usage.output_tokens = 50;
        usage.total_tokens = 150;

        let response = from_rig_choice(
            &OneOrMany::one(AssistantContent::text("{\"name\": \"John\"}")),
            &usage,
            "Person",
        );

        assert_eq!(response.text, "{\"name\": \"John\"}");
        assert_eq!(response.tool_arguments, None);
        assert_eq!(response.raw_text(), "{\"name\": \"John\"}");
        assert_eq!(
            response.usage,
            Usage::from_iter([("input_tokens", 100), ("output_tokens", 50), ("total_tokens", 150)])
        );
    }

    #[test]
    fn test_response_error_maps_to_response() {
        let err = adapter_error(CompletionError::ResponseError("no choices".into()));
        assert_eq!(err.to_string(), "response error: no choices");
    }
}
