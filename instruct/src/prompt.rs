//! Prompt conventions shared by chat-style adapters.
//!
//! The first request gets a system message describing the schema; every retry
//! echoes the rejected answer as an assistant message and follows it with a
//! user message listing what was wrong.

use std::fmt::Write;

use serde_json::Value;

use crate::adapter::PromptContext;
use crate::config::Mode;
use crate::feedback::{build_parse_error_feedback, build_validation_feedback};
use crate::params::{ChatMessage, Params, Role};
use crate::validation::{ResponseSchema, ValidationErrors};

/// System instructions asking for JSON that satisfies `schema`.
#[must_use]
pub fn schema_instructions(schema: &ResponseSchema, mode: Mode) -> String {
    let mut text = String::from(
        "Extract the requested information and answer with JSON that matches this JSON Schema:\n\n",
    );
    text.push_str(&schema.to_pretty_string());
    text.push_str("\n\n");
    text.push_str(match mode {
        Mode::Json => "Respond with the JSON document only, without any surrounding text.",
        Mode::MdJson => "Respond with the JSON document inside a ```json fenced code block.",
        Mode::Tools => "Respond by calling the provided tool with arguments that match the schema.",
    });
    if let Some(description) = &schema.description {
        text.push_str("\n\nThe object describes: ");
        text.push_str(description);
    }
    text
}

/// Prepends the schema instructions as a system message.
#[must_use]
pub fn with_schema_instructions(mut params: Params, ctx: &PromptContext<'_>) -> Params {
    params.prepend_message(ChatMessage::system(schema_instructions(ctx.schema, ctx.mode)));
    params
}

/// Appends the echoed answer and the corrective feedback for the next attempt.
///
/// A missing `response_params` means the answer could not be parsed, which
/// selects the parse-error wording.
#[must_use]
pub fn with_retry_feedback(
    mut params: Params,
    response_params: Option<&Value>,
    errors: &ValidationErrors,
    raw_text: &str,
    ctx: &PromptContext<'_>,
) -> Params {
    let attempt = ctx.attempt + 1;
    let feedback = match response_params {
        Some(submission) => {
            build_validation_feedback(errors, submission, None, attempt, ctx.max_attempts())
        }
        None => build_parse_error_feedback(
            raw_text,
            &errors.to_string(),
            Some(ctx.schema),
            attempt,
            ctx.max_attempts(),
        ),
    };

    if !raw_text.is_empty() {
        params.push_message(ChatMessage::assistant(raw_text));
    }
    params.push_message(ChatMessage::user(feedback));
    params
}

/// Flattens the `messages` list into a single prompt for text-only backends.
#[must_use]
pub fn render_transcript(params: &Params) -> String {
    let mut transcript = String::new();

    for message in params.messages() {
        let speaker = match message.role {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        let _ = write!(transcript, "{speaker}: {}\n\n", message.content);
    }

    transcript.truncate(transcript.trim_end().len());
    transcript
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ResponseSchema {
        ResponseSchema::from_value(
            "Person",
            json!({"type": "object", "description": "A person", "required": ["name"]}),
        )
    }

    #[test]
    fn test_schema_instructions_follow_mode() {
        let text = schema_instructions(&schema(), Mode::MdJson);
        assert!(text.contains("```json"));
        assert!(text.contains("\"required\""));
        assert!(text.ends_with("The object describes: A person"));
    }

    #[test]
    fn test_with_schema_instructions_prepends_system_message() {
        let schema = schema();
        let ctx = PromptContext { schema: &schema, mode: Mode::Json, attempt: 0, max_retries: 1 };
        let params = with_schema_instructions(Params::from_prompt("Extract John, 25"), &ctx);

        let messages = params.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], ChatMessage::user("Extract John, 25"));
    }

    #[test]
    fn test_retry_feedback_echoes_answer_then_errors() {
        let schema = schema();
        let ctx = PromptContext { schema: &schema, mode: Mode::Json, attempt: 0, max_retries: 2 };
        let errors = ValidationErrors::single("name", "should be at least 2 characters");
        let params = with_retry_feedback(
            Params::from_prompt("Extract"),
            Some(&json!({"name": "J"})),
            &errors,
            "{\"name\": \"J\"}",
            &ctx,
        );

        let messages = params.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], ChatMessage::assistant("{\"name\": \"J\"}"));
        assert!(messages[2].content.contains("Attempt 1/3"));
        assert!(messages[2].content.contains("/name: should be at least 2 characters"));
    }

    #[test]
    fn test_retry_feedback_after_parse_failure() {
        let schema = schema();
        let ctx = PromptContext { schema: &schema, mode: Mode::Json, attempt: 1, max_retries: 2 };
        let errors = ValidationErrors::single("", "invalid JSON: expected value");
        let params = with_retry_feedback(Params::new(), None, &errors, "nope", &ctx);

        let feedback = &params.messages()[1].content;
        assert!(feedback.contains("Attempt 2/3: Could not parse"));
        assert!(feedback.contains("Expected schema:"));
    }

    #[test]
    fn test_parsed_null_gets_validation_feedback() {
        let schema = schema();
        let ctx = PromptContext { schema: &schema, mode: Mode::Json, attempt: 0, max_retries: 1 };
        let errors = ValidationErrors::single("", "null is not of type \"object\"");
        let params = with_retry_feedback(Params::new(), Some(&Value::Null), &errors, "null", &ctx);

        let feedback = &params.messages()[1].content;
        assert!(feedback.starts_with("Attempt 1/2: the response did not pass validation."));
        assert!(!feedback.contains("Could not parse"));
    }

    #[test]
    fn test_attempt_count_saturates_for_unbounded_retries() {
        let schema = schema();
        let ctx = PromptContext {
            schema: &schema,
            mode: Mode::Json,
            attempt: 0,
            max_retries: usize::MAX,
        };
        assert_eq!(ctx.max_attempts(), usize::MAX);
        assert!(ctx.has_retries_left());

        let errors = ValidationErrors::single("", "invalid JSON: expected value");
        let params = with_retry_feedback(Params::new(), None, &errors, "nope", &ctx);
        assert!(params.messages()[1].content.starts_with(&format!("Attempt 1/{}:", usize::MAX)));
    }

    #[test]
    fn test_render_transcript_labels_speakers() {
        let params = Params::new()
            .message(ChatMessage::system("Answer in JSON."))
            .message(ChatMessage::user("John is 25."));

        assert_eq!(
            render_transcript(&params),
            "System: Answer in JSON.\n\nUser: John is 25."
        );
    }
}
