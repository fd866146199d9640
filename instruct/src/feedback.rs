//! Corrective messages sent back to the model after a rejected attempt.

use serde_json::Value;

use crate::validation::{ResponseSchema, ValidationErrors};

/// Longest slice of raw output echoed in parse-error feedback, in chars.
const RAW_ECHO_LIMIT: usize = 500;

/// Build validation feedback listing every error.
///
/// Includes the attempt counter, one line per error, the expected schema when
/// given, the echoed submission, and an instruction to fix and resubmit.
///
/// # Examples
///
/// ```
/// use rig_instruct::feedback::build_validation_feedback;
/// use rig_instruct::validation::ValidationErrors;
/// use serde_json::json;
///
/// let errors = ValidationErrors::single("name", "should be at least 2 characters");
/// let feedback = build_validation_feedback(&errors, &json!({"name": "J"}), None, 1, 3);
/// assert!(feedback.contains("Attempt 1/3"));
/// assert!(feedback.contains("/name: should be at least 2 characters"));
/// ```
#[must_use]
pub fn build_validation_feedback(
    errors: &ValidationErrors,
    submission: &Value,
    schema: Option<&ResponseSchema>,
    attempt: usize,
    max_attempts: usize,
) -> String {
    let mut feedback = format!(
        "Attempt {attempt}/{max_attempts}: the response did not pass validation.\n\n"
    );

    feedback.push_str("Errors:\n");
    for error in errors {
        feedback.push_str("  - ");
        feedback.push_str(&error.to_string());
        feedback.push('\n');
    }

    if let Some(schema) = schema {
        feedback.push_str("\nExpected schema:\n");
        feedback.push_str(&schema.to_pretty_string());
        feedback.push('\n');
    }

    feedback.push_str("\nYour submission:\n");
    let submission_str =
        serde_json::to_string_pretty(submission).unwrap_or_else(|_| submission.to_string());
    feedback.push_str(&submission_str);

    feedback.push_str("\n\nPlease fix all errors and respond again.");

    feedback
}

/// Build feedback for a response whose JSON could not be located or parsed.
///
/// The raw text is truncated to its first 500 chars.
///
/// # Examples
///
/// ```
/// use rig_instruct::feedback::build_parse_error_feedback;
///
/// let feedback = build_parse_error_feedback("Sure! Here you go", "expected value", None, 2, 3);
/// assert!(feedback.contains("Attempt 2/3"));
/// assert!(feedback.contains("Could not parse"));
/// ```
#[must_use]
pub fn build_parse_error_feedback(
    raw_text: &str,
    parse_error: &str,
    schema: Option<&ResponseSchema>,
    attempt: usize,
    max_attempts: usize,
) -> String {
    let mut feedback = format!(
        "Attempt {attempt}/{max_attempts}: Could not parse your response as JSON.\n\n"
    );

    feedback.push_str("Parse error: ");
    feedback.push_str(parse_error);
    feedback.push_str("\n\n");

    feedback.push_str("Your response (first 500 chars):\n");
    feedback.push_str(&truncate_chars(raw_text, RAW_ECHO_LIMIT));

    if let Some(schema) = schema {
        feedback.push_str("\n\nExpected schema:\n");
        feedback.push_str(&schema.to_pretty_string());
    }

    feedback.push_str("\n\nPlease respond with valid JSON matching the schema.");

    feedback
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_validation_feedback() {
        let schema = ResponseSchema::from_value("Person", json!({"type": "object"}));
        let errors = ValidationErrors::single("age", "-5 is less than the minimum of 0")
            .with("", "\"name\" is a required property");

        let feedback = build_validation_feedback(&errors, &json!({"age": -5}), Some(&schema), 1, 3);

        assert!(feedback.contains("Attempt 1/3"));
        assert!(feedback.contains("  - /age: -5 is less than the minimum of 0"));
        assert!(feedback.contains("  - (root): \"name\" is a required property"));
        assert!(feedback.contains("Expected schema:"));
        assert!(feedback.contains("Your submission:"));
        assert!(feedback.contains("Please fix all errors"));
    }

    #[test]
    fn test_build_validation_feedback_without_schema() {
        let errors = ValidationErrors::single("name", "too short");
        let feedback = build_validation_feedback(&errors, &json!({}), None, 2, 2);
        assert!(!feedback.contains("Expected schema:"));
    }

    #[test]
    fn test_build_parse_error_feedback_truncates_long_text() {
        let raw_text = "x".repeat(1000);
        let feedback = build_parse_error_feedback(&raw_text, "error", None, 1, 3);

        assert!(feedback.contains("..."));
        let response_section = feedback.split("Your response").nth(1).unwrap();
        let text_part = response_section.split("Please respond").next().unwrap();
        assert!(text_part.len() < 600);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "世".repeat(600);
        let truncated = truncate_chars(&text, RAW_ECHO_LIMIT);
        assert_eq!(truncated.chars().count(), RAW_ECHO_LIMIT + 3);
    }
}
