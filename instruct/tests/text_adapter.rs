//! End-to-end runs of the text adapter against canned model answers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rig_instruct::prelude::*;
use rig_instruct::usage::estimate_tokens;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize, JsonSchema, PartialEq)]
struct Person {
    name: String,
    age: u32,
}

impl ResponseModel for Person {
    fn validate(&self, context: &Value) -> Result<(), ValidationErrors> {
        let max_age = context.get("max_age").and_then(Value::as_u64).unwrap_or(150);
        if u64::from(self.age) > max_age {
            return Err(ValidationErrors::single("age", format!("must be at most {max_age}")));
        }
        Ok(())
    }
}

/// Answers with `answers[i]` on the i-th call and records every prompt.
fn canned(answers: &'static [&'static str]) -> (FnAdapter, Arc<Mutex<Vec<String>>>) {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&prompts);
    let adapter = FnAdapter::from_prompt_fn(move |prompt: String| {
        seen.lock().unwrap().push(prompt);
        let index = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            answers
                .get(index)
                .map(|answer| (*answer).to_string())
                .ok_or_else(|| "no more answers".to_string())
        }
    });
    (adapter, prompts)
}

#[tokio::test]
async fn test_md_json_answer_is_extracted() {
    let (adapter, prompts) =
        canned(&["Sure!\n```json\n{\"name\": \"John\", \"age\": 25}\n```"]);

    let result = Instructor::new(adapter)
        .mode(Mode::MdJson)
        .instruct::<Person>(Params::from_prompt("John is 25."))
        .await
        .unwrap();

    assert_eq!(result.value, Person { name: "John".into(), age: 25 });
    let prompts = prompts.lock().unwrap();
    assert!(prompts[0].starts_with("System: Extract the requested information"));
    assert!(prompts[0].contains("```json fenced code block"));
    assert!(prompts[0].ends_with("User: John is 25."));
}

#[tokio::test]
async fn test_retry_prompt_carries_answer_and_errors() {
    let (adapter, prompts) = canned(&[
        r#"{"name": "John", "age": 250}"#,
        r#"{"name": "John", "age": 25}"#,
    ]);

    let result = Instructor::new(adapter)
        .max_retries(1)
        .validation_context(json!({"max_age": 120}))
        .instruct::<Person>(Params::from_prompt("John is 25."))
        .await
        .unwrap();

    assert_eq!(result.attempts, 2);
    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("Assistant: {\"name\": \"John\", \"age\": 250}"));
    assert!(prompts[1].contains("Attempt 1/2: the response did not pass validation."));
    assert!(prompts[1].contains("/age: must be at most 120"));
}

#[tokio::test]
async fn test_estimated_usage_is_aggregated() {
    let (adapter, prompts) = canned(&["not json", r#"{"name": "Ann", "age": 30}"#]);

    let result = Instructor::new(adapter.estimate_usage(true))
        .max_retries(2)
        .include_usage(true)
        .instruct::<Person>(Params::from_prompt("Ann is 30."))
        .await
        .unwrap();

    let prompts = prompts.lock().unwrap();
    let metadata = result.metadata.unwrap();
    assert_eq!(metadata.attempt_count(), 2);
    assert_eq!(
        metadata.attempts[0].get("input_tokens"),
        Some(estimate_tokens(&prompts[0]))
    );
    assert_eq!(
        metadata.attempts[0].get("output_tokens"),
        Some(estimate_tokens("not json"))
    );
    assert_eq!(
        metadata.total.get("input_tokens"),
        Some(estimate_tokens(&prompts[0]) + estimate_tokens(&prompts[1]))
    );
    assert!(prompts[1].contains("Could not parse your response as JSON"));
}

#[tokio::test]
async fn test_null_answer_gets_validation_feedback() {
    let (adapter, prompts) = canned(&["null", r#"{"name": "John", "age": 25}"#]);

    let result = Instructor::new(adapter)
        .max_retries(1)
        .instruct::<Person>(Params::from_prompt("John is 25."))
        .await
        .unwrap();

    assert_eq!(result.attempts, 2);
    let prompts = prompts.lock().unwrap();
    assert!(prompts[1].contains("Assistant: null"));
    assert!(prompts[1].contains("Attempt 1/2: the response did not pass validation."));
    assert!(!prompts[1].contains("Could not parse"));
}

#[tokio::test]
async fn test_unbounded_retries_do_not_overflow() {
    let (adapter, prompts) = canned(&["not json", r#"{"name": "Ann", "age": 30}"#]);

    let result = Instructor::new(adapter)
        .max_retries(usize::MAX)
        .instruct::<Person>(Params::from_prompt("Ann is 30."))
        .await
        .unwrap();

    assert_eq!(result.value, Person { name: "Ann".into(), age: 30 });
    let prompts = prompts.lock().unwrap();
    assert!(prompts[1].contains(&format!("Attempt 1/{}: Could not parse", usize::MAX)));
}

#[tokio::test]
async fn test_function_error_is_a_transport_failure() {
    let (adapter, _) = canned(&[]);

    let err = Instructor::new(adapter.with_default_max_retries(3))
        .instruct::<Person>(Params::from_prompt("Who?"))
        .await
        .unwrap_err();

    match err {
        InstructError::Transport { source, attempt, metadata } => {
            assert_eq!(attempt, 1);
            assert!(metadata.is_none());
            assert_eq!(source.to_string(), "transport error: no more answers");
        }
        other => panic!("unexpected error: {other}"),
    }
}
