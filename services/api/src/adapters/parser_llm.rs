//! services/api/src/adapters/parser_llm.rs
//!
//! This module contains the adapter for the workout-parsing LLM.
//! It implements the `WorkoutParser` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use fitlog_core::{
    parsed::ParsedWorkout,
    ports::{PortError, PortResult, WorkoutParser},
};
use tracing::debug;

const SYSTEM_PROMPT: &str =
    "You turn workout logs and fitness goals written in plain language into strict JSON. \
     Reply with the JSON object only.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `WorkoutParser` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiWorkoutParser {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiWorkoutParser {
    /// Creates a new `OpenAiWorkoutParser`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// The instructions sent with every log. `today` anchors relative dates.
fn build_prompt(text: &str, today: NaiveDate) -> String {
    format!(
        r#"Today is {today}. Resolve relative dates ("yesterday", "this week", "by Friday") against it.

Return one JSON object with these keys:
- "date": YYYY-MM-DD, only when the text names the day of the workout.
- "entries": workouts already performed. Each has "type" ("strength" or "cardio"),
  "exercise" (a canonical lower-case name such as "bench press", "push-ups", "running")
  and optional "notes".
  Strength entries carry "sets_details": [{{"set_number", "reps", "weight"}}], weight in lbs
  and only when stated. Cardio entries carry "duration" (minutes), "distance" (miles) and
  "pace" (minutes per mile) when known.
- "notes": a free-text remark about the whole session, or "".
- "goals": intentions such as "I want to", "my goal is", "I plan to". Each has "name",
  optional "description", "start_date" (default today), optional "end_date",
  "goal_type" ("single_session" unless the text clearly asks for a total over time or a
  number of workouts, then "aggregate"), "exercise_type" ("strength", "cardio" or "general"),
  optional "exercise_name" and "targets": [{{"target_metric", "target_value"}}] where the
  metric is one of reps, sets, distance, duration, weight, sessions, pace.
  "Run X miles in Y minutes" becomes a distance target plus a pace target of Y / X.

Convert kilometres to miles and kilograms to pounds. Leave out keys you have no value for.

Text:
{text}"#
    )
}

/// Models sometimes wrap the object in a Markdown fence.
fn strip_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Deserializes the model's reply. A reply that is not the expected JSON is
/// the caller's input problem, not a server fault.
pub fn decode_reply(content: &str) -> PortResult<ParsedWorkout> {
    serde_json::from_str(strip_fence(content))
        .map_err(|e| PortError::Invalid(format!("could not understand the workout description: {}", e)))
}

//=========================================================================================
// `WorkoutParser` Trait Implementation
//=========================================================================================

#[async_trait]
impl WorkoutParser for OpenAiWorkoutParser {
    async fn parse_workout(&self, text: &str, today: NaiveDate) -> PortResult<ParsedWorkout> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(build_prompt(text, today))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.3)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Workout parser LLM returned no text content.".to_string())
            })?;
        debug!("Workout parser replied with {} bytes", content.len());

        decode_reply(&content)
    }
}
