//! services/api/src/adapters/generator_llm.rs
//!
//! This module contains the adapter for the study-material generating LLM.
//! It implements the `ArtifactGenerator` port from the `core` crate by asking the
//! model for a single JSON document holding the summary, flashcards and quiz.

use std::time::Duration;

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
use serde::Deserialize;
use study_assistant_core::{
    domain::{ArtifactBundle, FlashcardDraft, QuizQuestionDraft, ResourceType},
    ports::{ArtifactGenerator, GenerationFailure},
};
use tracing::{info, warn};

/// Inputs longer than this are cut before being sent to the model.
const MAX_INPUT_CHARS: usize = 60_000;

const SYSTEM_PROMPT: &str = "You are a study assistant. Turn the material you are given into \
study aids. Respond with a single JSON object and nothing else, shaped exactly like this:\n\
{\"summary\": \"<markdown summary with headings and bullet points>\",\n \
\"flashcards\": [{\"front\": \"<question or term>\", \"back\": \"<answer or definition>\"}],\n \
\"quiz\": [{\"question\": \"<question>\", \"options\": [\"<option>\", \"<option>\", \"<option>\", \"<option>\"], \
\"correctAnswer\": <zero-based index of the correct option>, \"explanation\": \"<why it is correct>\"}]}\n\
Write between 5 and 10 flashcards and between 3 and 5 quiz questions. Every quiz question \
needs at least two distinct options.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ArtifactGenerator` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGeneratorAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiGeneratorAdapter {
    /// Creates a new `OpenAiGeneratorAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, timeout: Duration) -> Self {
        Self {
            client,
            model,
            timeout,
        }
    }

    async fn complete(&self, user_prompt: String) -> Result<String, GenerationFailure> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| GenerationFailure::new(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| GenerationFailure::new(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| GenerationFailure::new(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                GenerationFailure::new(format!(
                    "Generation timed out after {:?}",
                    self.timeout
                ))
            })?
            .map_err(|e: OpenAIError| GenerationFailure::new(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationFailure::new("Generation LLM returned no text content."))
    }
}

fn source_label(resource_type: ResourceType) -> &'static str {
    match resource_type {
        ResourceType::Youtube => "the transcript of a YouTube video",
        ResourceType::Pdf => "text extracted from a PDF document",
        ResourceType::Text => "a set of notes",
        ResourceType::Audio => "the transcript of an audio recording",
    }
}

fn truncate_input(raw_input: &str) -> &str {
    match raw_input.char_indices().nth(MAX_INPUT_CHARS) {
        Some((cut, _)) => &raw_input[..cut],
        None => raw_input,
    }
}

//=========================================================================================
// Response Parsing
//=========================================================================================

#[derive(Deserialize)]
struct RawFlashcard {
    #[serde(default)]
    front: String,
    #[serde(default)]
    back: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuizQuestion {
    #[serde(default)]
    question: String,
    #[serde(default)]
    options: Vec<String>,
    correct_answer: usize,
    #[serde(default)]
    explanation: String,
}

/// Just the summary of a reply whose flashcards or quiz did not parse.
#[derive(Deserialize)]
struct RawSummary {
    #[serde(default)]
    summary: String,
}

#[derive(Deserialize)]
struct RawBundle {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    flashcards: Vec<RawFlashcard>,
    #[serde(default)]
    quiz: Vec<RawQuizQuestion>,
}

impl From<RawBundle> for ArtifactBundle {
    fn from(raw: RawBundle) -> Self {
        ArtifactBundle {
            summary: raw.summary.trim().to_string(),
            flashcards: raw
                .flashcards
                .into_iter()
                .map(|c| FlashcardDraft {
                    front: c.front.trim().to_string(),
                    back: c.back.trim().to_string(),
                })
                .collect(),
            quiz: raw
                .quiz
                .into_iter()
                .map(|q| QuizQuestionDraft {
                    question: q.question.trim().to_string(),
                    options: q.options.into_iter().map(|o| o.trim().to_string()).collect(),
                    correct_answer: q.correct_answer,
                    explanation: q.explanation.trim().to_string(),
                })
                .collect(),
        }
    }
}

/// Parses the model's reply into a bundle.
///
/// Models sometimes wrap the JSON in prose or code fences, so only the text
/// between the first `{` and the last `}` is parsed. Every quiz question must
/// carry its `correctAnswer`. When the reply does not parse, the failure carries
/// whatever summary can still be recovered: the `summary` field of a JSON reply,
/// or the raw text of a reply that is not JSON at all.
pub fn parse_bundle(content: &str) -> Result<ArtifactBundle, GenerationFailure> {
    let object = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&content[start..=end]),
        _ => None,
    };
    let e = match serde_json::from_str::<RawBundle>(object.unwrap_or(content)) {
        Ok(raw) => return Ok(raw.into()),
        Err(e) => e,
    };

    let reason = format!("Generation LLM returned malformed JSON: {}", e);
    let summary = match object {
        Some(json) => serde_json::from_str::<RawSummary>(json)
            .map(|raw| raw.summary.trim().to_string())
            .unwrap_or_default(),
        None => content.trim().to_string(),
    };
    if summary.is_empty() {
        Err(GenerationFailure::new(reason))
    } else {
        Err(GenerationFailure::with_partial(
            reason,
            ArtifactBundle {
                summary,
                ..Default::default()
            },
        ))
    }
}

//=========================================================================================
// `ArtifactGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl ArtifactGenerator for OpenAiGeneratorAdapter {
    async fn generate(
        &self,
        raw_input: &str,
        resource_type: ResourceType,
    ) -> Result<ArtifactBundle, GenerationFailure> {
        if raw_input.trim().is_empty() {
            return Err(GenerationFailure::new("There is no content to study."));
        }
        let input = truncate_input(raw_input);
        if input.len() < raw_input.len() {
            warn!(
                "Truncated {} input from {} to {} bytes",
                resource_type,
                raw_input.len(),
                input.len()
            );
        }

        let prompt = format!(
            "The following is {}.\n\n---\n{}\n---",
            source_label(resource_type),
            input
        );
        let content = self.complete(prompt).await?;
        let bundle = parse_bundle(&content)?;
        info!(
            "Generated {} flashcards and {} quiz questions with {}",
            bundle.flashcards.len(),
            bundle.quiz.len(),
            self.model
        );
        Ok(bundle)
    }
}
