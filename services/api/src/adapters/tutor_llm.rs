//! services/api/src/adapters/tutor_llm.rs
//!
//! This module contains the adapter for the tutoring chat LLM.
//! It implements the `TutorService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use study_assistant_core::{
    domain::{ChatMessage, ChatRole, Resource},
    ports::{PortError, PortResult, TutorService},
};

/// How much of the original material is quoted to the tutor.
const CONTEXT_CHARS: usize = 12_000;

const TUTOR_INSTRUCTIONS: &str = "You are a patient tutor helping a student study one piece of \
material. Answer using the material and its summary first, and say so when the material does \
not cover the question. Keep answers short and conversational, and use markdown for lists or \
formulas.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TutorService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiTutorAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiTutorAdapter {
    /// Creates a new `OpenAiTutorAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

fn material_context(resource: &Resource) -> String {
    let excerpt: String = resource.original_content.chars().take(CONTEXT_CHARS).collect();
    format!(
        "{}\n\nTITLE: {}\n\nSUMMARY:\n{}\n\nMATERIAL:\n---\n{}\n---",
        TUTOR_INSTRUCTIONS, resource.title, resource.summary, excerpt
    )
}

fn history_message(message: &ChatMessage) -> PortResult<ChatCompletionRequestMessage> {
    let built: ChatCompletionRequestMessage = match message.role {
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
        ChatRole::Model => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    };
    Ok(built)
}

//=========================================================================================
// `TutorService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TutorService for OpenAiTutorAdapter {
    async fn reply(
        &self,
        resource: &Resource,
        history: &[ChatMessage],
        question: &str,
    ) -> PortResult<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 2);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(material_context(resource))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        for message in history {
            messages.push(history_message(message)?);
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(question)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Tutor LLM response contained no text content.".to_string())
            })
    }
}
