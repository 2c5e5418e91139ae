// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OpenAI chat-completions proxy for the AI coach.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_REPLY_TOKENS: u32 = 800;

pub const COACH_SYSTEM_PROMPT: &str = "You are REPZ Coach, a friendly and knowledgeable fitness \
coach. Give practical, safe advice on training, form, recovery and nutrition. Keep answers \
concise. Do not give medical diagnoses; suggest seeing a professional for injuries or health \
conditions.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

pub struct OpenAiClient {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(OPENAI_HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            api_url: OPENAI_API_URL.to_string(),
        })
    }

    /// Complete a conversation, prefixed with the coach system prompt.
    pub async fn chat(&self, history: Vec<ChatMessage>) -> Result<String, AppError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: with_system_prompt(history),
            max_tokens: MAX_REPLY_TOKENS,
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!("OpenAI returned {}", status)));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid OpenAI response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::Upstream("OpenAI returned no choices".to_string()))
    }
}

fn with_system_prompt(history: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage {
        role: "system".to_string(),
        content: COACH_SYSTEM_PROMPT.to_string(),
    });
    messages.extend(history);
    messages
}
