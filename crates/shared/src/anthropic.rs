use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::completion::{CompletionRequest, CompletionService, SearchMode};

pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-5";

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WebSearchTool>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct WebSearchTool {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
    max_uses: u32,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<Content>,
}

/// One block of the typed response; search results and tool-use blocks
/// carry no `text`.
#[derive(Deserialize)]
struct Content {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API. Search modes attach the server-side web
/// search tool.
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    model: String,
}

impl ClaudeClient {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.to_string()),
        })
    }

    fn tools_for(search: &SearchMode) -> Vec<WebSearchTool> {
        match search {
            SearchMode::Off => Vec::new(),
            SearchMode::Grounded | SearchMode::SocialAndWeb { .. } => vec![WebSearchTool {
                kind: "web_search_20250305",
                name: "web_search",
                max_uses: 5,
            }],
        }
    }
}

fn flatten_text(content: &[Content]) -> String {
    content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join("")
        .trim()
        .to_string()
}

#[async_trait]
impl CompletionService for ClaudeClient {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ClaudeRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
            tools: Self::tools_for(&request.search),
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Claude API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            anyhow::bail!("Claude API error {}: {}", status.as_u16(), error_text);
        }

        let claude_response = response
            .json::<ClaudeResponse>()
            .await
            .context("Failed to parse Claude API response")?;

        let text = flatten_text(&claude_response.content);
        if text.is_empty() {
            anyhow::bail!("Claude API returned no text content");
        }
        Ok(text)
    }
}
