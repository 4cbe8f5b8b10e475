use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::completion::{CompletionRequest, CompletionService, SearchMode};

pub const DEFAULT_GROK_MODEL: &str = "grok-4-fast";

#[derive(Serialize)]
struct GrokRequest<'a> {
    model: &'a str,
    input: Vec<InputMessage<'a>>,
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<SearchTool>,
}

#[derive(Serialize)]
struct InputMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SearchTool {
    XSearch { from_date: String, to_date: String },
    WebSearch,
}

#[derive(Deserialize)]
struct GrokResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputPart>,
}

#[derive(Deserialize)]
struct OutputPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// xAI Responses API with live X and web search; the event hunter's
/// preferred source.
pub struct GrokClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GrokClient {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(180))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_GROK_MODEL.to_string()),
        })
    }

    fn tools_for(search: &SearchMode) -> Vec<SearchTool> {
        match search {
            SearchMode::Off => Vec::new(),
            SearchMode::Grounded => vec![SearchTool::WebSearch],
            SearchMode::SocialAndWeb { from, to } => vec![
                SearchTool::XSearch {
                    from_date: from.format("%Y-%m-%d").to_string(),
                    to_date: to.format("%Y-%m-%d").to_string(),
                },
                SearchTool::WebSearch,
            ],
        }
    }
}

fn flatten_output(output: &[OutputItem]) -> String {
    output
        .iter()
        .filter(|item| item.kind == "message")
        .flat_map(|item| item.content.iter())
        .filter(|part| part.kind == "output_text")
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[async_trait]
impl CompletionService for GrokClient {
    fn name(&self) -> &'static str {
        "grok"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = GrokRequest {
            model: &self.model,
            input: vec![InputMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
            tools: Self::tools_for(&request.search),
        };

        let response = self
            .client
            .post("https://api.x.ai/v1/responses")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to xAI API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            anyhow::bail!("xAI API error {}: {}", status.as_u16(), error_text);
        }

        let grok_response = response
            .json::<GrokResponse>()
            .await
            .context("Failed to parse xAI API response")?;

        Ok(flatten_output(&grok_response.output))
    }
}
