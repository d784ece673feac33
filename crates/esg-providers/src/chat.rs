//! OpenAI-compatible chat completions, used both for metric extraction and
//! for answering questions about stored sources.

use esg_core::llm::{Answerer, Extractor, Prompt};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::{Error, ProviderSettings, Result, check_status};

const SERVICE: &str = "chat model";

#[derive(Clone)]
pub struct OpenAiChat {
  client:   reqwest::Client,
  base_url: String,
  api_key:  String,
  model:    String,
}

/// Sampling parameters for one kind of call.
struct Sampling {
  temperature: f64,
  max_tokens:  u32,
  json:        bool,
}

const EXTRACTION: Sampling = Sampling { temperature: 0.2, max_tokens: 2000, json: true };
const ANSWER: Sampling = Sampling { temperature: 0.3, max_tokens: 500, json: false };

impl OpenAiChat {
  pub fn new(client: reqwest::Client, settings: &ProviderSettings) -> Result<Self> {
    Ok(Self {
      client,
      base_url: settings.openai_base_url.trim_end_matches('/').to_owned(),
      api_key: settings.openai_key()?,
      model: settings.model.clone(),
    })
  }

  pub fn model(&self) -> &str { &self.model }

  fn request_body(&self, prompt: &Prompt, sampling: &Sampling) -> Value {
    let mut body = json!({
      "model": self.model,
      "messages": [
        { "role": "system", "content": prompt.system },
        { "role": "user", "content": prompt.user },
      ],
      "temperature": sampling.temperature,
      "max_tokens": sampling.max_tokens,
    });
    if sampling.json {
      body["response_format"] = json!({ "type": "json_object" });
    }
    body
  }

  async fn complete(&self, prompt: &Prompt, sampling: &Sampling) -> Result<String> {
    let resp = self
      .client
      .post(format!("{}/chat/completions", self.base_url))
      .bearer_auth(&self.api_key)
      .json(&self.request_body(prompt, sampling))
      .send()
      .await?;
    let resp = check_status(SERVICE, resp).await?;
    let content = resp.json::<ChatResponse>().await?.into_content()?;

    debug!(model = %self.model, chars = content.len(), "completion received");
    Ok(content)
  }
}

#[derive(Deserialize)]
struct ChatResponse {
  #[serde(default)]
  choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
  message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
  #[serde(default)]
  content: Option<String>,
}

impl ChatResponse {
  fn into_content(self) -> Result<String> {
    self
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .ok_or_else(|| Error::Malformed {
        service: SERVICE,
        reason:  "response has no message content".to_owned(),
      })
  }
}

impl Extractor for OpenAiChat {
  type Error = Error;

  async fn extract_json<'a>(&'a self, prompt: &'a Prompt) -> Result<String> {
    self.complete(prompt, &EXTRACTION).await
  }
}

impl Answerer for OpenAiChat {
  type Error = Error;

  async fn answer<'a>(&'a self, prompt: &'a Prompt) -> Result<String> {
    let answer = self.complete(prompt, &ANSWER).await?;
    Ok(answer.trim().to_owned())
  }
}
