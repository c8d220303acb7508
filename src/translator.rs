use crate::config::RelayConfig;
use crate::field_guide::{AllowList, FieldGuide};
use crate::io_struct::StructuredReply;
use crate::openai_api_types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::prompt::{
    ALLOWED_ENTITIES_PLACEHOLDER, FIELD_GUIDE_PLACEHOLDER, PromptTemplate, QUERY_PLACEHOLDER,
};
use log::{debug, info};
use serde_json::Value;

pub const SYSTEM_ROLE: &str = "You are a helpful SAP expert.";

/// Every variant is reported to the caller the same way; the variants only matter for logs.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("Completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Completion service returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Completion reply has no message content")]
    EmptyReply,
    #[error("No valid JSON object found in model response.")]
    NoJsonObject,
    #[error("Invalid JSON in model response: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct IntentTranslator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    template: PromptTemplate,
    field_guide_json: String,
    allowed_entities: String,
}

impl IntentTranslator {
    pub fn new(
        client: reqwest::Client,
        config: &RelayConfig,
        template: PromptTemplate,
        field_guide: &FieldGuide,
        allow_list: &AllowList,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.llm_base_url),
            api_key: config.credentials.openai_api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            template,
            field_guide_json: field_guide.to_json()?,
            allowed_entities: allow_list.render(),
        })
    }

    pub fn render_prompt(&self, user_query: &str) -> String {
        self.template.render(&[
            (QUERY_PLACEHOLDER, user_query),
            (FIELD_GUIDE_PLACEHOLDER, self.field_guide_json.as_str()),
            (ALLOWED_ENTITIES_PLACEHOLDER, self.allowed_entities.as_str()),
        ])
    }

    pub async fn translate(&self, user_query: &str) -> Result<StructuredReply, TranslateError> {
        let prompt = self.render_prompt(user_query);
        let raw = self.complete(&prompt).await?;
        info!("Model response:\n{}", raw);
        parse_structured_reply(&raw)
    }

    async fn complete(&self, prompt: &str) -> Result<String, TranslateError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(SYSTEM_ROLE), ChatMessage::user(prompt)],
            temperature: Some(self.temperature),
            max_tokens: None,
        };
        debug!("POST {} (model {})", self.endpoint, self.model);
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TranslateError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        let completion: ChatCompletionResponse = resp.json().await?;
        completion.first_content().ok_or(TranslateError::EmptyReply)
    }
}

/// Parse the reply object out of `raw`.
///
/// The first balanced `{...}` span carrying a `views` key wins. Without one, the first span
/// that is valid JSON is used, so a reply with no views still yields its interpretation.
pub fn parse_structured_reply(raw: &str) -> Result<StructuredReply, TranslateError> {
    let mut first_valid = None;
    let mut last_err = None;
    for span in json_object_spans(raw) {
        match serde_json::from_str::<Value>(span) {
            Ok(value) if value.get("views").is_some() => {
                return Ok(serde_json::from_value(value)?);
            }
            Ok(value) => {
                debug!("Brace span has no views key: {}", span);
                if first_valid.is_none() {
                    first_valid = Some(value);
                }
            }
            Err(e) => {
                debug!("Skipping brace span that is not JSON: {}", e);
                last_err = Some(e);
            }
        }
    }
    match (first_valid, last_err) {
        (Some(value), _) => Ok(serde_json::from_value(value)?),
        (None, Some(e)) => Err(TranslateError::InvalidJson(e)),
        (None, None) => Err(TranslateError::NoJsonObject),
    }
}

/// Top-level balanced brace spans in order of appearance.
///
/// Braces inside JSON string literals are ignored once a span is open. An unterminated
/// trailing span is dropped.
pub fn json_object_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if depth > 0 && in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=i]);
                }
            }
            '"' if depth > 0 => in_string = true,
            _ => {}
        }
    }
    spans
}
