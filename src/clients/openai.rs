use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{rating_plan, ClientError, GenerationContext, TemplateGenerator};
use crate::models::DraftTemplate;

/// Chat-completions client for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TemplatePayload {
    templates: Vec<RawTemplate>,
}

#[derive(Debug, Deserialize)]
struct RawTemplate {
    rating: i64,
    content: String,
}

impl OpenAiGenerator {
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize_base_url(&base_url),
            api_key,
            model,
        })
    }

    fn prompt(context: &GenerationContext, ratings: &[i16]) -> String {
        let mut prompt = format!(
            "Write {} short customer review templates for the business \"{}\".\n",
            ratings.len(),
            context.business_name
        );
        if let Some(category) = &context.category {
            prompt.push_str(&format!("Category: {category}\n"));
        }
        if let Some(description) = &context.description {
            prompt.push_str(&format!("About: {description}\n"));
        }
        if let Some(website) = &context.website {
            prompt.push_str(&format!("Website: {website}\n"));
        }
        if let Some(page) = &context.page {
            if let Some(title) = &page.title {
                prompt.push_str(&format!("Page title: {title}\n"));
            }
            if let Some(description) = &page.description {
                prompt.push_str(&format!("Page description: {description}\n"));
            }
            if !page.headings.is_empty() {
                prompt.push_str(&format!("Page headings: {}\n", page.headings.join("; ")));
            }
        }
        let ratings: Vec<String> = ratings.iter().map(ToString::to_string).collect();
        prompt.push_str(&format!(
            "Use these star ratings in order: {}.\n\
             Reply with JSON only: {{\"templates\": [{{\"rating\": <1-5>, \"content\": \"...\"}}]}}",
            ratings.join(", ")
        ));
        prompt
    }
}

#[async_trait]
impl TemplateGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        context: &GenerationContext,
        count: usize,
    ) -> Result<Vec<DraftTemplate>, ClientError> {
        let ratings = rating_plan(count);
        let messages = vec![
            ChatMessage {
                role: "system",
                content: "You write realistic, specific customer reviews that a happy customer \
                          could post with light edits. Never invent prices or staff names."
                    .to_string(),
            },
            ChatMessage {
                role: "user",
                content: Self::prompt(context, &ratings),
            },
        ];

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "temperature": 0.8,
                "response_format": { "type": "json_object" },
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ClientError::InvalidResponse("completion has no content".into()))?;

        let templates = parse_templates(&content)?;
        log::debug!("Generated {} templates for {}", templates.len(), context.business_name);
        Ok(templates.into_iter().take(count).collect())
    }
}

/// Extract templates from the model reply, tolerating a fenced code block around the JSON.
fn parse_templates(content: &str) -> Result<Vec<DraftTemplate>, ClientError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    let payload: TemplatePayload = serde_json::from_str(body.trim())
        .map_err(|e| ClientError::InvalidResponse(format!("templates are not valid JSON: {e}")))?;

    let templates: Vec<DraftTemplate> = payload
        .templates
        .into_iter()
        .filter(|t| !t.content.trim().is_empty())
        .map(|t| DraftTemplate {
            rating: t.rating.clamp(1, 5) as i16,
            content: t.content.trim().to_string(),
        })
        .collect();

    if templates.is_empty() {
        return Err(ClientError::InvalidResponse("no templates in reply".into()));
    }
    Ok(templates)
}

fn normalize_base_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}
