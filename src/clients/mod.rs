//! Outbound collaborators: the AI template generator and the business page scraper.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::DraftTemplate;

pub mod offline;
pub mod openai;
pub mod page;

pub use offline::OfflineGenerator;
pub use openai::OpenAiGenerator;
pub use page::HttpPageScraper;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Text pulled from a business web page to ground the generated reviews.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageSummary {
    pub title: Option<String>,
    pub description: Option<String>,
    pub headings: Vec<String>,
}

/// What the generator knows about the business.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    pub business_name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub page: Option<PageSummary>,
}

#[async_trait]
pub trait TemplateGenerator: Send + Sync {
    async fn generate(
        &self,
        context: &GenerationContext,
        count: usize,
    ) -> Result<Vec<DraftTemplate>, ClientError>;
}

#[async_trait]
pub trait PageScraper: Send + Sync {
    async fn summarize(&self, url: &str) -> Result<PageSummary, ClientError>;
}

const RATING_PATTERN: [i16; 10] = [5, 5, 4, 4, 3, 5, 4, 2, 5, 1];

/// Star ratings for a batch of `count` templates, mostly positive with the full range present
/// once the batch is large enough.
pub fn rating_plan(count: usize) -> Vec<i16> {
    (0..count)
        .map(|i| RATING_PATTERN[i % RATING_PATTERN.len()])
        .collect()
}
