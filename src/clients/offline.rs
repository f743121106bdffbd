use async_trait::async_trait;

use super::{rating_plan, ClientError, GenerationContext, TemplateGenerator};
use crate::models::DraftTemplate;

/// Deterministic generator used when no AI endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGenerator;

fn sentence(rating: i16, name: &str, subject: &str) -> String {
    match rating {
        5 => format!("Absolutely loved {name}. The {subject} was outstanding and I will be back soon."),
        4 => format!("Really good experience at {name}. Great {subject}, just a little busy."),
        3 => format!("{name} was fine. The {subject} was decent but nothing special."),
        2 => format!("Mixed visit to {name}. The {subject} did not quite meet expectations."),
        _ => format!("Disappointing visit to {name}. The {subject} needs work."),
    }
}

#[async_trait]
impl TemplateGenerator for OfflineGenerator {
    async fn generate(
        &self,
        context: &GenerationContext,
        count: usize,
    ) -> Result<Vec<DraftTemplate>, ClientError> {
        let subject = context
            .category
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| "service".to_string());

        Ok(rating_plan(count)
            .into_iter()
            .map(|rating| DraftTemplate {
                rating,
                content: sentence(rating, &context.business_name, &subject),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn produces_requested_count_with_business_name() {
        let context = GenerationContext {
            business_name: "Corner Cafe".into(),
            ..Default::default()
        };
        let drafts = OfflineGenerator.generate(&context, 4).await.unwrap();
        assert_eq!(drafts.len(), 4);
        assert!(drafts.iter().all(|d| d.content.contains("Corner Cafe")));
    }
}
