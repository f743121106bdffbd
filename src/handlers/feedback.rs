use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{created, load_business, load_managed_business, ok, FeedbackSettings};
use crate::activity::log_business_activity;
use crate::auth::AuthUser;
use crate::cache::FeedbackCache;
use crate::clients::{ClientError, GenerationContext, PageScraper, PageSummary, TemplateGenerator};
use crate::database::Store;
use crate::error::AppError;
use crate::lifecycle::{state_of, BusinessState};
use crate::models::{Business, GenerationResult, PreviewFeedbackRequest, ReviewTemplate};
use crate::usage;

const PUBLIC_TEMPLATE_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
struct PublicFeedback {
    business_id: Uuid,
    business_name: String,
    templates: Vec<ReviewTemplate>,
}

/// Best-effort page context; a failed fetch only costs prompt quality.
async fn scrape_context(scraper: &dyn PageScraper, url: Option<&str>) -> Option<PageSummary> {
    let url = url.filter(|u| u.starts_with("http://") || u.starts_with("https://"))?;
    match scraper.summarize(url).await {
        Ok(summary) => Some(summary),
        Err(err) => {
            log::warn!("Could not scrape {url} for generation context: {err}");
            None
        }
    }
}

fn context_for(business: &Business, page: Option<PageSummary>) -> GenerationContext {
    GenerationContext {
        business_name: business.name.clone(),
        category: business.category.clone(),
        description: business.description.clone(),
        website: business.website.clone(),
        page,
    }
}

#[post("/businesses/{business_id}/feedback/generate")]
pub async fn generate_feedback(
    store: web::Data<dyn Store>,
    generator: web::Data<dyn TemplateGenerator>,
    scraper: web::Data<dyn PageScraper>,
    cache: web::Data<FeedbackCache>,
    settings: web::Data<FeedbackSettings>,
    user: AuthUser,
    business_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let mut business = load_managed_business(store.get_ref(), &user, business_id.into_inner()).await?;
    usage::check(&business)?;

    let source = business.website.as_deref().or(Some(business.google_maps_url.as_str()));
    let page = scrape_context(scraper.get_ref(), source).await;
    let drafts = generator
        .generate(&context_for(&business, page), settings.templates_per_generation)
        .await?;
    if drafts.is_empty() {
        return Err(ClientError::InvalidResponse("generator returned no templates".into()).into());
    }

    let templates = store.insert_templates(business.id, drafts).await?;
    usage::record_generation(&mut business, Utc::now());
    let business = store.update_business(business).await?;
    cache.invalidate(&business.id).await;

    log::info!(
        "Generated {} templates for business {} ({} used)",
        templates.len(),
        business.id,
        business.generation_count
    );
    log_business_activity(
        store.get_ref(),
        business.id,
        user.id,
        "feedback_generated",
        json!({ "count": templates.len(), "generation_count": business.generation_count }),
    )
    .await;

    Ok(created(GenerationResult {
        templates,
        usage: usage::report(&business),
    }))
}

/// Ad-hoc generation for onboarding; nothing is stored or counted.
#[post("/feedback/preview")]
pub async fn preview_feedback(
    generator: web::Data<dyn TemplateGenerator>,
    scraper: web::Data<dyn PageScraper>,
    settings: web::Data<FeedbackSettings>,
    _user: AuthUser,
    payload: web::Json<PreviewFeedbackRequest>,
) -> Result<HttpResponse, AppError> {
    let body = payload.into_inner();
    body.validate()?;

    let page = scrape_context(scraper.get_ref(), body.website.as_deref()).await;
    let context = GenerationContext {
        business_name: body.business_name,
        category: body.category,
        description: None,
        website: body.website,
        page,
    };
    let count = body.count.unwrap_or(settings.templates_per_generation);
    Ok(ok(generator.generate(&context, count).await?))
}

#[get("/public/businesses/{business_id}/feedback")]
pub async fn public_feedback(
    store: web::Data<dyn Store>,
    cache: web::Data<FeedbackCache>,
    business_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let business = load_business(store.get_ref(), business_id.into_inner()).await?;
    if state_of(&business) != BusinessState::Active {
        return Err(AppError::NotFound("Business"));
    }

    let templates = match cache.get(&business.id).await {
        Some(templates) => templates,
        None => {
            let templates = store.list_templates(business.id, PUBLIC_TEMPLATE_LIMIT).await?;
            cache.insert(business.id, templates.clone()).await;
            templates
        }
    };

    Ok(ok(PublicFeedback {
        business_id: business.id,
        business_name: business.name,
        templates,
    }))
}
