use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{created, ensure_url_available, load_managed_business, ok};
use crate::activity::log_business_activity;
use crate::auth::AuthUser;
use crate::cache::FeedbackCache;
use crate::database::Store;
use crate::duplicates::find_conflict;
use crate::error::AppError;
use crate::lifecycle;
use crate::maps_url::{self, NormalizedMapsUrl};
use crate::models::{
    ChangePlanRequest, CheckUrlRequest, CreateBusinessRequest, UpdateBusinessRequest,
    UrlCheckResult,
};
use crate::usage;

const ACTIVITY_PAGE: i64 = 100;

#[post("/businesses")]
pub async fn create_business(
    store: web::Data<dyn Store>,
    user: AuthUser,
    payload: web::Json<CreateBusinessRequest>,
) -> Result<HttpResponse, AppError> {
    let body = payload.into_inner();
    body.validate()?;

    let normalized = NormalizedMapsUrl::parse(&body.google_maps_url)?;
    ensure_url_available(store.get_ref(), normalized.as_str(), None, user.id).await?;

    let business = store
        .create_business(body.into_new_business(user.id, normalized.into_inner()))
        .await?;
    log::info!("Business {} created by {}", business.id, user.id);
    log_business_activity(
        store.get_ref(),
        business.id,
        user.id,
        "business_created",
        json!({ "name": business.name }),
    )
    .await;
    Ok(created(business))
}

#[get("/businesses")]
pub async fn list_businesses(
    store: web::Data<dyn Store>,
    user: AuthUser,
) -> Result<HttpResponse, AppError> {
    Ok(ok(store.list_businesses_for_owner(user.id).await?))
}

/// Businesses an admin archived away from the caller; candidates for a restore request.
#[get("/businesses/archived")]
pub async fn list_archived_businesses(
    store: web::Data<dyn Store>,
    user: AuthUser,
) -> Result<HttpResponse, AppError> {
    Ok(ok(store.list_archived_for_previous_owner(user.id).await?))
}

#[post("/businesses/check-url")]
pub async fn check_url(
    store: web::Data<dyn Store>,
    user: AuthUser,
    payload: web::Json<CheckUrlRequest>,
) -> Result<HttpResponse, AppError> {
    let normalized = maps_url::normalize(&payload.google_maps_url);
    if normalized.is_empty() {
        return Err(maps_url::MapsUrlError::Empty.into());
    }
    let is_valid = maps_url::is_valid(&normalized);

    let conflict = if is_valid {
        let holders = store.find_active_by_normalized_url(&normalized).await?;
        find_conflict(&holders, &normalized, None, user.id)
    } else {
        None
    };

    Ok(ok(UrlCheckResult {
        is_valid,
        is_duplicate: conflict.is_some(),
        error_type: conflict.as_ref().map(|c| c.error_type()),
        details: conflict.as_ref().map(|c| c.details()),
        normalized_google_maps_url: normalized,
    }))
}

#[get("/businesses/{business_id}")]
pub async fn get_business(
    store: web::Data<dyn Store>,
    user: AuthUser,
    business_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let business = load_managed_business(store.get_ref(), &user, business_id.into_inner()).await?;
    Ok(ok(business))
}

#[put("/businesses/{business_id}")]
pub async fn update_business(
    store: web::Data<dyn Store>,
    user: AuthUser,
    business_id: web::Path<Uuid>,
    payload: web::Json<UpdateBusinessRequest>,
) -> Result<HttpResponse, AppError> {
    let body = payload.into_inner();
    body.validate()?;

    let mut business = load_managed_business(store.get_ref(), &user, business_id.into_inner()).await?;
    lifecycle::ensure_editable(&business)?;

    if let Some(raw) = &body.google_maps_url {
        let normalized = NormalizedMapsUrl::parse(raw)?;
        if normalized.as_str() != business.normalized_google_maps_url {
            ensure_url_available(
                store.get_ref(),
                normalized.as_str(),
                Some(business.id),
                business.owner_id,
            )
            .await?;
        }
        business.google_maps_url = raw.trim().to_string();
        business.normalized_google_maps_url = normalized.into_inner();
    }
    body.apply_to_existing(&mut business);

    let business = store.update_business(business).await?;
    log_business_activity(
        store.get_ref(),
        business.id,
        user.id,
        "business_updated",
        json!({ "google_maps_url_changed": body.google_maps_url.is_some() }),
    )
    .await;
    Ok(ok(business))
}

/// Owner-initiated permanent deactivation.
#[delete("/businesses/{business_id}")]
pub async fn delete_business(
    store: web::Data<dyn Store>,
    cache: web::Data<FeedbackCache>,
    user: AuthUser,
    business_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let mut business = load_managed_business(store.get_ref(), &user, business_id.into_inner()).await?;
    lifecycle::deactivate_permanently(&mut business, Utc::now())?;
    let business = store.update_business(business).await?;
    cache.invalidate(&business.id).await;

    log::info!("Business {} permanently deactivated by {}", business.id, user.id);
    log_business_activity(store.get_ref(), business.id, user.id, "business_deactivated", json!({}))
        .await;
    Ok(ok(business))
}

#[get("/businesses/{business_id}/usage")]
pub async fn get_usage(
    store: web::Data<dyn Store>,
    user: AuthUser,
    business_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let business = load_managed_business(store.get_ref(), &user, business_id.into_inner()).await?;
    Ok(ok(usage::report(&business)))
}

/// Plan change. There is no payment gateway; the new tier applies immediately.
#[post("/businesses/{business_id}/plan")]
pub async fn change_plan(
    store: web::Data<dyn Store>,
    user: AuthUser,
    business_id: web::Path<Uuid>,
    payload: web::Json<ChangePlanRequest>,
) -> Result<HttpResponse, AppError> {
    let mut business = load_managed_business(store.get_ref(), &user, business_id.into_inner()).await?;
    lifecycle::ensure_active(&business)?;

    let previous_tier = business.subscription_tier;
    let reactivation = usage::change_tier(&mut business, payload.tier, user.id, Utc::now());
    let business = store.update_business(business).await?;
    if let Some(record) = reactivation {
        store.create_reactivation(record).await?;
        log::info!("Business {} reactivated by plan change", business.id);
    }

    log_business_activity(
        store.get_ref(),
        business.id,
        user.id,
        "plan_changed",
        json!({ "from": previous_tier, "to": business.subscription_tier }),
    )
    .await;
    Ok(ok(usage::report(&business)))
}

#[get("/businesses/{business_id}/activity")]
pub async fn list_activity(
    store: web::Data<dyn Store>,
    user: AuthUser,
    business_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let business = load_managed_business(store.get_ref(), &user, business_id.into_inner()).await?;
    Ok(ok(store.list_business_activity(business.id, ACTIVITY_PAGE).await?))
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use serde_json::json;

    use crate::duplicates::{DUPLICATE_GOOGLE_MAPS_URL, DUPLICATE_GOOGLE_MAPS_URL_OWN};
    use crate::error::INVALID_GOOGLE_MAPS_URL;
    use crate::handlers::tests::{authed, body_json, create_body, test_app, TestState};
    use crate::models::UserRole;

    #[actix_web::test]
    async fn create_rejects_duplicates_with_typed_errors() {
        let state = TestState::new();
        let (_, alice) = state.user("alice@example.com", UserRole::Owner).await;
        let (_, bob) = state.user("bob@example.com", UserRole::Owner).await;
        let app = test_app!(state);

        let create = |token: &str, url: &str| {
            authed(test::TestRequest::post().uri("/api/v1/businesses"), token)
                .set_json(create_body("Corner Cafe", url))
                .to_request()
        };

        let resp = test::call_service(&app, create(&alice, "https://www.google.com/maps/place/Corner+Cafe")).await;
        assert_eq!(resp.status(), 201);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["normalized_google_maps_url"], "google.com/maps/place/corner+cafe");

        let resp = test::call_service(&app, create(&alice, "google.com/maps/place/corner+cafe/?hl=en")).await;
        assert_eq!(resp.status(), 409);
        assert_eq!(body_json(resp).await["error_type"], DUPLICATE_GOOGLE_MAPS_URL_OWN);

        let resp = test::call_service(&app, create(&bob, "HTTPS://google.com/maps/place/Corner+Cafe#top")).await;
        assert_eq!(resp.status(), 409);
        let body = body_json(resp).await;
        assert_eq!(body["error_type"], DUPLICATE_GOOGLE_MAPS_URL);
        assert!(body["details"]["existing_business"].get("owner_id").is_none());
    }

    #[actix_web::test]
    async fn create_rejects_non_maps_url() {
        let state = TestState::new();
        let (_, token) = state.user("owner@example.com", UserRole::Owner).await;
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            authed(test::TestRequest::post().uri("/api/v1/businesses"), &token)
                .set_json(create_body("Shop", "https://example.com"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 400);
        assert_eq!(body_json(resp).await["error_type"], INVALID_GOOGLE_MAPS_URL);
    }

    #[actix_web::test]
    async fn check_url_reports_conflict_without_writing() {
        let state = TestState::new();
        let (_, alice) = state.user("alice@example.com", UserRole::Owner).await;
        let (_, bob) = state.user("bob@example.com", UserRole::Owner).await;
        let app = test_app!(state);

        test::call_service(
            &app,
            authed(test::TestRequest::post().uri("/api/v1/businesses"), &alice)
                .set_json(create_body("Cafe", "https://maps.google.com/place/cafe"))
                .to_request(),
        )
        .await;

        let resp = test::call_service(
            &app,
            authed(test::TestRequest::post().uri("/api/v1/businesses/check-url"), &bob)
                .set_json(json!({ "google_maps_url": "maps.google.com/place/CAFE?x=1" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["is_valid"], true);
        assert_eq!(body["data"]["is_duplicate"], true);
        assert_eq!(body["data"]["error_type"], DUPLICATE_GOOGLE_MAPS_URL);

        let resp = test::call_service(
            &app,
            authed(test::TestRequest::get().uri("/api/v1/businesses"), &bob).to_request(),
        )
        .await;
        assert_eq!(body_json(resp).await["data"].as_array().unwrap().len(), 0);
    }

    #[actix_web::test]
    async fn other_tenants_cannot_read_or_delete() {
        let state = TestState::new();
        let (_, alice) = state.user("alice@example.com", UserRole::Owner).await;
        let (_, bob) = state.user("bob@example.com", UserRole::Owner).await;
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            authed(test::TestRequest::post().uri("/api/v1/businesses"), &alice)
                .set_json(create_body("Cafe", "https://maps.google.com/place/cafe"))
                .to_request(),
        )
        .await;
        let id = body_json(resp).await["data"]["id"].as_str().unwrap().to_string();

        let resp = test::call_service(
            &app,
            authed(test::TestRequest::get().uri(&format!("/api/v1/businesses/{id}")), &bob).to_request(),
        )
        .await;
        assert_eq!(resp.status(), 403);

        let resp = test::call_service(
            &app,
            authed(test::TestRequest::delete().uri(&format!("/api/v1/businesses/{id}")), &alice)
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);

        let resp = test::call_service(
            &app,
            authed(test::TestRequest::get().uri(&format!("/api/v1/businesses/{id}")), &alice)
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn update_moves_url_only_when_free() {
        let state = TestState::new();
        let (_, alice) = state.user("alice@example.com", UserRole::Owner).await;
        let app = test_app!(state);

        let mut ids = Vec::new();
        for url in ["https://maps.google.com/place/one", "https://maps.google.com/place/two"] {
            let resp = test::call_service(
                &app,
                authed(test::TestRequest::post().uri("/api/v1/businesses"), &alice)
                    .set_json(create_body("Cafe", url))
                    .to_request(),
            )
            .await;
            ids.push(body_json(resp).await["data"]["id"].as_str().unwrap().to_string());
        }

        let update = |url: &str| {
            authed(test::TestRequest::put().uri(&format!("/api/v1/businesses/{}", ids[1])), &alice)
                .set_json(json!({ "google_maps_url": url, "name": "Renamed" }))
                .to_request()
        };
        let resp = test::call_service(&app, update("maps.google.com/place/one/")).await;
        assert_eq!(resp.status(), 409);

        let resp = test::call_service(&app, update("https://maps.google.com/place/three")).await;
        assert_eq!(resp.status(), 200);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["name"], "Renamed");
        assert_eq!(body["data"]["normalized_google_maps_url"], "maps.google.com/place/three");
    }

    #[actix_web::test]
    async fn plan_upgrade_reports_new_limit() {
        let state = TestState::new();
        let (_, alice) = state.user("alice@example.com", UserRole::Owner).await;
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            authed(test::TestRequest::post().uri("/api/v1/businesses"), &alice)
                .set_json(create_body("Cafe", "https://maps.google.com/place/cafe"))
                .to_request(),
        )
        .await;
        let id = body_json(resp).await["data"]["id"].as_str().unwrap().to_string();

        let resp = test::call_service(
            &app,
            authed(test::TestRequest::post().uri(&format!("/api/v1/businesses/{id}/plan")), &alice)
                .set_json(json!({ "tier": "starter" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["tier"], "starter");
        assert_eq!(body["data"]["limit"], 50);
        assert_eq!(body["data"]["can_generate"], true);
    }
}
