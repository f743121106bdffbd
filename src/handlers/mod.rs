use actix_web::{error::InternalError, get, web, HttpResponse, ResponseError};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::database::Store;
use crate::duplicates;
use crate::error::AppError;
use crate::models::{ApiResponse, Business};

pub mod admin;
pub mod auth;
pub mod businesses;
pub mod feedback;
pub mod reassignments;

/// Tunables for the feedback endpoints.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackSettings {
    pub templates_per_generation: usize,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            templates_per_generation: 5,
        }
    }
}

/// Register every route. Literal segments (`/businesses/archived`) come before `{id}` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        // Auth
        .service(auth::register)
        .service(auth::login)
        .service(auth::logout)
        .service(auth::me)
        // Businesses
        .service(businesses::create_business)
        .service(businesses::list_businesses)
        .service(businesses::list_archived_businesses)
        .service(businesses::check_url)
        .service(businesses::get_business)
        .service(businesses::update_business)
        .service(businesses::delete_business)
        .service(businesses::get_usage)
        .service(businesses::change_plan)
        .service(businesses::list_activity)
        // Feedback
        .service(feedback::generate_feedback)
        .service(feedback::preview_feedback)
        .service(feedback::public_feedback)
        // Reassignment requests
        .service(reassignments::create_request)
        .service(reassignments::list_my_requests)
        // Admin
        .service(admin::list_users)
        .service(admin::get_user)
        .service(admin::update_user)
        .service(admin::deactivate_user)
        .service(admin::list_businesses)
        .service(admin::update_subscription)
        .service(admin::reset_usage)
        .service(admin::archive_business)
        .service(admin::restore_business)
        .service(admin::deactivate_business)
        .service(admin::reassign_business)
        .service(admin::list_duplicates)
        .service(admin::resolve_duplicates)
        .service(admin::list_reassignments)
        .service(admin::approve_reassignment)
        .service(admin::reject_reassignment)
        .service(admin::list_activity_logs);
}

/// Malformed JSON bodies get the same envelope as every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid request body: {err}");
        InternalError::from_response(err, AppError::Validation(message).error_response()).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid query string: {err}");
        InternalError::from_response(err, AppError::Validation(message).error_response()).into()
    })
}

// ============================================================================
// HEALTH CHECK
// ============================================================================

#[get("/health")]
pub async fn health_check(store: web::Data<dyn Store>) -> HttpResponse {
    let (status, database) = match store.health_check().await {
        Ok(()) => ("ok", "ok"),
        Err(err) => {
            log::error!("Health check failed: {err:?}");
            ("degraded", "unavailable")
        }
    };
    let body = serde_json::json!({
        "status": status,
        "service": "reviewboost-service",
        "store": store.backend_name(),
        "database": database,
        "timestamp": Utc::now()
    });
    if status == "ok" {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

pub(crate) fn ok<T: serde::Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(data))
}

pub(crate) fn created<T: serde::Serialize>(data: T) -> HttpResponse {
    HttpResponse::Created().json(ApiResponse::success(data))
}

pub(crate) async fn load_business(store: &dyn Store, business_id: Uuid) -> Result<Business, AppError> {
    store
        .get_business(business_id)
        .await?
        .ok_or(AppError::NotFound("Business"))
}

/// Load a business the caller owns. Deleted businesses are only visible to superadmins.
pub(crate) async fn load_managed_business(
    store: &dyn Store,
    user: &AuthUser,
    business_id: Uuid,
) -> Result<Business, AppError> {
    let business = load_business(store, business_id).await?;
    if business.deleted_at.is_some() && !user.is_superadmin() {
        return Err(AppError::NotFound("Business"));
    }
    if !user.can_manage(business.owner_id) {
        return Err(AppError::Forbidden);
    }
    Ok(business)
}

/// Fail with a duplicate error when another active business already holds `normalized`.
pub(crate) async fn ensure_url_available(
    store: &dyn Store,
    normalized: &str,
    exclude: Option<Uuid>,
    owner_id: Uuid,
) -> Result<(), AppError> {
    let holders = store.find_active_by_normalized_url(normalized).await?;
    match duplicates::find_conflict(&holders, normalized, exclude, owner_id) {
        Some(conflict) => {
            log::info!(
                "Rejected duplicate Google Maps URL {normalized} ({:?})",
                conflict.kind
            );
            Err(conflict.into())
        }
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::dev::ServiceResponse;
    use actix_web::{http::header, test};
    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::auth::{hash_password, TokenService};
    use crate::cache::FeedbackCache;
    use crate::clients::{
        ClientError, OfflineGenerator, PageScraper, PageSummary, TemplateGenerator,
    };
    use crate::database::MemoryStore;
    use crate::models::{NewBusiness, NewUser, SubscriptionTier, User, UserRole};

    pub(crate) struct FailingScraper;

    #[async_trait]
    impl PageScraper for FailingScraper {
        async fn summarize(&self, _url: &str) -> Result<PageSummary, ClientError> {
            Err(ClientError::InvalidResponse("offline".into()))
        }
    }

    pub(crate) struct TestState {
        pub memory: Arc<MemoryStore>,
        pub store: web::Data<dyn Store>,
        pub tokens: web::Data<TokenService>,
        pub generator: web::Data<dyn TemplateGenerator>,
        pub scraper: web::Data<dyn PageScraper>,
        pub cache: web::Data<FeedbackCache>,
        pub settings: web::Data<FeedbackSettings>,
    }

    impl TestState {
        pub fn new() -> Self {
            Self::with_generator(Arc::new(OfflineGenerator))
        }

        pub fn with_generator(generator: Arc<dyn TemplateGenerator>) -> Self {
            let memory = Arc::new(MemoryStore::new());
            let store: Arc<dyn Store> = memory.clone();
            let scraper: Arc<dyn PageScraper> = Arc::new(FailingScraper);
            Self {
                memory,
                store: web::Data::from(store),
                tokens: web::Data::new(TokenService::new(
                    "handler-tests",
                    Duration::from_secs(3600),
                    false,
                )),
                generator: web::Data::from(generator),
                scraper: web::Data::from(scraper),
                cache: web::Data::new(FeedbackCache::new(Duration::from_secs(300))),
                settings: web::Data::new(FeedbackSettings::default()),
            }
        }

        pub async fn user(&self, email: &str, role: UserRole) -> (User, String) {
            let now = Utc::now();
            let user = self
                .memory
                .create_user(NewUser {
                    id: Uuid::new_v4(),
                    email: email.to_string(),
                    name: email.split('@').next().unwrap_or("user").to_string(),
                    password_hash: hash_password("password123").unwrap(),
                    role,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
            let token = self.tokens.issue(&user).unwrap();
            (user, format!("Bearer {token}"))
        }

        pub async fn business(&self, owner_id: Uuid, url: &str) -> Business {
            self.business_aged(owner_id, url, 0).await
        }

        pub async fn business_aged(&self, owner_id: Uuid, url: &str, age_days: i64) -> Business {
            let normalized = crate::maps_url::normalize(url);
            self.memory
                .create_business(NewBusiness {
                    id: Uuid::new_v4(),
                    owner_id,
                    name: "Corner Cafe".to_string(),
                    category: Some("Cafe".to_string()),
                    description: None,
                    website: None,
                    google_maps_url: url.to_string(),
                    normalized_google_maps_url: normalized,
                    subscription_tier: SubscriptionTier::Free,
                    created_at: Utc::now() - chrono::Duration::days(age_days),
                })
                .await
                .unwrap()
        }
    }

    macro_rules! test_app {
        ($state:expr) => {
            actix_web::test::init_service(
                actix_web::App::new()
                    .app_data($state.store.clone())
                    .app_data($state.tokens.clone())
                    .app_data($state.generator.clone())
                    .app_data($state.scraper.clone())
                    .app_data($state.cache.clone())
                    .app_data($state.settings.clone())
                    .app_data($crate::handlers::json_config())
                    .app_data($crate::handlers::query_config())
                    .service(actix_web::web::scope("/api/v1").configure($crate::handlers::configure)),
            )
            .await
        };
    }
    pub(crate) use test_app;

    pub(crate) async fn body_json(response: ServiceResponse) -> Value {
        test::read_body_json(response).await
    }

    pub(crate) fn authed(method: test::TestRequest, token: &str) -> test::TestRequest {
        method.insert_header((header::AUTHORIZATION, token.to_string()))
    }

    pub(crate) fn create_body(name: &str, url: &str) -> Value {
        serde_json::json!({ "name": name, "google_maps_url": url })
    }

    #[actix_web::test]
    async fn health_reports_backend() {
        let state = TestState::new();
        let app = test_app!(state);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/health").to_request()).await;
        assert!(resp.status().is_success());
        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "memory");
    }

    #[actix_web::test]
    async fn malformed_json_gets_error_envelope() {
        let state = TestState::new();
        let (_, token) = state.user("owner@example.com", UserRole::Owner).await;
        let app = test_app!(state);
        let req = authed(test::TestRequest::post().uri("/api/v1/businesses"), &token)
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn unauthenticated_requests_are_rejected() {
        let state = TestState::new();
        let app = test_app!(state);
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/v1/businesses").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 401);
    }
}
