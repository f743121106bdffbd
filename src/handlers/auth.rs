use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::{created, ok};
use crate::auth::{hash_password, verify_password, AuthUser, TokenService};
use crate::database::{Store, StoreError};
use crate::error::AppError;
use crate::models::{ApiResponse, LoginRequest, NewUser, RegisterRequest, User, UserRole};

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email or password".into())
}

#[post("/auth/register")]
pub async fn register(
    store: web::Data<dyn Store>,
    tokens: web::Data<TokenService>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let body = payload.into_inner();
    body.validate()?;

    let now = Utc::now();
    let user = store
        .create_user(NewUser {
            id: Uuid::new_v4(),
            email: body.email.trim().to_lowercase(),
            name: body.name.trim().to_string(),
            password_hash: hash_password(&body.password)?,
            role: UserRole::Owner,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .map_err(|err| match err {
            StoreError::Conflict(_) => {
                AppError::Conflict("An account with this email already exists".into())
            }
            other => other.into(),
        })?;

    log::info!("Registered user {}", user.id);
    let token = tokens.issue(&user)?;
    let mut response = created(user);
    response.add_cookie(&tokens.session_cookie(token)).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(response)
}

#[post("/auth/login")]
pub async fn login(
    store: web::Data<dyn Store>,
    tokens: web::Data<TokenService>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let body = payload.into_inner();
    body.validate()?;

    let user = store
        .get_user_by_email(&body.email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid_credentials)?;
    if !verify_password(&body.password, &user.password_hash) {
        return Err(invalid_credentials());
    }
    if !user.is_active {
        return Err(AppError::Unauthorized("Account is deactivated".into()));
    }

    let token = tokens.issue(&user)?;
    let mut response = ok(user);
    response.add_cookie(&tokens.session_cookie(token)).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(response)
}

#[post("/auth/logout")]
pub async fn logout(tokens: web::Data<TokenService>) -> Result<HttpResponse, AppError> {
    let mut response = HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({
        "logged_out": true
    })));
    response.add_cookie(&tokens.clear_cookie()).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(response)
}

#[get("/auth/me")]
pub async fn me(store: web::Data<dyn Store>, user: AuthUser) -> Result<HttpResponse, AppError> {
    let current: User = store
        .get_user(user.id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("Account is no longer active".into()))?;
    Ok(ok(current))
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use serde_json::json;

    use crate::auth::SESSION_COOKIE;
    use crate::handlers::tests::{body_json, test_app, TestState};

    #[actix_web::test]
    async fn register_sets_cookie_and_me_returns_user() {
        let state = TestState::new();
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/auth/register")
                .set_json(json!({
                    "email": "Owner@Example.com",
                    "name": "Owner",
                    "password": "password123"
                }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 201);
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .expect("session cookie")
            .into_owned();
        assert_eq!(cookie.http_only(), Some(true));
        let body = body_json(resp).await;
        assert_eq!(body["data"]["email"], "owner@example.com");
        assert!(body["data"].get("password_hash").is_none());

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/v1/auth/me").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(body_json(resp).await["data"]["role"], "owner");
    }

    #[actix_web::test]
    async fn duplicate_email_is_conflict() {
        let state = TestState::new();
        state.user("taken@example.com", crate::models::UserRole::Owner).await;
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/auth/register")
                .set_json(json!({
                    "email": "TAKEN@example.com",
                    "name": "Someone",
                    "password": "password123"
                }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 409);
    }

    #[actix_web::test]
    async fn login_rejects_wrong_password() {
        let state = TestState::new();
        state.user("owner@example.com", crate::models::UserRole::Owner).await;
        let app = test_app!(state);

        let login = |password: &str| {
            test::TestRequest::post()
                .uri("/api/v1/auth/login")
                .set_json(json!({ "email": "owner@example.com", "password": password }))
                .to_request()
        };
        let resp = test::call_service(&app, login("not-the-password")).await;
        assert_eq!(resp.status(), 401);

        let resp = test::call_service(&app, login("password123")).await;
        assert_eq!(resp.status(), 200);
        assert!(resp.response().cookies().any(|c| c.name() == SESSION_COOKIE));
    }
}
