//! Session tokens, password hashing and the request identity extractor.
//!
//! The session is an HS256 JWT stored in an HTTP-only cookie. Every authenticated handler takes
//! an [`AuthUser`] argument; the extractor decodes the token, loads the account and rejects the
//! request with 401 before the handler body runs.

use std::time::Duration;

use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use chrono::Utc;
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::database::Store;
use crate::error::AppError;
use crate::models::{User, UserRole};

pub const SESSION_COOKIE: &str = "rb_session";
const ISSUER: &str = "reviewboost";
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Password must be at least 8 characters")]
    WeakPassword,
}

/// Claims carried in the session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: UserRole,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    secure_cookie: bool,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("keys", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration, secure_cookie: bool) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            secure_cookie,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iss: ISSUER.to_string(),
            iat: now,
            exp: now.saturating_add(ttl),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        let max_age = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(max_age))
            .finish()
    }

    pub fn clear_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Lax)
            .finish();
        cookie.make_removal();
        cookie
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    pwhash::bcrypt::hash(password).map_err(|e| AuthError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    pwhash::bcrypt::verify(password, hash)
}

/// Identity of the caller, resolved from the session cookie or a bearer header.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_superadmin(&self) -> bool {
        self.role == UserRole::Superadmin
    }

    pub fn require_superadmin(&self) -> Result<(), AppError> {
        if self.is_superadmin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Owners may act on their own records; superadmins on everything.
    pub fn can_manage(&self, owner_id: Uuid) -> bool {
        self.is_superadmin() || self.id == owner_id
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
        }
    }
}

fn token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

fn claims_from_request(req: &HttpRequest) -> Result<Claims, AppError> {
    let Some(tokens) = req.app_data::<web::Data<TokenService>>() else {
        log::error!("TokenService missing from app data");
        return Err(AppError::Internal("Authentication unavailable".into()));
    };
    let token = token_from_request(req)
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".into()))?;
    tokens.verify(&token).map_err(|err| {
        log::debug!("Rejected session token: {err}");
        AppError::Unauthorized("Session is invalid or expired".into())
    })
}

/// The token only names the account; role and active flag are read from the store on every
/// request so demotions and deactivations apply immediately.
impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = claims_from_request(req);
        let store = req.app_data::<web::Data<dyn Store>>().cloned();

        Box::pin(async move {
            let claims = claims?;
            let Some(store) = store else {
                log::error!("Store missing from app data");
                return Err(AppError::Internal("Authentication unavailable".into()));
            };
            match store.get_user(claims.sub).await? {
                Some(user) if user.is_active => Ok(AuthUser::from(user)),
                Some(_) => Err(AppError::Unauthorized("Account is deactivated".into())),
                None => Err(AppError::Unauthorized("Session is invalid or expired".into())),
            }
        })
    }
}
