use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::auth::AuthError;
use crate::clients::ClientError;
use crate::database::StoreError;
use crate::duplicates::DuplicateConflict;
use crate::lifecycle::LifecycleError;
use crate::maps_url::MapsUrlError;
use crate::models::ApiResponse;
use crate::usage::UsageError;

pub const INVALID_GOOGLE_MAPS_URL: &str = "INVALID_GOOGLE_MAPS_URL";
pub const INVALID_STATE: &str = "INVALID_STATE";

/// Error returned by every handler; rendered as the `{ success: false, error }` envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    InvalidMapsUrl(#[from] MapsUrlError),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Forbidden")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{}", .0.message())]
    Duplicate(Box<DuplicateConflict>),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    InvalidState(#[from] LifecycleError),
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error("Upstream service failed: {0}")]
    Upstream(#[from] ClientError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl From<DuplicateConflict> for AppError {
    fn from(conflict: DuplicateConflict) -> Self {
        AppError::Duplicate(Box::new(conflict))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("Validation failed: {errors}"))
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::WeakPassword => AppError::Validation(err.to_string()),
            AuthError::TokenExpired | AuthError::InvalidToken(_) => {
                AppError::Unauthorized(err.to_string())
            }
            AuthError::Hashing(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidMapsUrl(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Duplicate(_) | AppError::Conflict(_) | AppError::InvalidState(_) => {
                StatusCode::CONFLICT
            }
            AppError::Usage(UsageError::LimitReached { .. }) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Usage(UsageError::Inactive) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            AppError::Duplicate(conflict) => ApiResponse::<()>::error(conflict.message())
                .with_error_type(conflict.error_type())
                .with_details(conflict.details()),
            AppError::InvalidMapsUrl(_) => ApiResponse::<()>::error(self.to_string())
                .with_error_type(INVALID_GOOGLE_MAPS_URL),
            AppError::Usage(err) => {
                ApiResponse::<()>::error(err.to_string()).with_error_type(err.error_type())
            }
            AppError::InvalidState(_) => {
                ApiResponse::<()>::error(self.to_string()).with_error_type(INVALID_STATE)
            }
            AppError::Store(StoreError::NotFound(_)) => {
                ApiResponse::<()>::error("Resource not found".into())
            }
            AppError::Store(StoreError::Conflict(_)) => {
                ApiResponse::<()>::error("Resource already exists".into())
            }
            AppError::Store(err) => {
                log::error!("Store failure: {err:?}");
                ApiResponse::<()>::error("Internal server error".into())
            }
            AppError::Upstream(err) => {
                log::error!("Upstream failure: {err:?}");
                ApiResponse::<()>::error("Upstream service failed".into())
            }
            AppError::Internal(message) => {
                log::error!("Internal error: {message}");
                ApiResponse::<()>::error("Internal server error".into())
            }
            _ => ApiResponse::<()>::error(self.to_string()),
        };
        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::{ConflictKind, DUPLICATE_GOOGLE_MAPS_URL_OWN};
    use crate::models::{BusinessSummary, SubscriptionTier};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn maps_errors_to_status_codes() {
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("Business").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(MapsUrlError::Empty).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(UsageError::LimitReached {
                tier: SubscriptionTier::Free,
                limit: 5
            })
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::from(StoreError::Config("x".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn duplicate_response_carries_error_type_and_details() {
        let conflict = DuplicateConflict {
            kind: ConflictKind::Own,
            existing: BusinessSummary {
                id: Uuid::new_v4(),
                name: "Cafe".into(),
                owner_id: Uuid::new_v4(),
                google_maps_url: "https://maps.google.com/place/cafe".into(),
                is_active: true,
                created_at: Utc::now(),
            },
            normalized_google_maps_url: "maps.google.com/place/cafe".into(),
        };
        let response = AppError::from(conflict).error_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error_type"], DUPLICATE_GOOGLE_MAPS_URL_OWN);
        assert!(body["details"]["resolution_hints"].is_array());
    }
}
