use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{created, load_business, ok};
use crate::activity::log_business_activity;
use crate::auth::AuthUser;
use crate::database::Store;
use crate::error::AppError;
use crate::lifecycle::{pending_snapshot, state_of, BusinessState};
use crate::maps_url::NormalizedMapsUrl;
use crate::models::{
    Business, CreateReassignmentRequest, ReassignmentKind, ReassignmentRequest,
    ReassignmentStatus,
};

/// Find the business a request targets, by id or by Google Maps URL.
async fn resolve_target(
    store: &dyn Store,
    user: &AuthUser,
    body: &CreateReassignmentRequest,
) -> Result<Business, AppError> {
    if let Some(id) = body.business_id {
        return load_business(store, id).await;
    }
    let raw = body.google_maps_url.as_deref().ok_or_else(|| {
        AppError::Validation("Either business_id or google_maps_url is required".into())
    })?;
    let normalized = NormalizedMapsUrl::parse(raw)?;

    let found = match body.kind {
        ReassignmentKind::Restore => store
            .list_archived_for_previous_owner(user.id)
            .await?
            .into_iter()
            .find(|b| {
                pending_snapshot(b)
                    .is_some_and(|s| s.normalized_google_maps_url == normalized.as_str())
            }),
        ReassignmentKind::OwnershipTransfer => store
            .find_active_by_normalized_url(normalized.as_str())
            .await?
            .into_iter()
            .find(|b| b.owner_id != user.id),
    };
    found.ok_or(AppError::NotFound("Business"))
}

/// Check that the caller is entitled to ask for this kind of change on `business`.
fn check_eligibility(
    user: &AuthUser,
    kind: ReassignmentKind,
    business: &Business,
) -> Result<(), AppError> {
    match kind {
        ReassignmentKind::Restore => match pending_snapshot(business) {
            Some(snapshot) if snapshot.owner_id == user.id => Ok(()),
            Some(_) => Err(AppError::Forbidden),
            None => Err(AppError::Conflict("Business is not archived".into())),
        },
        ReassignmentKind::OwnershipTransfer => {
            if state_of(business) != BusinessState::Active {
                Err(AppError::Conflict("Business is not active".into()))
            } else if business.owner_id == user.id {
                Err(AppError::Conflict("You already own this business".into()))
            } else {
                Ok(())
            }
        }
    }
}

#[post("/reassignment-requests")]
pub async fn create_request(
    store: web::Data<dyn Store>,
    user: AuthUser,
    payload: web::Json<CreateReassignmentRequest>,
) -> Result<HttpResponse, AppError> {
    let body = payload.into_inner();
    body.validate()?;

    let business = resolve_target(store.get_ref(), &user, &body).await?;
    check_eligibility(&user, body.kind, &business)?;
    if store.find_pending_reassignment(business.id).await?.is_some() {
        return Err(AppError::Conflict(
            "A reassignment request is already pending for this business".into(),
        ));
    }

    let now = Utc::now();
    let request = store
        .create_reassignment(ReassignmentRequest {
            id: Uuid::new_v4(),
            business_id: business.id,
            kind: body.kind,
            requested_by: user.id,
            status: ReassignmentStatus::Pending,
            reason: body.reason,
            resolved_by: None,
            resolution_note: None,
            created_at: now,
            updated_at: now,
        })
        .await?;

    log::info!(
        "Reassignment request {} ({:?}) filed by {} for business {}",
        request.id,
        request.kind,
        user.id,
        business.id
    );
    log_business_activity(
        store.get_ref(),
        business.id,
        user.id,
        "reassignment_requested",
        json!({ "request_id": request.id, "kind": request.kind }),
    )
    .await;
    Ok(created(request))
}

#[get("/reassignment-requests")]
pub async fn list_my_requests(
    store: web::Data<dyn Store>,
    user: AuthUser,
) -> Result<HttpResponse, AppError> {
    Ok(ok(store.list_reassignments_for_user(user.id).await?))
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use chrono::Utc;
    use serde_json::json;

    use crate::database::Store;
    use crate::handlers::tests::{authed, body_json, test_app, TestState};
    use crate::lifecycle;
    use crate::models::UserRole;

    #[actix_web::test]
    async fn transfer_request_by_url_and_single_pending_rule() {
        let state = TestState::new();
        let (alice, _) = state.user("alice@example.com", UserRole::Owner).await;
        let (_, bob) = state.user("bob@example.com", UserRole::Owner).await;
        let business = state.business(alice.id, "https://maps.google.com/place/cafe").await;
        let app = test_app!(state);

        let request = || {
            authed(test::TestRequest::post().uri("/api/v1/reassignment-requests"), &bob)
                .set_json(json!({
                    "google_maps_url": "maps.google.com/place/CAFE/",
                    "kind": "ownership_transfer",
                    "reason": "I run this cafe"
                }))
                .to_request()
        };

        let resp = test::call_service(&app, request()).await;
        assert_eq!(resp.status(), 201);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["business_id"], business.id.to_string());
        assert_eq!(body["data"]["status"], "pending");

        let resp = test::call_service(&app, request()).await;
        assert_eq!(resp.status(), 409);

        let resp = test::call_service(
            &app,
            authed(test::TestRequest::get().uri("/api/v1/reassignment-requests"), &bob).to_request(),
        )
        .await;
        assert_eq!(body_json(resp).await["data"].as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn restore_request_requires_previous_ownership() {
        let state = TestState::new();
        let (alice, alice_token) = state.user("alice@example.com", UserRole::Owner).await;
        let (admin, _) = state.user("admin@example.com", UserRole::Superadmin).await;
        let (_, bob) = state.user("bob@example.com", UserRole::Owner).await;
        let mut business = state.business(alice.id, "https://maps.google.com/place/cafe").await;
        lifecycle::archive(&mut business, admin.id, None, Utc::now()).unwrap();
        state.memory.update_business(business.clone()).await.unwrap();
        let app = test_app!(state);

        let restore = |token: &str| {
            authed(test::TestRequest::post().uri("/api/v1/reassignment-requests"), token)
                .set_json(json!({ "business_id": business.id, "kind": "restore" }))
                .to_request()
        };

        let resp = test::call_service(&app, restore(&bob)).await;
        assert_eq!(resp.status(), 403);

        let resp = test::call_service(&app, restore(&alice_token)).await;
        assert_eq!(resp.status(), 201);
    }
}
