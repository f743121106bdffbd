//! Superadmin console: users, business lifecycle, plans, duplicates and reassignment review.
//!
//! Every handler starts with `require_superadmin` and records what it changed in the admin
//! activity log.

use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{ensure_url_available, load_business, ok};
use crate::activity::{log_admin_activity, log_business_activity};
use crate::auth::AuthUser;
use crate::cache::FeedbackCache;
use crate::database::Store;
use crate::duplicates::{self, DuplicateGroup, DuplicateResolution};
use crate::error::AppError;
use crate::lifecycle::{self, LifecycleError};
use crate::models::{
    ActivityQuery, AdminReassignRequest, AdminUpdateUserRequest, ArchiveBusinessRequest,
    Business, BusinessFilter, ChangePlanRequest, ReassignmentKind, ReassignmentQuery,
    ReassignmentRequest, ResolveReassignmentRequest, User,
};
use crate::usage;

const DEFAULT_LOG_PAGE: i64 = 50;
const MAX_LOG_PAGE: i64 = 200;

#[derive(Debug, Serialize)]
struct DuplicateReport {
    groups: Vec<DuplicateGroup>,
    plan: Vec<DuplicateResolution>,
}

#[derive(Debug, Serialize)]
struct DuplicateResolutionOutcome {
    plan: Vec<DuplicateResolution>,
    archived: Vec<Uuid>,
}

async fn load_user(store: &dyn Store, user_id: Uuid) -> Result<User, AppError> {
    store.get_user(user_id).await?.ok_or(AppError::NotFound("User"))
}

async fn load_request(store: &dyn Store, request_id: Uuid) -> Result<ReassignmentRequest, AppError> {
    store
        .get_reassignment(request_id)
        .await?
        .ok_or(AppError::NotFound("Reassignment request"))
}

/// Archive-state error for a business that has no snapshot to restore.
fn not_archived(business: &Business) -> AppError {
    LifecycleError::InvalidBusinessState {
        actual: lifecycle::state_of(business),
        expected: "archived",
    }
    .into()
}

/// Restore after re-checking that the snapshot's URL is still free for its owner.
async fn restore_checked(store: &dyn Store, business: &mut Business) -> Result<Uuid, AppError> {
    let snapshot = lifecycle::pending_snapshot(business)
        .cloned()
        .ok_or_else(|| not_archived(business))?;
    ensure_url_available(
        store,
        &snapshot.normalized_google_maps_url,
        Some(business.id),
        snapshot.owner_id,
    )
    .await?;
    lifecycle::restore(business, Utc::now())?;
    Ok(snapshot.owner_id)
}

/// Transfer after checking that the new owner exists and does not already hold the URL.
async fn transfer_checked(
    store: &dyn Store,
    business: &mut Business,
    new_owner_id: Uuid,
) -> Result<Uuid, AppError> {
    let new_owner = load_user(store, new_owner_id).await?;
    if !new_owner.is_active {
        return Err(AppError::Conflict("Target user is deactivated".into()));
    }
    ensure_url_available(
        store,
        &business.normalized_google_maps_url,
        Some(business.id),
        new_owner.id,
    )
    .await?;
    Ok(lifecycle::transfer_ownership(business, new_owner.id, Utc::now())?)
}

// ============================================================================
// USERS
// ============================================================================

#[get("/admin/users")]
pub async fn list_users(
    store: web::Data<dyn Store>,
    admin: AuthUser,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    Ok(ok(store.list_users().await?))
}

#[get("/admin/users/{user_id}")]
pub async fn get_user(
    store: web::Data<dyn Store>,
    admin: AuthUser,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let user = load_user(store.get_ref(), user_id.into_inner()).await?;
    let businesses = store.list_businesses_for_owner(user.id).await?;
    Ok(ok(json!({ "user": user, "businesses": businesses })))
}

#[put("/admin/users/{user_id}")]
pub async fn update_user(
    store: web::Data<dyn Store>,
    admin: AuthUser,
    user_id: web::Path<Uuid>,
    payload: web::Json<AdminUpdateUserRequest>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let body = payload.into_inner();
    body.validate()?;

    let mut user = load_user(store.get_ref(), user_id.into_inner()).await?;
    if user.id == admin.id && (body.role.is_some() || body.is_active == Some(false)) {
        return Err(AppError::Validation(
            "Admins cannot change their own role or deactivate themselves".into(),
        ));
    }
    if let Some(name) = &body.name {
        user.name = name.trim().to_string();
    }
    if let Some(role) = body.role {
        user.role = role;
    }
    if let Some(is_active) = body.is_active {
        user.is_active = is_active;
    }
    user.updated_at = Utc::now();

    let user = store.update_user(user).await?;
    log_admin_activity(
        store.get_ref(),
        admin.id,
        "user_updated",
        "user",
        Some(user.id),
        json!({ "name": body.name, "role": body.role, "is_active": body.is_active }),
    )
    .await;
    Ok(ok(user))
}

/// Deactivate an account. Login and existing sessions are refused from the next request on.
#[delete("/admin/users/{user_id}")]
pub async fn deactivate_user(
    store: web::Data<dyn Store>,
    admin: AuthUser,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let mut user = load_user(store.get_ref(), user_id.into_inner()).await?;
    if user.id == admin.id {
        return Err(AppError::Validation("Admins cannot deactivate themselves".into()));
    }
    user.is_active = false;
    user.updated_at = Utc::now();
    let user = store.update_user(user).await?;

    log::info!("User {} deactivated by {}", user.id, admin.id);
    log_admin_activity(store.get_ref(), admin.id, "user_deactivated", "user", Some(user.id), json!({}))
        .await;
    Ok(ok(user))
}

// ============================================================================
// BUSINESSES
// ============================================================================

#[get("/admin/businesses")]
pub async fn list_businesses(
    store: web::Data<dyn Store>,
    admin: AuthUser,
    filter: web::Query<BusinessFilter>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    Ok(ok(store.list_businesses(filter.into_inner()).await?))
}

#[put("/admin/businesses/{business_id}/subscription")]
pub async fn update_subscription(
    store: web::Data<dyn Store>,
    admin: AuthUser,
    business_id: web::Path<Uuid>,
    payload: web::Json<ChangePlanRequest>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let mut business = load_business(store.get_ref(), business_id.into_inner()).await?;
    lifecycle::ensure_active(&business)?;
    let previous_tier = business.subscription_tier;

    let reactivation = usage::change_tier(&mut business, payload.tier, admin.id, Utc::now());
    let business = store.update_business(business).await?;
    if let Some(record) = reactivation {
        store.create_reactivation(record).await?;
    }

    log_admin_activity(
        store.get_ref(),
        admin.id,
        "subscription_changed",
        "business",
        Some(business.id),
        json!({ "from": previous_tier, "to": business.subscription_tier }),
    )
    .await;
    Ok(ok(usage::report(&business)))
}

#[post("/admin/businesses/{business_id}/reset-usage")]
pub async fn reset_usage(
    store: web::Data<dyn Store>,
    admin: AuthUser,
    business_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let mut business = load_business(store.get_ref(), business_id.into_inner()).await?;
    lifecycle::ensure_active(&business)?;

    let record = usage::reset(&mut business, admin.id, Utc::now());
    let business = store.update_business(business).await?;
    store.create_reactivation(record.clone()).await?;

    log_admin_activity(
        store.get_ref(),
        admin.id,
        "usage_reset",
        "business",
        Some(business.id),
        json!({ "previous_generation_count": record.generation_count }),
    )
    .await;
    Ok(ok(usage::report(&business)))
}

#[post("/admin/businesses/{business_id}/archive")]
pub async fn archive_business(
    store: web::Data<dyn Store>,
    cache: web::Data<FeedbackCache>,
    admin: AuthUser,
    business_id: web::Path<Uuid>,
    payload: Option<web::Json<ArchiveBusinessRequest>>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let body = payload.map(web::Json::into_inner).unwrap_or_default();
    body.validate()?;

    let mut business = load_business(store.get_ref(), business_id.into_inner()).await?;
    let previous_owner = business.owner_id;
    lifecycle::archive(&mut business, admin.id, body.reason.clone(), Utc::now())?;
    let business = store.update_business(business).await?;
    cache.invalidate(&business.id).await;

    log::info!("Business {} archived by {}", business.id, admin.id);
    log_admin_activity(
        store.get_ref(),
        admin.id,
        "business_archived",
        "business",
        Some(business.id),
        json!({ "previous_owner_id": previous_owner, "reason": body.reason }),
    )
    .await;
    log_business_activity(store.get_ref(), business.id, admin.id, "archived", json!({})).await;
    Ok(ok(business))
}

#[post("/admin/businesses/{business_id}/restore")]
pub async fn restore_business(
    store: web::Data<dyn Store>,
    cache: web::Data<FeedbackCache>,
    admin: AuthUser,
    business_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let mut business = load_business(store.get_ref(), business_id.into_inner()).await?;
    let owner_id = restore_checked(store.get_ref(), &mut business).await?;
    let business = store.update_business(business).await?;
    cache.invalidate(&business.id).await;

    log::info!("Business {} restored to {} by {}", business.id, owner_id, admin.id);
    log_admin_activity(
        store.get_ref(),
        admin.id,
        "business_restored",
        "business",
        Some(business.id),
        json!({ "owner_id": owner_id }),
    )
    .await;
    log_business_activity(store.get_ref(), business.id, admin.id, "restored", json!({})).await;
    Ok(ok(business))
}

#[post("/admin/businesses/{business_id}/deactivate")]
pub async fn deactivate_business(
    store: web::Data<dyn Store>,
    cache: web::Data<FeedbackCache>,
    admin: AuthUser,
    business_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let mut business = load_business(store.get_ref(), business_id.into_inner()).await?;
    lifecycle::deactivate_permanently(&mut business, Utc::now())?;
    let business = store.update_business(business).await?;
    cache.invalidate(&business.id).await;

    log::info!("Business {} permanently deactivated by {}", business.id, admin.id);
    log_admin_activity(
        store.get_ref(),
        admin.id,
        "business_deactivated",
        "business",
        Some(business.id),
        json!({}),
    )
    .await;
    Ok(ok(business))
}

#[post("/admin/businesses/{business_id}/reassign")]
pub async fn reassign_business(
    store: web::Data<dyn Store>,
    admin: AuthUser,
    business_id: web::Path<Uuid>,
    payload: web::Json<AdminReassignRequest>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let mut business = load_business(store.get_ref(), business_id.into_inner()).await?;
    let previous_owner = transfer_checked(store.get_ref(), &mut business, payload.new_owner_id).await?;
    let business = store.update_business(business).await?;

    log::info!(
        "Business {} reassigned from {} to {} by {}",
        business.id,
        previous_owner,
        business.owner_id,
        admin.id
    );
    log_admin_activity(
        store.get_ref(),
        admin.id,
        "business_reassigned",
        "business",
        Some(business.id),
        json!({ "from": previous_owner, "to": business.owner_id }),
    )
    .await;
    Ok(ok(business))
}

// ============================================================================
// DUPLICATES
// ============================================================================

#[get("/admin/duplicates")]
pub async fn list_duplicates(
    store: web::Data<dyn Store>,
    admin: AuthUser,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let groups = duplicates::find_duplicate_groups(&store.list_active_businesses().await?);
    let plan = duplicates::plan_resolution(&groups);
    Ok(ok(DuplicateReport { groups, plan }))
}

/// Apply the keep-oldest plan: newer members are archived to the calling admin.
#[post("/admin/duplicates/resolve")]
pub async fn resolve_duplicates(
    store: web::Data<dyn Store>,
    cache: web::Data<FeedbackCache>,
    admin: AuthUser,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let groups = duplicates::find_duplicate_groups(&store.list_active_businesses().await?);
    let plan = duplicates::plan_resolution(&groups);
    let archived = duplicates::apply_resolution(store.get_ref(), &plan, admin.id).await?;
    for id in &archived {
        cache.invalidate(id).await;
    }

    log_admin_activity(
        store.get_ref(),
        admin.id,
        "duplicates_resolved",
        "business",
        None,
        json!({ "groups": plan.len(), "archived": archived }),
    )
    .await;
    Ok(ok(DuplicateResolutionOutcome { plan, archived }))
}

// ============================================================================
// REASSIGNMENT REVIEW
// ============================================================================

#[get("/admin/reassignments")]
pub async fn list_reassignments(
    store: web::Data<dyn Store>,
    admin: AuthUser,
    query: web::Query<ReassignmentQuery>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    Ok(ok(store.list_reassignments(query.status).await?))
}

/// Approve and carry out a request. A duplicate collision leaves both the business and the
/// request untouched.
#[post("/admin/reassignments/{request_id}/approve")]
pub async fn approve_reassignment(
    store: web::Data<dyn Store>,
    cache: web::Data<FeedbackCache>,
    admin: AuthUser,
    request_id: web::Path<Uuid>,
    payload: Option<web::Json<ResolveReassignmentRequest>>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let note = payload.and_then(|p| p.into_inner().note);
    let mut request = load_request(store.get_ref(), request_id.into_inner()).await?;
    let now = Utc::now();
    request.approve(admin.id, note, now)?;

    let mut business = load_business(store.get_ref(), request.business_id).await?;
    match request.kind {
        ReassignmentKind::Restore => {
            let owner = lifecycle::pending_snapshot(&business)
                .map(|s| s.owner_id)
                .ok_or_else(|| not_archived(&business))?;
            if owner != request.requested_by {
                return Err(AppError::Conflict(
                    "Business was not archived from the requesting user".into(),
                ));
            }
            restore_checked(store.get_ref(), &mut business).await?;
        }
        ReassignmentKind::OwnershipTransfer => {
            lifecycle::ensure_active(&business)?;
            transfer_checked(store.get_ref(), &mut business, request.requested_by).await?;
        }
    }

    let business = store.update_business(business).await?;
    cache.invalidate(&business.id).await;
    request.complete(admin.id, now)?;
    let request = store.update_reassignment(request).await?;

    log::info!("Reassignment request {} approved by {}", request.id, admin.id);
    log_admin_activity(
        store.get_ref(),
        admin.id,
        "reassignment_approved",
        "reassignment_request",
        Some(request.id),
        json!({ "business_id": business.id, "kind": request.kind, "owner_id": business.owner_id }),
    )
    .await;
    log_business_activity(
        store.get_ref(),
        business.id,
        admin.id,
        "reassignment_completed",
        json!({ "request_id": request.id }),
    )
    .await;
    Ok(ok(request))
}

#[post("/admin/reassignments/{request_id}/reject")]
pub async fn reject_reassignment(
    store: web::Data<dyn Store>,
    admin: AuthUser,
    request_id: web::Path<Uuid>,
    payload: Option<web::Json<ResolveReassignmentRequest>>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let note = payload.and_then(|p| p.into_inner().note);
    let mut request = load_request(store.get_ref(), request_id.into_inner()).await?;
    request.reject(admin.id, note, Utc::now())?;
    let request = store.update_reassignment(request).await?;

    log_admin_activity(
        store.get_ref(),
        admin.id,
        "reassignment_rejected",
        "reassignment_request",
        Some(request.id),
        json!({ "business_id": request.business_id }),
    )
    .await;
    Ok(ok(request))
}

// ============================================================================
// ACTIVITY LOG
// ============================================================================

#[get("/admin/activity-logs")]
pub async fn list_activity_logs(
    store: web::Data<dyn Store>,
    admin: AuthUser,
    query: web::Query<ActivityQuery>,
) -> Result<HttpResponse, AppError> {
    admin.require_superadmin()?;
    let limit = query.limit.unwrap_or(DEFAULT_LOG_PAGE).clamp(1, MAX_LOG_PAGE);
    let offset = query.offset.unwrap_or(0).max(0);
    Ok(ok(store.list_activity_logs(limit, offset).await?))
}
