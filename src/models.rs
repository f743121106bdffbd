use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// ENUMS
// ============================================================================

/// Account role (also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSql, FromSql)]
#[postgres(name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Owner,
    Superadmin,
}

/// Subscription plan of a business (also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSql, FromSql)]
#[postgres(name = "subscription_tier", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Starter,
    Professional,
}

impl SubscriptionTier {
    /// Lifetime generation allowance; `None` means unlimited.
    pub fn generation_limit(self) -> Option<i32> {
        match self {
            SubscriptionTier::Free => Some(5),
            SubscriptionTier::Starter => Some(50),
            SubscriptionTier::Professional => None,
        }
    }
}

/// Whether a business may still generate (also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSql, FromSql)]
#[postgres(name = "usage_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    Active,
    LimitReached,
}

/// What a reassignment request asks for (also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSql, FromSql)]
#[postgres(name = "reassignment_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReassignmentKind {
    OwnershipTransfer,
    Restore,
}

/// Reassignment request lifecycle (also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSql, FromSql)]
#[postgres(name = "reassignment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReassignmentStatus {
    Pending,
    Approved,
    Completed,
    Rejected,
}

// ============================================================================
// USERS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_superadmin(&self) -> bool {
        self.role == UserRole::Superadmin
    }
}

/// Helper struct used when inserting a new user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// BUSINESSES
// ============================================================================

/// Field values captured when a business is archived, replayed on restore.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviousState {
    pub owner_id: Uuid,
    pub name: String,
    pub google_maps_url: String,
    pub normalized_google_maps_url: String,
    pub is_active: bool,
    pub subscription_tier: SubscriptionTier,
    pub generation_count: i32,
    pub usage_status: UsageStatus,
    pub archived_by: Uuid,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub google_maps_url: String,
    pub normalized_google_maps_url: String,
    pub subscription_tier: SubscriptionTier,
    pub generation_count: i32,
    pub usage_status: UsageStatus,
    pub is_active: bool,
    pub previous_state: Option<PreviousState>,
    pub archived_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Helper for creating new business
#[derive(Debug, Clone)]
pub struct NewBusiness {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub google_maps_url: String,
    pub normalized_google_maps_url: String,
    pub subscription_tier: SubscriptionTier,
    pub created_at: DateTime<Utc>,
}

/// Compact view of a business used in conflict payloads and duplicate reports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessSummary {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub google_maps_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Business> for BusinessSummary {
    fn from(business: &Business) -> Self {
        Self {
            id: business.id,
            name: business.name.clone(),
            owner_id: business.owner_id,
            google_maps_url: business.google_maps_url.clone(),
            is_active: business.is_active,
            created_at: business.created_at,
        }
    }
}

/// Filter for admin business listings
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct BusinessFilter {
    #[serde(default)]
    pub include_archived: bool,
    #[serde(default)]
    pub include_deleted: bool,
}

impl BusinessFilter {
    pub fn matches(&self, business: &Business) -> bool {
        if business.deleted_at.is_some() && !self.include_deleted {
            return false;
        }
        if business.archived_at.is_some() && !self.include_archived {
            return false;
        }
        true
    }
}

// ============================================================================
// REVIEW TEMPLATES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewTemplate {
    pub id: Uuid,
    pub business_id: Uuid,
    pub rating: i16,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A generated template before it is persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftTemplate {
    pub rating: i16,
    pub content: String,
}

// ============================================================================
// REASSIGNMENT & REACTIVATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignmentRequest {
    pub id: Uuid,
    pub business_id: Uuid,
    pub kind: ReassignmentKind,
    pub requested_by: Uuid,
    pub status: ReassignmentStatus,
    pub reason: Option<String>,
    pub resolved_by: Option<Uuid>,
    pub resolution_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessReactivation {
    pub id: Uuid,
    pub business_id: Uuid,
    pub reactivated_by: Uuid,
    pub generation_count: i32,
    pub previous_tier: SubscriptionTier,
    pub new_tier: SubscriptionTier,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// ACTIVITY LOGS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessActivityLog {
    pub id: Uuid,
    pub business_id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// REQUEST/RESPONSE DTOs
// ============================================================================

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_type: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            error_type: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_error_type(mut self, error_type: &'static str) -> Self {
        self.error_type = Some(error_type);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 2, max = 120))]
    pub name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Request to create a business
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBusinessRequest {
    #[validate(length(min = 2, max = 120))]
    pub name: String,
    #[validate(length(max = 120))]
    pub category: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(length(min = 1, max = 2048))]
    pub google_maps_url: String,
}

impl CreateBusinessRequest {
    pub fn into_new_business(self, owner_id: Uuid, normalized_google_maps_url: String) -> NewBusiness {
        NewBusiness {
            id: Uuid::new_v4(),
            owner_id,
            name: self.name,
            category: self.category,
            description: self.description,
            website: self.website,
            google_maps_url: self.google_maps_url.trim().to_string(),
            normalized_google_maps_url,
            subscription_tier: SubscriptionTier::Free,
            created_at: Utc::now(),
        }
    }
}

/// Request to update a business; absent fields are left untouched
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBusinessRequest {
    #[validate(length(min = 2, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 120))]
    pub category: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(length(min = 1, max = 2048))]
    pub google_maps_url: Option<String>,
}

impl UpdateBusinessRequest {
    /// Apply the non-URL fields; the URL goes through duplicate checks first.
    pub fn apply_to_existing(&self, existing: &mut Business) {
        if let Some(name) = &self.name {
            existing.name = name.clone();
        }
        if self.category.is_some() {
            existing.category = self.category.clone();
        }
        if self.description.is_some() {
            existing.description = self.description.clone();
        }
        if self.website.is_some() {
            existing.website = self.website.clone();
        }
        existing.updated_at = Utc::now();
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckUrlRequest {
    pub google_maps_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    pub tier: SubscriptionTier,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PreviewFeedbackRequest {
    #[validate(length(min = 2, max = 120))]
    pub business_name: String,
    #[validate(length(max = 120))]
    pub category: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReassignmentRequest {
    pub business_id: Option<Uuid>,
    pub google_maps_url: Option<String>,
    pub kind: ReassignmentKind,
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveReassignmentRequest {
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 2, max = 120))]
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ArchiveBusinessRequest {
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminReassignRequest {
    pub new_owner_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReassignmentQuery {
    pub status: Option<ReassignmentStatus>,
}

// ============================================================================
// COMPOSITE RESPONSE TYPES
// ============================================================================

/// Usage snapshot returned by the limit check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageReport {
    pub business_id: Uuid,
    pub tier: SubscriptionTier,
    pub generation_count: i32,
    pub limit: Option<i32>,
    pub remaining: Option<i32>,
    pub status: UsageStatus,
    pub can_generate: bool,
}

/// Templates produced by one generation plus the usage afterwards
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub templates: Vec<ReviewTemplate>,
    pub usage: UsageReport,
}

/// Outcome of the URL check endpoint
#[derive(Debug, Clone, Serialize)]
pub struct UrlCheckResult {
    pub normalized_google_maps_url: String,
    pub is_valid: bool,
    pub is_duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}
