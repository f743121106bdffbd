//! Persistence boundary.
//!
//! Handlers talk to a [`Store`]; [`postgres::DatabaseService`] is the production backend and
//! [`memory::MemoryStore`] backs local runs without `DATABASE_URL` and the test suite.

use async_trait::async_trait;
use thiserror::Error;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

use crate::models::{
    ActivityLog, Business, BusinessActivityLog, BusinessFilter, BusinessReactivation,
    DraftTemplate, NewBusiness, NewUser, ReassignmentRequest, ReassignmentStatus, ReviewTemplate,
    User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::DatabaseService;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database configuration error: {0}")]
    Config(String),
    #[error("database pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("database error: {0}")]
    Postgres(tokio_postgres::Error),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            let detail = err
                .as_db_error()
                .and_then(|db| db.detail().map(str::to_string))
                .unwrap_or_else(|| "unique constraint violated".to_string());
            StoreError::Conflict(detail)
        } else {
            StoreError::Postgres(err)
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn update_user(&self, user: User) -> StoreResult<User>;

    // Businesses
    async fn create_business(&self, business: NewBusiness) -> StoreResult<Business>;
    async fn get_business(&self, business_id: Uuid) -> StoreResult<Option<Business>>;
    /// Non-deleted businesses currently owned by `owner_id`.
    async fn list_businesses_for_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Business>>;
    async fn list_businesses(&self, filter: BusinessFilter) -> StoreResult<Vec<Business>>;
    async fn list_active_businesses(&self) -> StoreResult<Vec<Business>>;
    async fn find_active_by_normalized_url(&self, normalized: &str)
        -> StoreResult<Vec<Business>>;
    /// Archived businesses whose snapshot names `owner_id` as the owner before archival.
    async fn list_archived_for_previous_owner(&self, owner_id: Uuid)
        -> StoreResult<Vec<Business>>;
    async fn update_business(&self, business: Business) -> StoreResult<Business>;

    // Review templates
    async fn insert_templates(
        &self,
        business_id: Uuid,
        drafts: Vec<DraftTemplate>,
    ) -> StoreResult<Vec<ReviewTemplate>>;
    async fn list_templates(&self, business_id: Uuid, limit: i64)
        -> StoreResult<Vec<ReviewTemplate>>;

    // Reassignment requests
    async fn create_reassignment(
        &self,
        request: ReassignmentRequest,
    ) -> StoreResult<ReassignmentRequest>;
    async fn get_reassignment(&self, request_id: Uuid)
        -> StoreResult<Option<ReassignmentRequest>>;
    async fn list_reassignments(
        &self,
        status: Option<ReassignmentStatus>,
    ) -> StoreResult<Vec<ReassignmentRequest>>;
    async fn list_reassignments_for_user(&self, user_id: Uuid)
        -> StoreResult<Vec<ReassignmentRequest>>;
    async fn find_pending_reassignment(
        &self,
        business_id: Uuid,
    ) -> StoreResult<Option<ReassignmentRequest>>;
    async fn update_reassignment(
        &self,
        request: ReassignmentRequest,
    ) -> StoreResult<ReassignmentRequest>;

    // Reactivations
    async fn create_reactivation(
        &self,
        record: BusinessReactivation,
    ) -> StoreResult<BusinessReactivation>;
    async fn list_reactivations(&self, business_id: Uuid)
        -> StoreResult<Vec<BusinessReactivation>>;

    // Audit trails
    async fn insert_activity_log(&self, entry: ActivityLog) -> StoreResult<()>;
    async fn list_activity_logs(&self, limit: i64, offset: i64) -> StoreResult<Vec<ActivityLog>>;
    async fn insert_business_activity(&self, entry: BusinessActivityLog) -> StoreResult<()>;
    async fn list_business_activity(
        &self,
        business_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<BusinessActivityLog>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
