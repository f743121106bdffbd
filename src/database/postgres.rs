use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use postgres_types::Json;
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::{
    ActivityLog, Business, BusinessActivityLog, BusinessFilter, BusinessReactivation,
    DraftTemplate, NewBusiness, NewUser, PreviousState, ReassignmentRequest, ReassignmentStatus,
    ReviewTemplate, User,
};

pub type DbPool = Pool;

const USER_COLUMNS: &str =
    "id, email, name, password_hash, role, is_active, created_at, updated_at";

const BUSINESS_COLUMNS: &str = "id, owner_id, name, category, description, website, google_maps_url, normalized_google_maps_url, subscription_tier, generation_count, usage_status, is_active, previous_state, archived_at, deleted_at, created_at, updated_at";

const REASSIGNMENT_COLUMNS: &str = "id, business_id, kind, requested_by, status, reason, resolved_by, resolution_note, created_at, updated_at";

pub struct DatabaseService {
    pool: DbPool,
}

impl DatabaseService {
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let mut cfg = Config::new();
        cfg.url = Some(database_url.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|err| StoreError::Config(err.to_string()))?;
        let client = pool.get().await?;
        client.execute("SELECT 1", &[]).await?;

        log::info!("Database connection established");
        Ok(Self { pool })
    }

    pub async fn get_client(&self) -> StoreResult<deadpool_postgres::Client> {
        Ok(self.pool.get().await?)
    }

    async fn query_businesses(
        &self,
        where_clause: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> StoreResult<Vec<Business>> {
        let client = self.get_client().await?;
        let sql = format!(
            "SELECT {BUSINESS_COLUMNS} FROM businesses {where_clause} ORDER BY created_at ASC, id ASC"
        );
        let rows = client.query(sql.as_str(), params).await?;
        Ok(rows.iter().map(row_to_business).collect())
    }
}

#[async_trait]
impl Store for DatabaseService {
    // ========================================================================
    // USERS
    // ========================================================================

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let client = self.get_client().await?;
        let row = client
            .query_one(
                &*format!(
                    "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {USER_COLUMNS}"
                ),
                &[
                    &user.id,
                    &user.email,
                    &user.name,
                    &user.password_hash,
                    &user.role,
                    &user.is_active,
                    &user.created_at,
                    &user.updated_at,
                ],
            )
            .await?;

        Ok(row_to_user(&row))
    }

    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &*format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"),
                &[&user_id],
            )
            .await?;

        Ok(row.map(|r| row_to_user(&r)))
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &*format!("SELECT {USER_COLUMNS} FROM users WHERE email = lower($1)"),
                &[&email],
            )
            .await?;

        Ok(row.map(|r| row_to_user(&r)))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let client = self.get_client().await?;
        let rows = client
            .query(
                &*format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"),
                &[],
            )
            .await?;

        Ok(rows.iter().map(row_to_user).collect())
    }

    async fn update_user(&self, user: User) -> StoreResult<User> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &*format!(
                    "UPDATE users SET name = $2, role = $3, is_active = $4, password_hash = $5, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
                ),
                &[&user.id, &user.name, &user.role, &user.is_active, &user.password_hash],
            )
            .await?;

        row.map(|r| row_to_user(&r))
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user.id)))
    }

    // ========================================================================
    // BUSINESSES
    // ========================================================================

    async fn create_business(&self, business: NewBusiness) -> StoreResult<Business> {
        let client = self.get_client().await?;
        let row = client
            .query_one(
                &*format!(
                    "INSERT INTO businesses (id, owner_id, name, category, description, website, google_maps_url, normalized_google_maps_url, subscription_tier, generation_count, usage_status, is_active, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, 'active', TRUE, $10, $10) RETURNING {BUSINESS_COLUMNS}"
                ),
                &[
                    &business.id,
                    &business.owner_id,
                    &business.name,
                    &business.category,
                    &business.description,
                    &business.website,
                    &business.google_maps_url,
                    &business.normalized_google_maps_url,
                    &business.subscription_tier,
                    &business.created_at,
                ],
            )
            .await?;

        Ok(row_to_business(&row))
    }

    async fn get_business(&self, business_id: Uuid) -> StoreResult<Option<Business>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &*format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = $1"),
                &[&business_id],
            )
            .await?;

        Ok(row.map(|r| row_to_business(&r)))
    }

    async fn list_businesses_for_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Business>> {
        self.query_businesses("WHERE owner_id = $1 AND deleted_at IS NULL", &[&owner_id])
            .await
    }

    async fn list_businesses(&self, filter: BusinessFilter) -> StoreResult<Vec<Business>> {
        self.query_businesses(
            "WHERE ($1 OR deleted_at IS NULL) AND ($2 OR archived_at IS NULL)",
            &[&filter.include_deleted, &filter.include_archived],
        )
        .await
    }

    async fn list_active_businesses(&self) -> StoreResult<Vec<Business>> {
        self.query_businesses("WHERE is_active = TRUE AND deleted_at IS NULL", &[])
            .await
    }

    async fn find_active_by_normalized_url(&self, normalized: &str) -> StoreResult<Vec<Business>> {
        self.query_businesses(
            "WHERE normalized_google_maps_url = $1 AND is_active = TRUE AND deleted_at IS NULL",
            &[&normalized],
        )
        .await
    }

    async fn list_archived_for_previous_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Business>> {
        let owner = owner_id.to_string();
        self.query_businesses(
            "WHERE archived_at IS NOT NULL AND deleted_at IS NULL AND previous_state->>'owner_id' = $1",
            &[&owner],
        )
        .await
    }

    async fn update_business(&self, business: Business) -> StoreResult<Business> {
        let client = self.get_client().await?;
        let previous_state = business.previous_state.as_ref().map(Json);
        let row = client
            .query_opt(
                &*format!(
                    "UPDATE businesses SET owner_id = $2, name = $3, category = $4, description = $5, website = $6, google_maps_url = $7, normalized_google_maps_url = $8, subscription_tier = $9, generation_count = $10, usage_status = $11, is_active = $12, previous_state = $13, archived_at = $14, deleted_at = $15, updated_at = NOW() WHERE id = $1 RETURNING {BUSINESS_COLUMNS}"
                ),
                &[
                    &business.id,
                    &business.owner_id,
                    &business.name,
                    &business.category,
                    &business.description,
                    &business.website,
                    &business.google_maps_url,
                    &business.normalized_google_maps_url,
                    &business.subscription_tier,
                    &business.generation_count,
                    &business.usage_status,
                    &business.is_active,
                    &previous_state,
                    &business.archived_at,
                    &business.deleted_at,
                ],
            )
            .await?;

        row.map(|r| row_to_business(&r))
            .ok_or_else(|| StoreError::NotFound(format!("business {}", business.id)))
    }

    // ========================================================================
    // REVIEW TEMPLATES
    // ========================================================================

    async fn insert_templates(
        &self,
        business_id: Uuid,
        drafts: Vec<DraftTemplate>,
    ) -> StoreResult<Vec<ReviewTemplate>> {
        let mut client = self.get_client().await?;
        let tx = client.transaction().await?;

        let mut stored = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let row = tx
                .query_one(
                    "INSERT INTO review_templates (id, business_id, rating, content) VALUES ($1, $2, $3, $4) RETURNING id, business_id, rating, content, created_at",
                    &[&Uuid::new_v4(), &business_id, &draft.rating, &draft.content],
                )
                .await?;
            stored.push(row_to_review_template(&row));
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn list_templates(&self, business_id: Uuid, limit: i64) -> StoreResult<Vec<ReviewTemplate>> {
        let client = self.get_client().await?;
        let rows = client
            .query(
                "SELECT id, business_id, rating, content, created_at FROM review_templates WHERE business_id = $1 ORDER BY created_at DESC, rating DESC LIMIT $2",
                &[&business_id, &limit],
            )
            .await?;

        Ok(rows.iter().map(row_to_review_template).collect())
    }

    // ========================================================================
    // REASSIGNMENT REQUESTS
    // ========================================================================

    async fn create_reassignment(
        &self,
        request: ReassignmentRequest,
    ) -> StoreResult<ReassignmentRequest> {
        let client = self.get_client().await?;
        let row = client
            .query_one(
                &*format!(
                    "INSERT INTO reassignment_requests ({REASSIGNMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {REASSIGNMENT_COLUMNS}"
                ),
                &[
                    &request.id,
                    &request.business_id,
                    &request.kind,
                    &request.requested_by,
                    &request.status,
                    &request.reason,
                    &request.resolved_by,
                    &request.resolution_note,
                    &request.created_at,
                    &request.updated_at,
                ],
            )
            .await?;

        Ok(row_to_reassignment(&row))
    }

    async fn get_reassignment(&self, request_id: Uuid) -> StoreResult<Option<ReassignmentRequest>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &*format!("SELECT {REASSIGNMENT_COLUMNS} FROM reassignment_requests WHERE id = $1"),
                &[&request_id],
            )
            .await?;

        Ok(row.map(|r| row_to_reassignment(&r)))
    }

    async fn list_reassignments(
        &self,
        status: Option<ReassignmentStatus>,
    ) -> StoreResult<Vec<ReassignmentRequest>> {
        let client = self.get_client().await?;
        let rows = match status {
            Some(status) => {
                client
                    .query(
                        &*format!("SELECT {REASSIGNMENT_COLUMNS} FROM reassignment_requests WHERE status = $1 ORDER BY created_at ASC"),
                        &[&status],
                    )
                    .await?
            }
            None => {
                client
                    .query(
                        &*format!("SELECT {REASSIGNMENT_COLUMNS} FROM reassignment_requests ORDER BY created_at ASC"),
                        &[],
                    )
                    .await?
            }
        };

        Ok(rows.iter().map(row_to_reassignment).collect())
    }

    async fn list_reassignments_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ReassignmentRequest>> {
        let client = self.get_client().await?;
        let rows = client
            .query(
                &*format!("SELECT {REASSIGNMENT_COLUMNS} FROM reassignment_requests WHERE requested_by = $1 ORDER BY created_at DESC"),
                &[&user_id],
            )
            .await?;

        Ok(rows.iter().map(row_to_reassignment).collect())
    }

    async fn find_pending_reassignment(
        &self,
        business_id: Uuid,
    ) -> StoreResult<Option<ReassignmentRequest>> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &*format!("SELECT {REASSIGNMENT_COLUMNS} FROM reassignment_requests WHERE business_id = $1 AND status = 'pending' ORDER BY created_at ASC LIMIT 1"),
                &[&business_id],
            )
            .await?;

        Ok(row.map(|r| row_to_reassignment(&r)))
    }

    async fn update_reassignment(
        &self,
        request: ReassignmentRequest,
    ) -> StoreResult<ReassignmentRequest> {
        let client = self.get_client().await?;
        let row = client
            .query_opt(
                &*format!(
                    "UPDATE reassignment_requests SET status = $2, resolved_by = $3, resolution_note = $4, updated_at = $5 WHERE id = $1 RETURNING {REASSIGNMENT_COLUMNS}"
                ),
                &[
                    &request.id,
                    &request.status,
                    &request.resolved_by,
                    &request.resolution_note,
                    &request.updated_at,
                ],
            )
            .await?;

        row.map(|r| row_to_reassignment(&r))
            .ok_or_else(|| StoreError::NotFound(format!("reassignment request {}", request.id)))
    }

    // ========================================================================
    // REACTIVATIONS
    // ========================================================================

    async fn create_reactivation(
        &self,
        record: BusinessReactivation,
    ) -> StoreResult<BusinessReactivation> {
        let client = self.get_client().await?;
        let row = client
            .query_one(
                "INSERT INTO business_reactivations (id, business_id, reactivated_by, generation_count, previous_tier, new_tier, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id, business_id, reactivated_by, generation_count, previous_tier, new_tier, created_at",
                &[
                    &record.id,
                    &record.business_id,
                    &record.reactivated_by,
                    &record.generation_count,
                    &record.previous_tier,
                    &record.new_tier,
                    &record.created_at,
                ],
            )
            .await?;

        Ok(row_to_reactivation(&row))
    }

    async fn list_reactivations(&self, business_id: Uuid) -> StoreResult<Vec<BusinessReactivation>> {
        let client = self.get_client().await?;
        let rows = client
            .query(
                "SELECT id, business_id, reactivated_by, generation_count, previous_tier, new_tier, created_at FROM business_reactivations WHERE business_id = $1 ORDER BY created_at DESC",
                &[&business_id],
            )
            .await?;

        Ok(rows.iter().map(row_to_reactivation).collect())
    }

    // ========================================================================
    // ACTIVITY LOGS
    // ========================================================================

    async fn insert_activity_log(&self, entry: ActivityLog) -> StoreResult<()> {
        let client = self.get_client().await?;
        client
            .execute(
                "INSERT INTO activity_logs (id, admin_id, action, entity_type, entity_id, details, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[
                    &entry.id,
                    &entry.admin_id,
                    &entry.action,
                    &entry.entity_type,
                    &entry.entity_id,
                    &entry.details,
                    &entry.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn list_activity_logs(&self, limit: i64, offset: i64) -> StoreResult<Vec<ActivityLog>> {
        let client = self.get_client().await?;
        let rows = client
            .query(
                "SELECT id, admin_id, action, entity_type, entity_id, details, created_at FROM activity_logs ORDER BY created_at DESC LIMIT $1 OFFSET $2",
                &[&limit, &offset],
            )
            .await?;

        Ok(rows.iter().map(row_to_activity_log).collect())
    }

    async fn insert_business_activity(&self, entry: BusinessActivityLog) -> StoreResult<()> {
        let client = self.get_client().await?;
        client
            .execute(
                "INSERT INTO business_activity_logs (id, business_id, user_id, action, details, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &entry.id,
                    &entry.business_id,
                    &entry.user_id,
                    &entry.action,
                    &entry.details,
                    &entry.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn list_business_activity(
        &self,
        business_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<BusinessActivityLog>> {
        let client = self.get_client().await?;
        let rows = client
            .query(
                "SELECT id, business_id, user_id, action, details, created_at FROM business_activity_logs WHERE business_id = $1 ORDER BY created_at DESC LIMIT $2",
                &[&business_id, &limit],
            )
            .await?;

        Ok(rows.iter().map(row_to_business_activity).collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        let client = self.get_client().await?;
        client.execute("SELECT 1", &[]).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

// Row mapping functions
fn row_to_user(row: &Row) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_business(row: &Row) -> Business {
    let previous_state: Option<Json<PreviousState>> = row.get("previous_state");
    Business {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        category: row.get("category"),
        description: row.get("description"),
        website: row.get("website"),
        google_maps_url: row.get("google_maps_url"),
        normalized_google_maps_url: row.get("normalized_google_maps_url"),
        subscription_tier: row.get("subscription_tier"),
        generation_count: row.get("generation_count"),
        usage_status: row.get("usage_status"),
        is_active: row.get("is_active"),
        previous_state: previous_state.map(|Json(state)| state),
        archived_at: row.get("archived_at"),
        deleted_at: row.get("deleted_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_review_template(row: &Row) -> ReviewTemplate {
    ReviewTemplate {
        id: row.get("id"),
        business_id: row.get("business_id"),
        rating: row.get("rating"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

fn row_to_reassignment(row: &Row) -> ReassignmentRequest {
    ReassignmentRequest {
        id: row.get("id"),
        business_id: row.get("business_id"),
        kind: row.get("kind"),
        requested_by: row.get("requested_by"),
        status: row.get("status"),
        reason: row.get("reason"),
        resolved_by: row.get("resolved_by"),
        resolution_note: row.get("resolution_note"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_reactivation(row: &Row) -> BusinessReactivation {
    BusinessReactivation {
        id: row.get("id"),
        business_id: row.get("business_id"),
        reactivated_by: row.get("reactivated_by"),
        generation_count: row.get("generation_count"),
        previous_tier: row.get("previous_tier"),
        new_tier: row.get("new_tier"),
        created_at: row.get("created_at"),
    }
}

fn row_to_activity_log(row: &Row) -> ActivityLog {
    ActivityLog {
        id: row.get("id"),
        admin_id: row.get("admin_id"),
        action: row.get("action"),
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        details: row.get("details"),
        created_at: row.get("created_at"),
    }
}

fn row_to_business_activity(row: &Row) -> BusinessActivityLog {
    BusinessActivityLog {
        id: row.get("id"),
        business_id: row.get("business_id"),
        user_id: row.get("user_id"),
        action: row.get("action"),
        details: row.get("details"),
        created_at: row.get("created_at"),
    }
}
