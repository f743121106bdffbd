//! In-memory implementation of [`Store`].
//!
//! Not durable: all state is lost on restart. Used when no `DATABASE_URL` is configured and
//! by the test suite. Each collection sits behind its own `tokio::sync::RwLock`, so the same
//! "no multi-step transactions" semantics as the Postgres backend apply.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::{
    ActivityLog, Business, BusinessActivityLog, BusinessFilter, BusinessReactivation,
    DraftTemplate, NewBusiness, NewUser, ReassignmentRequest, ReassignmentStatus, ReviewTemplate,
    UsageStatus, User,
};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    businesses: RwLock<HashMap<Uuid, Business>>,
    templates: RwLock<Vec<ReviewTemplate>>,
    reassignments: RwLock<HashMap<Uuid, ReassignmentRequest>>,
    reactivations: RwLock<Vec<BusinessReactivation>>,
    activity_logs: RwLock<Vec<ActivityLog>>,
    business_activity: RwLock<Vec<BusinessActivityLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn select_businesses(&self, predicate: impl Fn(&Business) -> bool) -> Vec<Business> {
        let guard = self.businesses.read().await;
        let mut selected: Vec<Business> = guard.values().filter(|b| predicate(b)).cloned().collect();
        selected.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        selected
    }
}

fn page<T: Clone>(items: &[T], limit: i64, offset: i64) -> Vec<T> {
    let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
    items.iter().skip(offset).take(limit).cloned().collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut guard = self.users.write().await;
        let email = user.email.to_lowercase();
        if guard.values().any(|existing| existing.email == email) {
            return Err(StoreError::Conflict(format!("Key (email)=({email}) already exists.")));
        }
        let record = User {
            id: user.id,
            email,
            name: user.name,
            password_hash: user.password_hash,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        };
        guard.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|user| user.created_at);
        Ok(users)
    }

    async fn update_user(&self, mut user: User) -> StoreResult<User> {
        let mut guard = self.users.write().await;
        let existing = guard
            .get_mut(&user.id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user.id)))?;
        user.email = existing.email.clone();
        user.created_at = existing.created_at;
        user.updated_at = Utc::now();
        *existing = user.clone();
        Ok(user)
    }

    async fn create_business(&self, business: NewBusiness) -> StoreResult<Business> {
        let record = Business {
            id: business.id,
            owner_id: business.owner_id,
            name: business.name,
            category: business.category,
            description: business.description,
            website: business.website,
            google_maps_url: business.google_maps_url,
            normalized_google_maps_url: business.normalized_google_maps_url,
            subscription_tier: business.subscription_tier,
            generation_count: 0,
            usage_status: UsageStatus::Active,
            is_active: true,
            previous_state: None,
            archived_at: None,
            deleted_at: None,
            created_at: business.created_at,
            updated_at: business.created_at,
        };
        let mut guard = self.businesses.write().await;
        if guard.contains_key(&record.id) {
            return Err(StoreError::Conflict(format!("business {}", record.id)));
        }
        guard.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_business(&self, business_id: Uuid) -> StoreResult<Option<Business>> {
        Ok(self.businesses.read().await.get(&business_id).cloned())
    }

    async fn list_businesses_for_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Business>> {
        Ok(self
            .select_businesses(|b| b.owner_id == owner_id && b.deleted_at.is_none())
            .await)
    }

    async fn list_businesses(&self, filter: BusinessFilter) -> StoreResult<Vec<Business>> {
        Ok(self.select_businesses(|b| filter.matches(b)).await)
    }

    async fn list_active_businesses(&self) -> StoreResult<Vec<Business>> {
        Ok(self
            .select_businesses(|b| b.is_active && b.deleted_at.is_none())
            .await)
    }

    async fn find_active_by_normalized_url(&self, normalized: &str) -> StoreResult<Vec<Business>> {
        Ok(self
            .select_businesses(|b| {
                b.is_active && b.deleted_at.is_none() && b.normalized_google_maps_url == normalized
            })
            .await)
    }

    async fn list_archived_for_previous_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Business>> {
        Ok(self
            .select_businesses(|b| {
                b.archived_at.is_some()
                    && b.deleted_at.is_none()
                    && b
                        .previous_state
                        .as_ref()
                        .is_some_and(|state| state.owner_id == owner_id)
            })
            .await)
    }

    async fn update_business(&self, mut business: Business) -> StoreResult<Business> {
        let mut guard = self.businesses.write().await;
        let existing = guard
            .get_mut(&business.id)
            .ok_or_else(|| StoreError::NotFound(format!("business {}", business.id)))?;
        business.created_at = existing.created_at;
        business.updated_at = Utc::now();
        *existing = business.clone();
        Ok(business)
    }

    async fn insert_templates(
        &self,
        business_id: Uuid,
        drafts: Vec<DraftTemplate>,
    ) -> StoreResult<Vec<ReviewTemplate>> {
        let now = Utc::now();
        let stored: Vec<ReviewTemplate> = drafts
            .into_iter()
            .map(|draft| ReviewTemplate {
                id: Uuid::new_v4(),
                business_id,
                rating: draft.rating,
                content: draft.content,
                created_at: now,
            })
            .collect();
        self.templates.write().await.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn list_templates(&self, business_id: Uuid, limit: i64) -> StoreResult<Vec<ReviewTemplate>> {
        let mut templates: Vec<ReviewTemplate> = self
            .templates
            .read()
            .await
            .iter()
            .filter(|t| t.business_id == business_id)
            .cloned()
            .collect();
        templates.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.rating.cmp(&a.rating)));
        Ok(page(&templates, limit, 0))
    }

    async fn create_reassignment(
        &self,
        request: ReassignmentRequest,
    ) -> StoreResult<ReassignmentRequest> {
        let mut guard = self.reassignments.write().await;
        let already_pending = request.status == ReassignmentStatus::Pending
            && guard.values().any(|existing| {
                existing.business_id == request.business_id
                    && existing.status == ReassignmentStatus::Pending
            });
        if already_pending {
            return Err(StoreError::Conflict(format!(
                "reassignment request pending for business {}",
                request.business_id
            )));
        }
        guard.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_reassignment(&self, request_id: Uuid) -> StoreResult<Option<ReassignmentRequest>> {
        Ok(self.reassignments.read().await.get(&request_id).cloned())
    }

    async fn list_reassignments(
        &self,
        status: Option<ReassignmentStatus>,
    ) -> StoreResult<Vec<ReassignmentRequest>> {
        let mut requests: Vec<ReassignmentRequest> = self
            .reassignments
            .read()
            .await
            .values()
            .filter(|r| status.map_or(true, |status| r.status == status))
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn list_reassignments_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ReassignmentRequest>> {
        let mut requests: Vec<ReassignmentRequest> = self
            .reassignments
            .read()
            .await
            .values()
            .filter(|r| r.requested_by == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn find_pending_reassignment(
        &self,
        business_id: Uuid,
    ) -> StoreResult<Option<ReassignmentRequest>> {
        Ok(self
            .reassignments
            .read()
            .await
            .values()
            .filter(|r| r.business_id == business_id && r.status == ReassignmentStatus::Pending)
            .min_by_key(|r| r.created_at)
            .cloned())
    }

    async fn update_reassignment(
        &self,
        request: ReassignmentRequest,
    ) -> StoreResult<ReassignmentRequest> {
        let mut guard = self.reassignments.write().await;
        let existing = guard
            .get_mut(&request.id)
            .ok_or_else(|| StoreError::NotFound(format!("reassignment request {}", request.id)))?;
        existing.status = request.status;
        existing.resolved_by = request.resolved_by;
        existing.resolution_note = request.resolution_note.clone();
        existing.updated_at = request.updated_at;
        Ok(existing.clone())
    }

    async fn create_reactivation(
        &self,
        record: BusinessReactivation,
    ) -> StoreResult<BusinessReactivation> {
        self.reactivations.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_reactivations(&self, business_id: Uuid) -> StoreResult<Vec<BusinessReactivation>> {
        let mut records: Vec<BusinessReactivation> = self
            .reactivations
            .read()
            .await
            .iter()
            .filter(|r| r.business_id == business_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn insert_activity_log(&self, entry: ActivityLog) -> StoreResult<()> {
        self.activity_logs.write().await.push(entry);
        Ok(())
    }

    async fn list_activity_logs(&self, limit: i64, offset: i64) -> StoreResult<Vec<ActivityLog>> {
        let guard = self.activity_logs.read().await;
        let newest_first: Vec<ActivityLog> = guard.iter().rev().cloned().collect();
        Ok(page(&newest_first, limit, offset))
    }

    async fn insert_business_activity(&self, entry: BusinessActivityLog) -> StoreResult<()> {
        self.business_activity.write().await.push(entry);
        Ok(())
    }

    async fn list_business_activity(
        &self,
        business_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<BusinessActivityLog>> {
        let guard = self.business_activity.read().await;
        let entries: Vec<BusinessActivityLog> = guard
            .iter()
            .rev()
            .filter(|entry| entry.business_id == business_id)
            .cloned()
            .collect();
        Ok(page(&entries, limit, 0))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
