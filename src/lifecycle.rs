//! Business archive / restore / deactivation state machine and reassignment request
//! transitions.
//!
//! Everything here mutates records in memory; handlers persist the result. Duplicate checks
//! happen before calling into this module.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Business, PreviousState, ReassignmentRequest, ReassignmentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessState {
    Active,
    Inactive,
    Archived,
    PermanentlyDeactivated,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("business is {actual:?}; expected {expected}")]
    InvalidBusinessState {
        actual: BusinessState,
        expected: &'static str,
    },
    #[error("reassignment request is {actual:?}; expected {expected:?}")]
    InvalidRequestStatus {
        actual: ReassignmentStatus,
        expected: ReassignmentStatus,
    },
}

pub fn state_of(business: &Business) -> BusinessState {
    if business.deleted_at.is_some() {
        BusinessState::PermanentlyDeactivated
    } else if business.archived_at.is_some() && business.previous_state.is_some() {
        BusinessState::Archived
    } else if business.is_active {
        BusinessState::Active
    } else {
        BusinessState::Inactive
    }
}

/// Usage and plan changes only apply to live records; restore would overwrite them from the
/// snapshot otherwise.
pub fn ensure_active(business: &Business) -> Result<(), LifecycleError> {
    match state_of(business) {
        BusinessState::Active => Ok(()),
        actual => Err(LifecycleError::InvalidBusinessState {
            actual,
            expected: "active",
        }),
    }
}

/// Field edits are allowed on records that are neither archived nor deleted.
pub fn ensure_editable(business: &Business) -> Result<(), LifecycleError> {
    match state_of(business) {
        BusinessState::Active | BusinessState::Inactive => Ok(()),
        actual => Err(LifecycleError::InvalidBusinessState {
            actual,
            expected: "active or inactive",
        }),
    }
}

/// Snapshot the business, hand it to `admin_id` and take it out of circulation.
pub fn archive(
    business: &mut Business,
    admin_id: Uuid,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    match state_of(business) {
        BusinessState::Active | BusinessState::Inactive => {}
        actual => {
            return Err(LifecycleError::InvalidBusinessState {
                actual,
                expected: "active or inactive",
            })
        }
    }

    business.previous_state = Some(PreviousState {
        owner_id: business.owner_id,
        name: business.name.clone(),
        google_maps_url: business.google_maps_url.clone(),
        normalized_google_maps_url: business.normalized_google_maps_url.clone(),
        is_active: business.is_active,
        subscription_tier: business.subscription_tier,
        generation_count: business.generation_count,
        usage_status: business.usage_status,
        archived_by: admin_id,
        reason,
    });
    business.owner_id = admin_id;
    business.is_active = false;
    business.archived_at = Some(now);
    business.updated_at = now;
    Ok(())
}

/// The snapshot a restore would replay, if the business is archived.
pub fn pending_snapshot(business: &Business) -> Option<&PreviousState> {
    match state_of(business) {
        BusinessState::Archived => business.previous_state.as_ref(),
        _ => None,
    }
}

/// Replay the archived snapshot and clear it. Returns the replayed snapshot.
pub fn restore(business: &mut Business, now: DateTime<Utc>) -> Result<PreviousState, LifecycleError> {
    let actual = state_of(business);
    let snapshot = match (actual, business.previous_state.take()) {
        (BusinessState::Archived, Some(snapshot)) => snapshot,
        (actual, taken) => {
            business.previous_state = taken;
            return Err(LifecycleError::InvalidBusinessState {
                actual,
                expected: "archived",
            });
        }
    };

    business.owner_id = snapshot.owner_id;
    business.name = snapshot.name.clone();
    business.google_maps_url = snapshot.google_maps_url.clone();
    business.normalized_google_maps_url = snapshot.normalized_google_maps_url.clone();
    business.subscription_tier = snapshot.subscription_tier;
    business.generation_count = snapshot.generation_count;
    business.usage_status = snapshot.usage_status;
    business.is_active = true;
    business.archived_at = None;
    business.updated_at = now;
    Ok(snapshot)
}

/// Soft delete with no way back.
pub fn deactivate_permanently(
    business: &mut Business,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    let actual = state_of(business);
    if actual == BusinessState::PermanentlyDeactivated {
        return Err(LifecycleError::InvalidBusinessState {
            actual,
            expected: "not deactivated",
        });
    }

    business.is_active = false;
    business.previous_state = None;
    business.deleted_at = Some(now);
    business.updated_at = now;
    Ok(())
}

/// Move an active business to a new owner.
pub fn transfer_ownership(
    business: &mut Business,
    new_owner: Uuid,
    now: DateTime<Utc>,
) -> Result<Uuid, LifecycleError> {
    let actual = state_of(business);
    if actual != BusinessState::Active {
        return Err(LifecycleError::InvalidBusinessState {
            actual,
            expected: "active",
        });
    }
    let previous_owner = std::mem::replace(&mut business.owner_id, new_owner);
    business.updated_at = now;
    Ok(previous_owner)
}

impl ReassignmentRequest {
    fn transition(
        &mut self,
        expected: ReassignmentStatus,
        next: ReassignmentStatus,
        resolver: Uuid,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        if self.status != expected {
            return Err(LifecycleError::InvalidRequestStatus {
                actual: self.status,
                expected,
            });
        }
        self.status = next;
        self.resolved_by = Some(resolver);
        if note.is_some() {
            self.resolution_note = note;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn approve(
        &mut self,
        admin_id: Uuid,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.transition(
            ReassignmentStatus::Pending,
            ReassignmentStatus::Approved,
            admin_id,
            note,
            now,
        )
    }

    pub fn complete(&mut self, admin_id: Uuid, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.transition(
            ReassignmentStatus::Approved,
            ReassignmentStatus::Completed,
            admin_id,
            None,
            now,
        )
    }

    pub fn reject(
        &mut self,
        admin_id: Uuid,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.transition(
            ReassignmentStatus::Pending,
            ReassignmentStatus::Rejected,
            admin_id,
            note,
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::tests::business;
    use crate::models::{ReassignmentKind, SubscriptionTier, UsageStatus};

    #[test]
    fn archive_then_restore_round_trips_snapshotted_fields() {
        let owner = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let mut biz = business(owner, "https://maps.google.com/place/a", 3);
        biz.subscription_tier = SubscriptionTier::Starter;
        biz.generation_count = 12;
        let before = biz.clone();

        archive(&mut biz, admin, Some("duplicate".into()), Utc::now()).unwrap();
        assert_eq!(state_of(&biz), BusinessState::Archived);
        assert_eq!(biz.owner_id, admin);
        assert!(!biz.is_active);
        assert!(biz.archived_at.is_some());
        assert_eq!(biz.previous_state.as_ref().unwrap().owner_id, owner);

        let snapshot = restore(&mut biz, Utc::now()).unwrap();
        assert_eq!(snapshot.reason.as_deref(), Some("duplicate"));
        assert_eq!(state_of(&biz), BusinessState::Active);
        assert_eq!(biz.owner_id, before.owner_id);
        assert_eq!(biz.name, before.name);
        assert_eq!(biz.google_maps_url, before.google_maps_url);
        assert_eq!(biz.normalized_google_maps_url, before.normalized_google_maps_url);
        assert_eq!(biz.subscription_tier, before.subscription_tier);
        assert_eq!(biz.generation_count, before.generation_count);
        assert_eq!(biz.usage_status, before.usage_status);
        assert!(biz.is_active);
        assert!(biz.previous_state.is_none());
        assert!(biz.archived_at.is_none());
    }

    #[test]
    fn cannot_archive_twice_or_restore_active() {
        let admin = Uuid::new_v4();
        let mut biz = business(Uuid::new_v4(), "https://maps.google.com/place/a", 1);
        assert!(matches!(
            restore(&mut biz, Utc::now()),
            Err(LifecycleError::InvalidBusinessState { actual: BusinessState::Active, .. })
        ));

        archive(&mut biz, admin, None, Utc::now()).unwrap();
        let snapshot = biz.previous_state.clone();
        assert!(archive(&mut biz, admin, None, Utc::now()).is_err());
        assert_eq!(biz.previous_state, snapshot);
    }

    #[test]
    fn permanent_deactivation_drops_restore_path() {
        let mut biz = business(Uuid::new_v4(), "https://maps.google.com/place/a", 1);
        archive(&mut biz, Uuid::new_v4(), None, Utc::now()).unwrap();
        deactivate_permanently(&mut biz, Utc::now()).unwrap();

        assert_eq!(state_of(&biz), BusinessState::PermanentlyDeactivated);
        assert!(biz.previous_state.is_none());
        assert!(restore(&mut biz, Utc::now()).is_err());
        assert!(deactivate_permanently(&mut biz, Utc::now()).is_err());
    }

    #[test]
    fn archived_records_refuse_usage_changes_and_edits() {
        let mut biz = business(Uuid::new_v4(), "https://maps.google.com/place/a", 1);
        assert!(ensure_active(&biz).is_ok());
        assert!(ensure_editable(&biz).is_ok());

        archive(&mut biz, Uuid::new_v4(), None, Utc::now()).unwrap();
        assert_eq!(
            ensure_active(&biz),
            Err(LifecycleError::InvalidBusinessState {
                actual: BusinessState::Archived,
                expected: "active",
            })
        );
        assert!(ensure_editable(&biz).is_err());
    }

    #[test]
    fn transfer_requires_active_business() {
        let new_owner = Uuid::new_v4();
        let mut biz = business(Uuid::new_v4(), "https://maps.google.com/place/a", 1);
        let old = biz.owner_id;
        assert_eq!(transfer_ownership(&mut biz, new_owner, Utc::now()).unwrap(), old);
        assert_eq!(biz.owner_id, new_owner);

        biz.usage_status = UsageStatus::LimitReached;
        biz.is_active = false;
        assert!(transfer_ownership(&mut biz, old, Utc::now()).is_err());
    }

    fn request() -> ReassignmentRequest {
        let now = Utc::now();
        ReassignmentRequest {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            kind: ReassignmentKind::Restore,
            requested_by: Uuid::new_v4(),
            status: ReassignmentStatus::Pending,
            reason: None,
            resolved_by: None,
            resolution_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn request_moves_pending_approved_completed() {
        let admin = Uuid::new_v4();
        let mut req = request();
        req.approve(admin, Some("ok".into()), Utc::now()).unwrap();
        assert_eq!(req.status, ReassignmentStatus::Approved);
        req.complete(admin, Utc::now()).unwrap();
        assert_eq!(req.status, ReassignmentStatus::Completed);
        assert_eq!(req.resolution_note.as_deref(), Some("ok"));
        assert_eq!(req.resolved_by, Some(admin));
    }

    #[test]
    fn request_rejects_out_of_order_transitions() {
        let admin = Uuid::new_v4();
        let mut req = request();
        assert_eq!(
            req.complete(admin, Utc::now()),
            Err(LifecycleError::InvalidRequestStatus {
                actual: ReassignmentStatus::Pending,
                expected: ReassignmentStatus::Approved,
            })
        );
        req.reject(admin, None, Utc::now()).unwrap();
        assert!(req.approve(admin, None, Utc::now()).is_err());
        assert_eq!(req.status, ReassignmentStatus::Rejected);
    }
}
