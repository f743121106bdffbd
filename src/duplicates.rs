//! Duplicate Google Maps URL detection.
//!
//! Used interactively (a single conflict lookup before a write) and in batch (grouping every
//! active business by its normalized URL and planning which records to archive).

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::database::{Store, StoreResult};
use crate::lifecycle;
use crate::models::{Business, BusinessSummary};

pub const DUPLICATE_GOOGLE_MAPS_URL: &str = "DUPLICATE_GOOGLE_MAPS_URL";
pub const DUPLICATE_GOOGLE_MAPS_URL_OWN: &str = "DUPLICATE_GOOGLE_MAPS_URL_OWN";

/// Active businesses sharing one normalized URL, oldest first.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DuplicateGroup {
    pub normalized_google_maps_url: String,
    pub businesses: Vec<BusinessSummary>,
}

/// Keep-oldest resolution for one group.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DuplicateResolution {
    pub normalized_google_maps_url: String,
    pub keep: Uuid,
    pub archive: Vec<Uuid>,
}

/// Who already holds a URL, relative to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The caller (or prospective owner) already has an active business on this URL.
    Own,
    /// Another tenant holds the URL.
    OtherTenant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateConflict {
    pub kind: ConflictKind,
    pub existing: BusinessSummary,
    pub normalized_google_maps_url: String,
}

impl DuplicateConflict {
    pub fn error_type(&self) -> &'static str {
        match self.kind {
            ConflictKind::Own => DUPLICATE_GOOGLE_MAPS_URL_OWN,
            ConflictKind::OtherTenant => DUPLICATE_GOOGLE_MAPS_URL,
        }
    }

    pub fn message(&self) -> String {
        match self.kind {
            ConflictKind::Own => format!(
                "You already have a business registered with this Google Maps URL ({})",
                self.existing.name
            ),
            ConflictKind::OtherTenant => {
                "This Google Maps URL is already registered to another account".to_string()
            }
        }
    }

    /// Payload for the caller: the existing record plus how to resolve the clash.
    pub fn details(&self) -> serde_json::Value {
        let hints: Vec<&str> = match self.kind {
            ConflictKind::Own => vec![
                "Open the existing business instead of creating a new one",
                "Update the existing business if its details changed",
            ],
            ConflictKind::OtherTenant => vec![
                "Check that the Google Maps link points at your location",
                "If you own this location, file an ownership_transfer reassignment request",
                "Contact support if you believe the existing registration is wrong",
            ],
        };

        let existing = match self.kind {
            ConflictKind::Own => json!(self.existing),
            // Do not leak another tenant's identifiers beyond what is needed to file a request.
            ConflictKind::OtherTenant => json!({
                "id": self.existing.id,
                "name": self.existing.name,
            }),
        };

        json!({
            "normalized_google_maps_url": self.normalized_google_maps_url,
            "existing_business": existing,
            "resolution_hints": hints,
        })
    }
}

fn is_candidate(business: &Business) -> bool {
    business.is_active
        && business.deleted_at.is_none()
        && !business.normalized_google_maps_url.is_empty()
}

/// Group active businesses by normalized URL and keep only groups with more than one member.
pub fn find_duplicate_groups(businesses: &[Business]) -> Vec<DuplicateGroup> {
    let mut by_url: BTreeMap<&str, Vec<&Business>> = BTreeMap::new();
    for business in businesses.iter().filter(|b| is_candidate(b)) {
        by_url
            .entry(business.normalized_google_maps_url.as_str())
            .or_default()
            .push(business);
    }

    by_url
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(url, mut members)| {
            members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            DuplicateGroup {
                normalized_google_maps_url: url.to_string(),
                businesses: members.into_iter().map(BusinessSummary::from).collect(),
            }
        })
        .collect()
}

/// Keep the oldest member of each group and flag the rest.
pub fn plan_resolution(groups: &[DuplicateGroup]) -> Vec<DuplicateResolution> {
    groups
        .iter()
        .filter_map(|group| {
            let (keep, rest) = group.businesses.split_first()?;
            Some(DuplicateResolution {
                normalized_google_maps_url: group.normalized_google_maps_url.clone(),
                keep: keep.id,
                archive: rest.iter().map(|b| b.id).collect(),
            })
        })
        .collect()
}

/// Look for an active business other than `exclude` already holding `normalized`.
///
/// `owner_id` is whoever would own the record after the write; it decides between the
/// `_OWN` and cross-tenant error types.
pub fn find_conflict(
    candidates: &[Business],
    normalized: &str,
    exclude: Option<Uuid>,
    owner_id: Uuid,
) -> Option<DuplicateConflict> {
    if normalized.is_empty() {
        return None;
    }

    let mut matches: Vec<&Business> = candidates
        .iter()
        .filter(|b| is_candidate(b))
        .filter(|b| b.normalized_google_maps_url == normalized)
        .filter(|b| Some(b.id) != exclude)
        .collect();

    // Prefer reporting the caller's own record when both exist.
    matches.sort_by_key(|b| (b.owner_id != owner_id, b.created_at));
    let existing = matches.first()?;

    let kind = if existing.owner_id == owner_id {
        ConflictKind::Own
    } else {
        ConflictKind::OtherTenant
    };

    Some(DuplicateConflict {
        kind,
        existing: BusinessSummary::from(*existing),
        normalized_google_maps_url: normalized.to_string(),
    })
}

/// Archive every record a plan flags, handing it to `admin_id`.
///
/// Records that changed since the scan (already archived or deleted) are skipped. Returns the
/// ids actually archived.
pub async fn apply_resolution(
    store: &dyn Store,
    plan: &[DuplicateResolution],
    admin_id: Uuid,
) -> StoreResult<Vec<Uuid>> {
    let mut archived = Vec::new();
    for resolution in plan {
        for id in &resolution.archive {
            let Some(mut business) = store.get_business(*id).await? else {
                log::warn!("Duplicate {id} disappeared before it could be archived");
                continue;
            };
            let reason = format!("Duplicate Google Maps URL; kept {}", resolution.keep);
            if let Err(err) = lifecycle::archive(&mut business, admin_id, Some(reason), Utc::now()) {
                log::warn!("Skipping duplicate {id}: {err}");
                continue;
            }
            store.update_business(business).await?;
            log::info!(
                "Archived duplicate {id} of {} ({})",
                resolution.keep,
                resolution.normalized_google_maps_url
            );
            archived.push(*id);
        }
    }
    Ok(archived)
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::maps_url::normalize;
    use crate::models::{SubscriptionTier, UsageStatus};

    pub(crate) fn business(owner: Uuid, url: &str, age_days: i64) -> Business {
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() - Duration::days(age_days);
        Business {
            id: Uuid::new_v4(),
            owner_id: owner,
            name: format!("Business {age_days}"),
            category: None,
            description: None,
            website: None,
            google_maps_url: url.to_string(),
            normalized_google_maps_url: normalize(url),
            subscription_tier: SubscriptionTier::Free,
            generation_count: 0,
            usage_status: UsageStatus::Active,
            is_active: true,
            previous_state: None,
            archived_at: None,
            deleted_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn reports_single_group_for_two_matching_of_three() {
        let owner = Uuid::new_v4();
        let a = business(owner, "https://www.google.com/maps/place/cafe", 10);
        let b = business(Uuid::new_v4(), "google.com/maps/place/Cafe/?hl=en", 3);
        let c = business(owner, "https://goo.gl/maps/other", 1);

        let groups = find_duplicate_groups(&[a.clone(), b.clone(), c]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].businesses.len(), 2);
        assert_eq!(groups[0].normalized_google_maps_url, "google.com/maps/place/cafe");
        assert_eq!(groups[0].businesses[0].id, a.id);
        assert_eq!(groups[0].businesses[1].id, b.id);
    }

    #[test]
    fn ignores_inactive_and_deleted_records() {
        let url = "https://maps.google.com/place/x";
        let active = business(Uuid::new_v4(), url, 5);
        let mut archived = business(Uuid::new_v4(), url, 4);
        archived.is_active = false;
        let mut deleted = business(Uuid::new_v4(), url, 3);
        deleted.deleted_at = Some(Utc::now());

        assert!(find_duplicate_groups(&[active, archived, deleted]).is_empty());
    }

    #[test]
    fn plan_keeps_oldest_member() {
        let url = "https://maps.google.com/place/x";
        let newest = business(Uuid::new_v4(), url, 1);
        let oldest = business(Uuid::new_v4(), url, 30);
        let middle = business(Uuid::new_v4(), url, 7);

        let groups = find_duplicate_groups(&[newest.clone(), oldest.clone(), middle.clone()]);
        let plan = plan_resolution(&groups);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].keep, oldest.id);
        assert_eq!(plan[0].archive, vec![middle.id, newest.id]);
    }

    #[test]
    fn conflict_classifies_own_and_foreign_records() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mine = business(me, "https://maps.google.com/place/mine", 2);
        let theirs = business(other, "https://maps.google.com/place/theirs", 2);
        let all = vec![mine.clone(), theirs.clone()];

        let own = find_conflict(&all, "maps.google.com/place/mine", None, me).unwrap();
        assert_eq!(own.kind, ConflictKind::Own);
        assert_eq!(own.error_type(), DUPLICATE_GOOGLE_MAPS_URL_OWN);

        let foreign = find_conflict(&all, "maps.google.com/place/theirs", None, me).unwrap();
        assert_eq!(foreign.kind, ConflictKind::OtherTenant);
        assert_eq!(foreign.error_type(), DUPLICATE_GOOGLE_MAPS_URL);
        assert!(foreign.details()["existing_business"].get("owner_id").is_none());
    }

    #[test]
    fn conflict_excludes_the_record_being_written() {
        let me = Uuid::new_v4();
        let mine = business(me, "https://maps.google.com/place/mine", 2);
        assert!(find_conflict(
            std::slice::from_ref(&mine),
            "maps.google.com/place/mine",
            Some(mine.id),
            me
        )
        .is_none());
    }

    #[tokio::test]
    async fn applying_plan_archives_newer_members_to_admin() {
        use crate::database::MemoryStore;
        use crate::models::NewBusiness;

        let store = MemoryStore::new();
        let admin = Uuid::new_v4();
        let url = "https://maps.google.com/place/shared";
        let mut ids = Vec::new();
        for age in [9, 2] {
            let template = business(Uuid::new_v4(), url, age);
            let created = store
                .create_business(NewBusiness {
                    id: template.id,
                    owner_id: template.owner_id,
                    name: template.name,
                    category: None,
                    description: None,
                    website: None,
                    google_maps_url: template.google_maps_url,
                    normalized_google_maps_url: template.normalized_google_maps_url,
                    subscription_tier: SubscriptionTier::Free,
                    created_at: template.created_at,
                })
                .await
                .unwrap();
            ids.push(created.id);
        }

        let groups = find_duplicate_groups(&store.list_active_businesses().await.unwrap());
        let plan = plan_resolution(&groups);
        let archived = apply_resolution(&store, &plan, admin).await.unwrap();
        assert_eq!(archived, vec![ids[1]]);

        let newer = store.get_business(ids[1]).await.unwrap().unwrap();
        assert_eq!(newer.owner_id, admin);
        assert!(!newer.is_active);
        assert!(find_duplicate_groups(&store.list_active_businesses().await.unwrap()).is_empty());

        // A second pass over the stale plan is a no-op.
        assert!(apply_resolution(&store, &plan, admin).await.unwrap().is_empty());
    }
}
