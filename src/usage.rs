//! Tier-based generation limits.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Business, BusinessReactivation, SubscriptionTier, UsageReport, UsageStatus};

pub const GENERATION_LIMIT_REACHED: &str = "GENERATION_LIMIT_REACHED";
pub const BUSINESS_INACTIVE: &str = "BUSINESS_INACTIVE";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("generation limit of {limit} reached for the {tier:?} plan")]
    LimitReached { tier: SubscriptionTier, limit: i32 },
    #[error("business is not active")]
    Inactive,
}

impl UsageError {
    pub fn error_type(&self) -> &'static str {
        match self {
            UsageError::LimitReached { .. } => GENERATION_LIMIT_REACHED,
            UsageError::Inactive => BUSINESS_INACTIVE,
        }
    }
}

fn at_limit(count: i32, limit: Option<i32>) -> bool {
    limit.is_some_and(|limit| count >= limit)
}

pub fn report(business: &Business) -> UsageReport {
    let limit = business.subscription_tier.generation_limit();
    let can_generate = check(business).is_ok();
    UsageReport {
        business_id: business.id,
        tier: business.subscription_tier,
        generation_count: business.generation_count,
        limit,
        remaining: limit.map(|limit| (limit - business.generation_count).max(0)),
        status: business.usage_status,
        can_generate,
    }
}

/// Whether one more generation is allowed right now.
pub fn check(business: &Business) -> Result<(), UsageError> {
    if !business.is_active || business.deleted_at.is_some() {
        return Err(UsageError::Inactive);
    }

    let tier = business.subscription_tier;
    let limit = tier.generation_limit();
    if business.usage_status == UsageStatus::LimitReached
        || at_limit(business.generation_count, limit)
    {
        return Err(UsageError::LimitReached {
            tier,
            limit: limit.unwrap_or(business.generation_count),
        });
    }
    Ok(())
}

/// Count one completed generation; flips to `limit_reached` when the allowance is used up.
pub fn record_generation(business: &mut Business, now: DateTime<Utc>) {
    business.generation_count += 1;
    if at_limit(
        business.generation_count,
        business.subscription_tier.generation_limit(),
    ) {
        business.usage_status = UsageStatus::LimitReached;
    }
    business.updated_at = now;
}

/// Apply a plan change. Returns a reactivation record when a capped business regains headroom.
pub fn change_tier(
    business: &mut Business,
    tier: SubscriptionTier,
    actor: Uuid,
    now: DateTime<Utc>,
) -> Option<BusinessReactivation> {
    let previous_tier = business.subscription_tier;
    business.subscription_tier = tier;
    business.updated_at = now;

    let capped = at_limit(business.generation_count, tier.generation_limit());
    match (business.usage_status, capped) {
        (UsageStatus::LimitReached, false) => {
            business.usage_status = UsageStatus::Active;
            Some(reactivation(business, actor, previous_tier, now))
        }
        (UsageStatus::Active, true) => {
            business.usage_status = UsageStatus::LimitReached;
            None
        }
        _ => None,
    }
}

/// Admin reset of the generation counter.
pub fn reset(business: &mut Business, actor: Uuid, now: DateTime<Utc>) -> BusinessReactivation {
    let record = reactivation(business, actor, business.subscription_tier, now);
    business.generation_count = 0;
    business.usage_status = UsageStatus::Active;
    business.updated_at = now;
    record
}

fn reactivation(
    business: &Business,
    actor: Uuid,
    previous_tier: SubscriptionTier,
    now: DateTime<Utc>,
) -> BusinessReactivation {
    BusinessReactivation {
        id: Uuid::new_v4(),
        business_id: business.id,
        reactivated_by: actor,
        generation_count: business.generation_count,
        previous_tier,
        new_tier: business.subscription_tier,
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::tests::business;

    fn free_business(count: i32) -> Business {
        let mut biz = business(Uuid::new_v4(), "https://maps.google.com/place/a", 1);
        biz.generation_count = count;
        biz
    }

    #[test]
    fn free_tier_rejects_at_five() {
        let biz = free_business(5);
        assert_eq!(
            check(&biz),
            Err(UsageError::LimitReached {
                tier: SubscriptionTier::Free,
                limit: 5
            })
        );
        assert!(!report(&biz).can_generate);
        assert_eq!(report(&biz).remaining, Some(0));
    }

    #[test]
    fn free_tier_allows_fourth_and_caps_after_increment() {
        let mut biz = free_business(4);
        assert!(check(&biz).is_ok());
        assert_eq!(biz.usage_status, UsageStatus::Active);

        record_generation(&mut biz, Utc::now());
        assert_eq!(biz.generation_count, 5);
        assert_eq!(biz.usage_status, UsageStatus::LimitReached);
        assert!(check(&biz).is_err());
    }

    #[test]
    fn status_stays_active_below_limit() {
        let mut biz = free_business(2);
        record_generation(&mut biz, Utc::now());
        assert_eq!(biz.usage_status, UsageStatus::Active);
        assert_eq!(report(&biz).remaining, Some(2));
    }

    #[test]
    fn professional_is_unlimited() {
        let mut biz = free_business(500);
        biz.subscription_tier = SubscriptionTier::Professional;
        assert!(check(&biz).is_ok());
        record_generation(&mut biz, Utc::now());
        assert_eq!(biz.usage_status, UsageStatus::Active);
        assert_eq!(report(&biz).limit, None);
    }

    #[test]
    fn upgrade_reactivates_capped_business() {
        let actor = Uuid::new_v4();
        let mut biz = free_business(5);
        biz.usage_status = UsageStatus::LimitReached;

        let record = change_tier(&mut biz, SubscriptionTier::Starter, actor, Utc::now()).unwrap();
        assert_eq!(record.generation_count, 5);
        assert_eq!(record.previous_tier, SubscriptionTier::Free);
        assert_eq!(record.new_tier, SubscriptionTier::Starter);
        assert_eq!(biz.usage_status, UsageStatus::Active);
        assert!(check(&biz).is_ok());
    }

    #[test]
    fn downgrade_below_usage_caps_business() {
        let mut biz = free_business(10);
        biz.subscription_tier = SubscriptionTier::Starter;
        assert!(change_tier(&mut biz, SubscriptionTier::Free, Uuid::new_v4(), Utc::now()).is_none());
        assert_eq!(biz.usage_status, UsageStatus::LimitReached);
    }

    #[test]
    fn reset_records_count_before_clearing() {
        let mut biz = free_business(5);
        biz.usage_status = UsageStatus::LimitReached;
        let record = reset(&mut biz, Uuid::new_v4(), Utc::now());
        assert_eq!(record.generation_count, 5);
        assert_eq!(biz.generation_count, 0);
        assert_eq!(biz.usage_status, UsageStatus::Active);
    }

    #[test]
    fn inactive_business_cannot_generate() {
        let mut biz = free_business(0);
        biz.is_active = false;
        assert_eq!(check(&biz), Err(UsageError::Inactive));
    }
}
