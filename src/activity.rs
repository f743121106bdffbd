//! Best-effort audit trail writes. A failed write is logged and never fails the request.

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::database::Store;
use crate::models::{ActivityLog, BusinessActivityLog};

pub async fn log_admin_activity(
    store: &dyn Store,
    admin_id: Uuid,
    action: &str,
    entity_type: &str,
    entity_id: Option<Uuid>,
    details: Value,
) {
    let entry = ActivityLog {
        id: Uuid::new_v4(),
        admin_id,
        action: action.to_string(),
        entity_type: entity_type.to_string(),
        entity_id,
        details,
        created_at: Utc::now(),
    };
    if let Err(err) = store.insert_activity_log(entry).await {
        log::warn!("Failed to record admin activity '{action}': {err:?}");
    }
}

pub async fn log_business_activity(
    store: &dyn Store,
    business_id: Uuid,
    user_id: Uuid,
    action: &str,
    details: Value,
) {
    let entry = BusinessActivityLog {
        id: Uuid::new_v4(),
        business_id,
        user_id,
        action: action.to_string(),
        details,
        created_at: Utc::now(),
    };
    if let Err(err) = store.insert_business_activity(entry).await {
        log::warn!("Failed to record business activity '{action}' for {business_id}: {err:?}");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::database::MemoryStore;

    #[tokio::test]
    async fn records_both_trails() {
        let store = MemoryStore::new();
        let admin = Uuid::new_v4();
        let business = Uuid::new_v4();

        log_admin_activity(&store, admin, "archive_business", "business", Some(business), json!({}))
            .await;
        log_business_activity(&store, business, admin, "archived", json!({"reason": null})).await;

        let admin_logs = store.list_activity_logs(10, 0).await.unwrap();
        assert_eq!(admin_logs.len(), 1);
        assert_eq!(admin_logs[0].action, "archive_business");

        let business_logs = store.list_business_activity(business, 10).await.unwrap();
        assert_eq!(business_logs.len(), 1);
        assert_eq!(business_logs[0].user_id, admin);
    }
}
