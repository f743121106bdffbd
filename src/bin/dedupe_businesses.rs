//! Batch scan for businesses sharing a Google Maps URL.
//!
//! Prints every duplicate group and the keep-oldest plan. With `--apply`, the newer members are
//! archived to a superadmin account so their owners can file restore requests.

use clap::Parser;
use serde_json::json;

use reviewboost_service::activity::log_admin_activity;
use reviewboost_service::database::{DatabaseService, Store};
use reviewboost_service::duplicates::{apply_resolution, find_duplicate_groups, plan_resolution};
use reviewboost_service::models::User;

#[derive(Debug, Parser)]
#[command(name = "dedupe_businesses", version, about = "Find and archive duplicate businesses")]
struct Args {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Archive the newer members of each group instead of only reporting them
    #[arg(long)]
    apply: bool,

    /// Superadmin that receives archived records (defaults to the oldest superadmin)
    #[arg(long, env = "DEDUPE_ADMIN_EMAIL")]
    admin_email: Option<String>,
}

async fn resolve_admin(store: &dyn Store, email: Option<&str>) -> Result<User, Box<dyn std::error::Error>> {
    let admin = match email {
        Some(email) => store.get_user_by_email(&email.trim().to_lowercase()).await?,
        None => store
            .list_users()
            .await?
            .into_iter()
            .find(|u| u.is_superadmin() && u.is_active),
    };
    match admin {
        Some(user) if user.is_superadmin() => Ok(user),
        Some(user) => Err(format!("{} is not a superadmin", user.email).into()),
        None => Err("no superadmin account found; pass --admin-email".into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();

    let store = DatabaseService::new(&args.database_url).await?;
    let groups = find_duplicate_groups(&store.list_active_businesses().await?);
    if groups.is_empty() {
        println!("No duplicate Google Maps URLs found.");
        return Ok(());
    }

    let plan = plan_resolution(&groups);
    for group in &groups {
        println!("{} ({} businesses)", group.normalized_google_maps_url, group.businesses.len());
        for (i, business) in group.businesses.iter().enumerate() {
            let action = if i == 0 { "keep   " } else { "archive" };
            println!(
                "  {action} {} {:<40} owner={} created={}",
                business.id,
                business.name,
                business.owner_id,
                business.created_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    if !args.apply {
        println!("\nDry run. Re-run with --apply to archive the newer duplicates.");
        return Ok(());
    }

    let admin = resolve_admin(&store, args.admin_email.as_deref()).await?;
    let archived = apply_resolution(&store, &plan, admin.id).await?;
    log_admin_activity(
        &store,
        admin.id,
        "duplicates_resolved",
        "business",
        None,
        json!({ "groups": plan.len(), "archived": archived, "source": "dedupe_businesses" }),
    )
    .await;
    println!("\nArchived {} businesses to {}.", archived.len(), admin.email);
    Ok(())
}
