//! Applies `migrations/*.sql` in file-name order, recording each file in `schema_migrations`.

use std::path::PathBuf;

use tokio_postgres::NoTls;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| "DATABASE_URL must be set in environment")?;
    let dir = std::env::var("MIGRATIONS_DIR").unwrap_or_else(|_| "migrations".into());

    let (client, connection) = tokio_postgres::connect(&database_url, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            log::error!("connection error: {e}");
        }
    });

    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .await?;

    let mut files: Vec<PathBuf> = glob::glob(&format!("{dir}/*.sql"))?
        .filter_map(Result::ok)
        .collect();
    files.sort();

    if files.is_empty() {
        log::warn!("No migration files found under {dir}");
        return Ok(());
    }

    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or("migration file name is not valid UTF-8")?
            .to_string();

        let applied = client
            .query_opt("SELECT 1 FROM schema_migrations WHERE name = $1", &[&name])
            .await?;
        if applied.is_some() {
            log::info!("Skipping {name} (already applied)");
            continue;
        }

        let sql = std::fs::read_to_string(&path)?;
        client.batch_execute(&sql).await?;
        client
            .execute("INSERT INTO schema_migrations (name) VALUES ($1)", &[&name])
            .await?;
        log::info!("Applied {name}");
    }

    Ok(())
}
