use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use reviewboost_service::auth::{hash_password, TokenService};
use reviewboost_service::cache::FeedbackCache;
use reviewboost_service::clients::{
    HttpPageScraper, OfflineGenerator, OpenAiGenerator, PageScraper, TemplateGenerator,
};
use reviewboost_service::config::Config;
use reviewboost_service::database::{DatabaseService, MemoryStore, Store};
use reviewboost_service::handlers::{self, FeedbackSettings};
use reviewboost_service::models::{NewUser, UserRole};

fn io_error(err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

/// Make sure the configured superadmin exists so a fresh deployment can be administered.
async fn seed_bootstrap_admin(store: &dyn Store, config: &Config) -> std::io::Result<()> {
    let (Some(email), Some(password)) = (
        config.bootstrap_admin_email.as_deref(),
        config.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(());
    };
    let email = email.trim().to_lowercase();

    if let Some(existing) = store.get_user_by_email(&email).await.map_err(io_error)? {
        if !existing.is_superadmin() {
            log::warn!("Bootstrap admin {email} exists but is not a superadmin");
        }
        return Ok(());
    }

    let now = Utc::now();
    store
        .create_user(NewUser {
            id: Uuid::new_v4(),
            email: email.clone(),
            name: "Administrator".to_string(),
            password_hash: hash_password(password).map_err(io_error)?,
            role: UserRole::Superadmin,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .map_err(io_error)?;
    log::info!("Created bootstrap superadmin {email}");
    Ok(())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(io_error)?;
    let bind_address = config.bind_address();

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let db = DatabaseService::new(url).await.map_err(|err| {
                log::error!("Failed to initialize database: {err:?}");
                io_error(err)
            })?;
            Arc::new(db)
        }
        None => {
            log::warn!("DATABASE_URL not set; using the in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };
    seed_bootstrap_admin(store.as_ref(), &config).await?;

    let generator: Arc<dyn TemplateGenerator> = match &config.openai_api_key {
        Some(key) => Arc::new(
            OpenAiGenerator::new(
                config.openai_base_url.clone(),
                key.clone(),
                config.openai_model.clone(),
                config.openai_timeout,
            )
            .map_err(io_error)?,
        ),
        None => {
            log::warn!("OPENAI_API_KEY not set; generating offline templates");
            Arc::new(OfflineGenerator)
        }
    };
    let scraper: Arc<dyn PageScraper> =
        Arc::new(HttpPageScraper::new(config.scraper_timeout).map_err(io_error)?);

    let store_data = web::Data::from(store);
    let generator_data = web::Data::from(generator);
    let scraper_data = web::Data::from(scraper);
    let tokens = web::Data::new(TokenService::new(
        &config.jwt_secret,
        config.session_ttl,
        config.cookie_secure,
    ));
    let cache = web::Data::new(FeedbackCache::new(config.feedback_cache_ttl));
    let settings = web::Data::new(FeedbackSettings {
        templates_per_generation: config.templates_per_generation,
    });

    log::info!("🚀 Starting ReviewBoost service on {}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(store_data.clone())
            .app_data(tokens.clone())
            .app_data(generator_data.clone())
            .app_data(scraper_data.clone())
            .app_data(cache.clone())
            .app_data(settings.clone())
            .app_data(handlers::json_config())
            .app_data(handlers::query_config())
            .wrap(cors)
            .wrap(Logger::default())
            .service(web::scope("/api/v1").configure(handlers::configure))
    })
    .bind(&bind_address)?
    .run()
    .await
}
