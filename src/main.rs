use std::sync::Arc;
use std::time::Duration;

use folio_api::{
    config::Config,
    db::{create_pool, create_redis_client, Cache, CatalogStore, PgCatalogStore},
    routes::{create_router, AppState},
    services::{ChatCompletionAi, DisabledAi, RecommendationAi, RecommendationEngine},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("folio_api=debug,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    let store: Arc<dyn CatalogStore> = Arc::new(PgCatalogStore::new(pool));

    let ai: Arc<dyn RecommendationAi> = match &config.ai_api_key {
        Some(api_key) => Arc::new(ChatCompletionAi::new(
            api_key.clone(),
            config.ai_api_url.clone(),
            config.ai_model.clone(),
            Duration::from_secs(config.ai_timeout_secs),
        )?),
        None => {
            tracing::warn!("AI_API_KEY not set, personalized recommendations will use trending");
            Arc::new(DisabledAi)
        }
    };

    let (cache, cache_writer) = match &config.redis_url {
        Some(redis_url) => {
            let (cache, handle) = Cache::new(create_redis_client(redis_url)?).await;
            (Some(cache), Some(handle))
        }
        None => {
            tracing::info!("REDIS_URL not set, catalog caching disabled");
            (None, None)
        }
    };

    let engine = RecommendationEngine::new(store, ai, config.engine_settings());
    let app = create_router(AppState::new(engine, cache, config.catalog_cache_ttl));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
