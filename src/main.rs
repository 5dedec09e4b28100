//! Printshop Storefront - cart and shipping service for a print-on-demand shop

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use printshop_storefront::api::{router, AppState};
use printshop_storefront::application::{SessionRegistry, ShippingEstimator};
use printshop_storefront::config::AppConfig;
use printshop_storefront::infrastructure::{MemoryStore, PgStore, PrintifyClient};
use printshop_storefront::ports::KeyValueStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let cfg = AppConfig::from_env()?;

    let store: Arc<dyn KeyValueStore> = match &cfg.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await?;
            let store = PgStore::new(db);
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, carts are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };
    let nats = match &cfg.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => { tracing::warn!(error = %e, "NATS unavailable, events disabled"); None }
        },
        None => None,
    };

    let printify = Arc::new(PrintifyClient::new(&cfg.printify)?);
    let state = AppState {
        sessions: Arc::new(SessionRegistry::new(store.clone(), cfg.cart.clone())),
        estimator: Arc::new(ShippingEstimator::new(printify.clone(), store, chrono::Duration::hours(cfg.rate_cache_ttl_hours))),
        catalog: printify.clone(),
        uploads: printify,
        checkout: cfg.checkout.clone(),
        nats,
    };

    tracing::info!("🚀 Printshop Storefront listening on 0.0.0.0:{}", cfg.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", cfg.port)).await?, router(state)).await?;
    Ok(())
}
