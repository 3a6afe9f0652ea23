use std::net::SocketAddr;
use std::sync::Arc;

use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snipbox::{cleanup, routes, AppState, Config, Database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snipbox=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Initialize database
    let db = Database::new(&config.database_url).await?;
    db.migrate().await?;

    let port = config.port;
    let state = AppState {
        config: Arc::new(config),
        db,
    };

    // Start background cleanup task
    tokio::spawn({
        let state = state.clone();
        async move {
            if let Err(e) = cleanup::start_cleanup_task(state).await {
                tracing::error!("Cleanup task failed: {}", e);
            }
        }
    });

    // Rate limiting per client IP
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(5)
        .burst_size(20)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("Failed to build rate limit config"))?;

    let rate_limit_layer = GovernorLayer {
        config: Arc::new(rate_limit_config),
    };

    let app = routes::router(state).layer(rate_limit_layer);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("snipbox listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
