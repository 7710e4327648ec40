use bill_manager::config::Config;
use bill_manager::routes::{router, AppState};
use bill_manager::storage::BillStorage;
use bill_manager::user_storage::UserStorage;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "bill_manager=info,server=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.data_dir)?;

    let bills = BillStorage::open(&config.data_dir)?;
    let users = UserStorage::open(&config.data_dir)?;

    if config.seed {
        let seeded_bills = bills.seed_fixtures().await?;
        let seeded_users = users.seed_fixtures().await?;
        tracing::info!(bills = seeded_bills, users = seeded_users, "seeded sample data");
    }

    let app_state = Arc::new(AppState {
        bills,
        users,
        upload_limits: config.upload_limits(),
    });

    let app = router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    tracing::info!("Bill manager running on http://{}", config.addr);
    tracing::info!("   GET/POST        /bills        - list (filterable) / create bills");
    tracing::info!("   GET/PUT/DELETE  /bills/:id    - view / edit / delete a bill");
    tracing::info!("   GET             /bills/export - export bills as CSV");
    tracing::info!("   GET/POST        /users        - list (searchable) / add users");
    tracing::info!("   POST            /uploads      - ingest bill files (/uploads/preview to dry-run)");
    tracing::info!("   GET             /reports      - aggregate reports");

    axum::serve(listener, app).await?;
    Ok(())
}
