use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use certifier::config::Config;
use certifier::db::{self, PgCertificateRepository, PgTrackRepository};
use certifier::state::AppState;
use certifier::storage::FilesystemStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certifier=info,tower_http=info".into()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    let store = FilesystemStore::new(config.storage_folder.clone(), config.public_base_url.clone()).await?;
    tracing::info!(
        "Storing files in {} (served at {})",
        config.storage_folder.display(),
        config.public_base_url
    );

    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::new(PgCertificateRepository::new(pool.clone())),
        Arc::new(PgTrackRepository::new(pool)),
        Arc::new(store),
    ));

    let app = certifier::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Certifier listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
