use exam_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    error::Error,
    routes,
    services::notification_service::{LogNotifier, Notifier, WebhookNotifier},
    store::{Datastore, PgStore},
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    init_config()?;
    let config = get_config();

    let pool = create_pool(config).await?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(Error::Migration)?;

    let store: Arc<dyn Datastore> = Arc::new(PgStore::new(pool));
    let notifier: Arc<dyn Notifier> = match &config.notification_webhook_url {
        Some(url) => {
            info!(target_url = %url, "Dispatching exam events to webhook");
            Arc::new(WebhookNotifier::new(url.clone(), config.webhook_secret.clone())?)
        }
        None => {
            info!("No NOTIFICATION_WEBHOOK_URL set, exam events are only logged");
            Arc::new(LogNotifier)
        }
    };

    let app_state = AppState::new(store, notifier, config);

    let app = routes::api_router(app_state, config.public_rps)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
