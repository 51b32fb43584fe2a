mod config;
mod error;
mod handlers;
mod models;
mod service;
mod storage;

use axum::{extract::DefaultBodyLimit, http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::Config;
pub use error::{AppError, Result};

use service::{ChatMessageService, ContactService, RecordService, StatusCheckService};
use storage::RecordStore;

pub struct AppState {
    pub config: Config,
    pub status_checks: StatusCheckService,
    pub contacts: ContactService,
    pub chat_messages: ChatMessageService,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let status_checks = RecordService::new(RecordStore::new(config.status_checks_path()));
        let contacts = RecordService::new(RecordStore::new(config.contacts_path()));
        let chat_messages = RecordService::new(RecordStore::new(config.chat_messages_path()));

        Self {
            config,
            status_checks,
            contacts,
            chat_messages,
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {:?}", origin);
                None
            }
        })
        .collect();

    // Credentials rule out wildcards, so methods and headers mirror the request
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_request_body_bytes();
    let cors = cors_layer(&state.config);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Public API
        .route("/api", get(handlers::root))
        .route("/api/", get(handlers::root))
        .route(
            "/api/status",
            get(handlers::status::list_status_checks).post(handlers::status::create_status_check),
        )
        .route(
            "/api/contact",
            get(handlers::contact::list_contacts).post(handlers::contact::create_contact),
        )
        .route(
            "/api/chat",
            get(handlers::chat::list_chat_messages).post(handlers::chat::create_chat_message),
        )
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    let config = Config::from_env()?;

    tokio::fs::create_dir_all(&config.data_dir).await?;
    tracing::info!(
        "Storing records in {}, {} and {}",
        config.status_checks_path().display(),
        config.contacts_path().display(),
        config.chat_messages_path().display()
    );
    if config.allows_any_origin() {
        tracing::info!("CORS: allowing any origin");
    } else {
        tracing::info!("CORS: allowing {:?}", config.cors_origins());
    }

    let state = Arc::new(AppState::new(config.clone()));
    let app = app(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
