use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use mnemo::config::Config;
use mnemo::services::TextAnalyzer;
use mnemo::{AppState, db, handlers, models};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::analyze::analyze_text,
        handlers::stats::get_user_stats,
        handlers::system::health_check,
    ),
    components(
        schemas(
            models::AnalyzeRequest,
            models::AnalysisResult,
            models::AnalysisMeta,
            models::Action,
            models::action::ActionType,
            models::action::TimeSource,
            models::UserStats,
            models::HealthResponse,
        )
    ),
    tags(
        (name = "Analysis", description = "Diary entry analysis endpoints"),
        (name = "System", description = "Health and metrics endpoints"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    // keep the appender guard alive for the lifetime of the process
    let mut _log_guard = None;
    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("mnemo.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        _log_guard = Some(guard);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Mnemo starting up");
    tracing::info!("Configuration loaded successfully");

    let pool = db::create_pool(&config.database.url).await?;
    db::init_schema(&pool).await?;
    tracing::info!("Database pool created and schema initialized");

    let analyzer = Arc::new(TextAnalyzer::from_config(&config, pool.clone()).await);
    tracing::info!("Analysis pipeline assembled");

    let app_state = Arc::new(AppState {
        db: pool,
        analyzer,
        metrics_enabled: config.metrics.enabled,
    });

    let app = Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/analyze", post(handlers::analyze::analyze_text))
        .route("/stats/:user_id", get(handlers::stats::get_user_stats))
        .route("/health", get(handlers::system::health_check))
        .route("/ready", get(handlers::system::ready_check))
        .route("/metrics", get(handlers::system::metrics_handler))
        .with_state(app_state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);
    tracing::info!("Mnemo is ready to serve requests");

    axum::serve(listener, app).await?;

    Ok(())
}
