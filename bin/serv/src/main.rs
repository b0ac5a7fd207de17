use axum::{Router, middleware, routing::get};
use kotoba_api::{config::ApiConfig, state::ApiState};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment variables
    dotenvy::dotenv().ok();
    let config = ApiConfig::from_env()?;

    kotoba_api::tracing::init_tracing(config.env);
    let metrics_handle = kotoba_api::metrics::init_metrics()?;

    // Initialize the application state (store strategy, scheduler, clock)
    let state = ApiState::new(&config).await?;

    // Periodic maintenance (due-backlog gauge refresh)
    let _jobs = kotoba_api::jobs::start_background_jobs(state.store.clone());

    // Create the application router
    let app = kotoba_api::router::router()
        .with_state(state)
        .merge(
            Router::new()
                .route("/metrics", get(kotoba_api::metrics::metrics_handler))
                .with_state(metrics_handle),
        )
        .layer(middleware::from_fn(kotoba_api::metrics::track_metrics))
        .layer(middleware::from_fn(
            kotoba_api::middleware::request_id::request_id_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive());

    // Start the server
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("Server running on http://localhost:{}", config.port);
    axum::serve(listener, app).await?;

    Ok(())
}
