//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::PgStore, parser_llm::OpenAiWorkoutParser},
    config::Config,
    error::ApiError,
    web::{
        delete_goal_handler, delete_workout_handler, edit_workout_handler, get_workout_handler,
        goal_progress_handler, list_goals_handler, list_records_handler, log_workout_handler,
        rest::ApiDoc, state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{header::CONTENT_TYPE, HeaderName, Method},
    routing::{get, post},
    Router,
};
use fitlog_core::WorkoutService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Parser and the Core Service ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);
    let parser = Arc::new(OpenAiWorkoutParser::new(
        openai_client,
        config.parser_model.clone(),
    ));

    let settings = config.evaluation_settings();
    info!(
        "Evaluating goals with pace tolerance {} and {:?} readings",
        settings.pace_tolerance, settings.reading
    );
    let service = WorkoutService::new(store, settings);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState { service, parser });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-user-id")]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/workouts", post(log_workout_handler))
        .route(
            "/workouts/{id}",
            get(get_workout_handler)
                .put(edit_workout_handler)
                .delete(delete_workout_handler),
        )
        .route("/goals", get(list_goals_handler))
        .route("/goals/{id}", axum::routing::delete(delete_goal_handler))
        .route("/goals/{id}/progress", get(goal_progress_handler))
        .route("/personal-records", get(list_records_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
