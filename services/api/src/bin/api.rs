//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        db::DbAdapter, generator_llm::OpenAiGeneratorAdapter, session_file::FileSessionFlag,
        tutor_llm::OpenAiTutorAdapter,
    },
    config::Config,
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use study_assistant_core::{
    memory::{InMemoryChatRepository, InMemoryResourceRepository},
    ports::{ChatRepository, ResourceRepository},
    SystemClock,
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Choose Storage: Postgres when configured, otherwise in memory ---
    let (repo, chats): (Arc<dyn ResourceRepository>, Arc<dyn ChatRepository>) =
        match &config.database_url {
            Some(database_url) => {
                info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await?;
                let db_adapter = Arc::new(DbAdapter::new(db_pool));
                info!("Running database migrations...");
                db_adapter.run_migrations().await?;
                info!("Database migrations complete.");
                let repo: Arc<dyn ResourceRepository> = db_adapter.clone();
                let chats: Arc<dyn ChatRepository> = db_adapter;
                (repo, chats)
            }
            None => {
                warn!("DATABASE_URL is not set; resources will be kept in memory only.");
                let repo: Arc<dyn ResourceRepository> = Arc::new(InMemoryResourceRepository::new());
                let chats: Arc<dyn ChatRepository> = Arc::new(InMemoryChatRepository::new());
                (repo, chats)
            }
        };

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let generator = Arc::new(OpenAiGeneratorAdapter::new(
        openai_client.clone(),
        config.generation_model.clone(),
        config.generation_timeout,
    ));
    let tutor = Arc::new(OpenAiTutorAdapter::new(
        openai_client,
        config.tutor_model.clone(),
    ));
    let session = Arc::new(FileSessionFlag::new(config.session_flag_path.clone()));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        repo,
        chats,
        generator,
        tutor,
        session,
        Arc::new(SystemClock),
    ));

    // --- 5. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors);

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
