use personal_assistant_orchestrator::api::start_server;
use personal_assistant_orchestrator::router::create_default_router;
use personal_assistant_orchestrator::store::JsonStore;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    if std::env::var("GEMINI_API_KEY").is_err() {
        eprintln!("⚠️  GEMINI_API_KEY not set in .env");
        eprintln!("📌 Tracker requests will answer with a configuration error");
    }

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 Personal Assistant - API Server");
    info!("📍 Port: {}", api_port);

    let store = Arc::new(JsonStore::open_default()?);
    let router = Arc::new(create_default_router(store)?);

    info!("✅ Router initialized");
    info!("📡 Starting API server...");

    start_server(router, api_port).await?;

    Ok(())
}
