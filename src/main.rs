use std::sync::Arc;

use chrono::Local;
use color_eyre::eyre::Result;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::FmtSubscriber;
use visitbook_backend::{
    config::BackendConfig, delivery::LogCodeSender, http::HttpBackend, memory::InMemoryBackend,
    BookingBackend,
};
use visitbook_session::{config::SessionConfig, BookingSession};

mod console;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Load environment variables
    dotenv().ok();

    // Load configuration
    let backend_config = BackendConfig::from_env()?;
    let session_config = SessionConfig::from_env()?;

    // Initialize logging; stdout belongs to the console
    let subscriber = FmtSubscriber::builder()
        .with_max_level(session_config.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let backend: Arc<dyn BookingBackend> = if backend_config.is_remote() {
        info!("Using remote backend");
        Arc::new(HttpBackend::from_config(&backend_config)?)
    } else {
        info!("BACKEND_URL not set, using seeded in-memory backend");
        Arc::new(InMemoryBackend::seeded(Local::now().date_naive()))
    };

    let session = BookingSession::new(Arc::clone(&backend), Arc::new(LogCodeSender), &session_config);
    info!(session = %session.id(), "Starting visitbook console");

    console::run(session, backend).await
}
