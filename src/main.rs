use std::sync::Arc;
use tracing::{info, warn};

use meeting_rooms::backend::BackendClient;
use meeting_rooms::config::Config;
use meeting_rooms::repository::demo_repositories;
use meeting_rooms::web::{router, AppState, SharedMeetings, SharedTokens};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // .env file is optional
    let _ = dotenv::dotenv();

    info!("Starting meeting rooms service");

    let config = match Config::load() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            warn!("Failed to load configuration: {}", e);
            info!("Using default configuration with environment variables");
            let mut default_config = Config::default();
            if let Err(env_err) = default_config.apply_env_vars() {
                return Err(anyhow::anyhow!(
                    "Configuration error: {}. Original error: {}",
                    env_err,
                    e
                ));
            }
            if let Err(validation_err) = default_config.validate() {
                return Err(anyhow::anyhow!(
                    "Configuration validation failed: {}",
                    validation_err
                ));
            }
            default_config
        }
    };

    let (meetings, tokens): (SharedMeetings, SharedTokens) =
        match BackendClient::new_from_config(&config)? {
            Some(client) => {
                let client = Arc::new(client);
                let meetings: SharedMeetings = client.clone();
                let tokens: SharedTokens = client;
                (meetings, tokens)
            }
            None => {
                warn!("No meetings backend configured, serving in-memory demo data");
                let (meetings, tokens) = demo_repositories();
                let meetings: SharedMeetings = Arc::new(meetings);
                let tokens: SharedTokens = Arc::new(tokens);
                (meetings, tokens)
            }
        };

    let app = router(AppState::new(meetings, tokens));

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server running on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
