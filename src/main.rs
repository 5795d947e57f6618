use dotenvy::dotenv;
use eventledger::{
    api::{self, AppState},
    config::{self, database},
    core::user,
    errors::Result,
};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal: env vars can be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = config::settings::load_app_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    info!("Configuration loaded.");

    // 4. Connect and create tables
    let db = database::connect(&app_config.database.url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed the first administrator
    if let Ok(email) = env::var("ADMIN_EMAIL") {
        let admin = user::ensure_admin(&db, &email)
            .await
            .inspect_err(|e| error!("Failed to seed admin {}: {}", email, e))?;
        info!(user_id = admin.id, "Admin account ready.");
    }

    // 6. Serve the API
    api::serve(AppState::new(db, app_config)).await
}
