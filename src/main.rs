use std::path::Path;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tower_http::trace::TraceLayer;

use tours_api::cli::{Cli, Command};
use tours_api::config::{Config, Environment};
use tours_api::error::AppError;
use tours_api::logging::init_logging;
use tours_api::model::TourInput;
use tours_api::repository::MongoTourStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env()
        .and_then(|config| config.with_overrides(&cli))
        .map_err(AppError::Config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            exit(1);
        });
    Environment::set(config.environment);

    if let Err(err) = run(config, cli.command).await {
        tracing::error!("{}", err);
        exit(1);
    }
}

async fn run(config: Config, command: Option<Command>) -> Result<(), AppError> {
    let database = tours_api::db::connect(&config.database_uri).await?;
    let store = MongoTourStore::new(&database);
    store.ensure_indexes().await?;

    match command {
        Some(Command::Import { file }) => import(&store, &file).await,
        Some(Command::Purge) => {
            let removed = store.purge().await?;
            tracing::info!("Deleted {} tours", removed);
            Ok(())
        }
        None => serve(config, Arc::new(store)).await,
    }
}

/// Seed the collection from a JSON array of tour objects. Each entry
/// goes through the same validation as the create endpoint.
async fn import(store: &MongoTourStore, file: &Path) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(file)
        .map_err(|err| AppError::Config(format!("Cannot read {}: {}", file.display(), err)))?;
    let inputs: Vec<TourInput> =
        serde_json::from_str(&raw).map_err(|err| AppError::Parse(err.to_string()))?;

    let mut documents = Vec::with_capacity(inputs.len());
    for input in inputs {
        documents.push(input.into_document()?);
    }
    let inserted = store.import(documents).await?;
    tracing::info!("Imported {} tours", inserted);
    Ok(())
}

async fn serve(config: Config, store: tours_api::ToursState) -> Result<(), AppError> {
    let mut app = tours_api::app(store);
    if config.environment.is_development() {
        // request logging only in development
        app = app.layer(TraceLayer::new_for_http());
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .map_err(|err| AppError::Config(format!("Cannot bind port {}: {}", config.port, err)))?;
    tracing::info!("App is running on port {}", config.port);
    axum::serve(listener, app)
        .await
        .map_err(|err| AppError::Config(err.to_string()))
}
