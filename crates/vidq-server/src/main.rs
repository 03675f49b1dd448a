//! vidq HTTP server
//!
//! Answers natural-language questions about the video dataset over
//! `POST /answer`, backed by DuckDB.

use std::sync::Arc;
use tracing::info;
use vidq_duck::{count_records, ensure_schema, seed_from_path, DuckStore, QueryExecutor};
use vidq_schema::SchemaDescriptor;
use vidq_server::{build_translator, http, logging, Analyst, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables (.env holds secrets)
    dotenvy::dotenv().ok();

    let config_path = std::env::var("VIDQ_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load_or_default(&config_path)?;
    config.apply_logging_env();
    logging::init();

    info!(config = %config_path, "configuration loaded");

    let schema = match &config.translator.schema_path {
        Some(path) => SchemaDescriptor::from_yaml(&std::fs::read_to_string(path)?)?,
        None => SchemaDescriptor::builtin(),
    };
    info!(version = schema.version(), "schema descriptor loaded");
    let schema = Arc::new(schema);

    let store = if config.storage.in_memory() {
        DuckStore::open_in_memory()?
    } else {
        if let Some(parent) = std::path::Path::new(&config.storage.database).parent() {
            std::fs::create_dir_all(parent)?;
        }
        DuckStore::open(&config.storage.database)?
    };

    {
        let conn = store.connect()?;
        ensure_schema(&conn)?;
        if let Some(seed) = &config.storage.seed_path {
            let report = seed_from_path(&conn, seed)?;
            info!(path = %seed, ?report, "dataset loaded");
        }
        let (videos, snapshots) = count_records(&conn)?;
        info!(database = %config.storage.database, videos, snapshots, "storage ready");
    }

    let executor = QueryExecutor::new(Arc::new(store))
        .with_timeout(config.storage.query_timeout())
        .with_allowed_tables(schema.table_names());
    let translator = build_translator(&config.translator, schema)?;
    let analyst = Arc::new(Analyst::new(translator, executor));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, translator = analyst.translator_name(), "vidq server listening");

    axum::serve(listener, http::router(analyst)).await?;

    Ok(())
}
