//! **sigma-gateway** – Binary entrypoint for the Sigma data gateway: CLI
//! parsing, config-tree-driven startup, and the axum HTTP service.
//!
//! Startup order follows spec §4.6/§6: load `/{ENV}/{SERVICE}/**`,
//! `/{ENV}/dataSource/**`, `/{ENV}/Globals/**` from the config store,
//! select and probe a SQL dialect, build the repository, materialize
//! endpoints and schemas, start the enum catalog refresher, then serve.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sigma_config::ConfigStoreClient;
use sigma_dialect::DialectKind;
use sigma_filter::OperatorRegistry;
use sigma_registry::EndpointRegistry;
use sigma_repository::{DocumentRepository, PostgresRepository, SqliteRepository};
use sigma_schema::{EnumCatalogHandle, SchemaRegistry};

use sigma_gateway::app;
use sigma_gateway::state::AppState;

//─────────────────────────────
//  CLI structure
//─────────────────────────────

#[derive(Parser)]
#[command(name = "sigma-gateway")]
#[command(about = "Sigma configuration-driven data gateway")]
#[command(version)]
struct Cli {
    /// Environment name, root of every config path (`/{ENV}/...`).
    #[arg(long, env = "ENV")]
    env: String,

    /// Service name, second path segment under `/{ENV}/{SERVICE}/...`.
    #[arg(long, env = "SERVICE")]
    service: String,

    /// Root directory the config-tree client watches (spec §4.6 OQ-2:
    /// stands in for the ZooKeeper connection string `spec.md` names).
    #[arg(long, env = "CONFIG_STORE_URL")]
    config_store_url: String,

    /// Overrides SQL dialect inference from the database URL.
    #[arg(long, env = "DATABASE_TYPE")]
    database_type: Option<String>,

    /// TOML file for settings not exposed on the config tree (pool
    /// size, statement timeout, enum refresh default, bind port).
    #[arg(long, env = "SIGMA_CONFIG_FILE", default_value = "config/sigma.toml")]
    config_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "SIGMA_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Identity `current_auditor()` reports for every request on this
    /// instance (spec §6 "Auditor identity ... deterministic per
    /// request").
    #[arg(long, env = "SIGMA_AUDITOR_NAME")]
    auditor_name: Option<String>,
}

//─────────────────────────────
//  Ambient settings (config crate, not config-tree)
//─────────────────────────────

#[derive(Debug, Deserialize)]
struct Settings {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_pool_size")]
    db_pool_size: u32,
    #[serde(default = "default_statement_timeout_ms")]
    statement_timeout_ms: u64,
    #[serde(default = "default_enum_refresh_seconds")]
    enum_refresh_default_seconds: u64,
}

fn default_port() -> u16 {
    8080
}
fn default_pool_size() -> u32 {
    10
}
fn default_statement_timeout_ms() -> u64 {
    30_000
}
fn default_enum_refresh_seconds() -> u64 {
    60
}

fn load_settings(path: &str) -> Result<Settings> {
    let source = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("SIGMA").separator("__"))
        .build()
        .with_context(|| format!("failed to build settings layer from {path}"))?;
    source.try_deserialize().context("failed to parse settings")
}

//─────────────────────────────
//  Main
//─────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting sigma-gateway");

    let settings = load_settings(&cli.config_file)?;

    let store = sigma_config::FsConfigStore::open(cli.config_store_url.as_str())
        .with_context(|| format!("failed to open config store at {}", cli.config_store_url))?;

    let service_root = format!("/{}/{}", cli.env, cli.service);
    let datasource_root = format!("/{}/dataSource", cli.env);
    let globals_root = format!("/{}/Globals", cli.env);

    let api_prefix = read_required_string(&store, &format!("{service_root}/apiPrefix")).await?;

    let database_url = build_database_url(&store, &datasource_root).await?;
    let dialect_kind = DialectKind::resolve(cli.database_type.as_deref(), &database_url)?;

    let repository: Arc<dyn DocumentRepository> = match dialect_kind {
        DialectKind::Postgres => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.db_pool_size)
                .acquire_timeout(Duration::from_millis(settings.statement_timeout_ms))
                .connect(&database_url)
                .await
                .context("failed to connect to Postgres")?;
            Arc::new(PostgresRepository::new(pool))
        }
        DialectKind::Sqlite => {
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(settings.db_pool_size)
                .connect(&database_url)
                .await
                .context("failed to connect to Sqlite")?;
            Arc::new(SqliteRepository::new(pool))
        }
    };
    repository.ensure_schema().await.context("failed to ensure repository schema")?;
    info!(dialect = ?dialect_kind, "repository ready");

    let endpoints_root = format!("{service_root}/endpoints");
    let endpoint_registry = Arc::new(EndpointRegistry::new(&store, &api_prefix, &endpoints_root));

    let schema_registry = Arc::new(SchemaRegistry::default());
    let schemas_root = format!("{service_root}/schemas");
    load_schemas(&store, &schema_registry, &schemas_root).await?;

    let enum_url = read_optional_string(&store, &format!("{datasource_root}/enumURL")).await;
    let refresh_seconds = read_optional_string(&store, &format!("{globals_root}/EnumRefreshIntervalSeconds"))
        .await
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(settings.enum_refresh_default_seconds);
    let fail_on_enum_load_failure = read_optional_string(&store, &format!("{globals_root}/FailOnEnumLoadFailure"))
        .await
        .map(|raw| raw == "true")
        .unwrap_or(false);

    // Everything above needed direct `&FsConfigStore` reads; the reload
    // loop instead needs a trait object it can hold for the program's
    // lifetime, so the store moves into one only now.
    let store: Arc<dyn ConfigStoreClient> = Arc::new(store);
    let _ = tokio::spawn(Arc::clone(&endpoint_registry).run_reload_loop(Arc::clone(&store), api_prefix.clone(), endpoints_root.clone()));

    let enum_catalog = Arc::new(EnumCatalogHandle::new(fail_on_enum_load_failure));
    if let Some(enum_url) = enum_url {
        let client = reqwest::Client::new();
        let _ = Arc::clone(&enum_catalog).spawn_refresher(client, enum_url, Duration::from_secs(refresh_seconds));
    } else {
        warn!("no enumURL configured; enum catalog will stay empty");
    }

    let auditor_name = cli.auditor_name.clone().unwrap_or_else(|| cli.service.clone());
    let current_auditor: Arc<dyn Fn() -> String + Send + Sync> = Arc::new(move || auditor_name.clone());

    let state = AppState {
        repository,
        operators: Arc::new(OperatorRegistry::default()),
        endpoints: endpoint_registry,
        schemas: schema_registry,
        enum_catalog,
        current_auditor,
        api_prefix,
    };

    let app = app::build_router(state, Instant::now());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", settings.port))
        .await
        .with_context(|| format!("failed to bind to port {}", settings.port))?;
    info!(port = settings.port, "sigma-gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("sigma-gateway stopped");
    Ok(())
}

//─────────────────────────────
//  Startup helpers
//─────────────────────────────

async fn read_required_string(store: &sigma_config::FsConfigStore, path: &str) -> Result<String> {
    let bytes = store
        .read(path)
        .await
        .with_context(|| format!("error reading {path}"))?
        .with_context(|| format!("required config value missing: {path}"))?;
    String::from_utf8(bytes).with_context(|| format!("{path} is not valid UTF-8"))
}

async fn read_optional_string(store: &sigma_config::FsConfigStore, path: &str) -> Option<String> {
    let bytes = store.read(path).await.ok().flatten()?;
    String::from_utf8(bytes).ok()
}

async fn build_database_url(store: &sigma_config::FsConfigStore, datasource_root: &str) -> Result<String> {
    let database_root = format!("{datasource_root}/database");
    let mut fields = HashMap::new();
    for field in ["type", "host", "port", "name", "user", "password", "path"] {
        if let Ok(Some(bytes)) = store.read(&format!("{database_root}/{field}")).await {
            fields.insert(field, String::from_utf8(bytes).unwrap_or_default());
        }
    }

    let kind = fields.get("type").map(String::as_str).unwrap_or("postgres");
    match kind.to_ascii_lowercase().as_str() {
        "sqlite" | "h2" => {
            let path = fields.get("path").cloned().unwrap_or_else(|| "sigma.db".to_string());
            Ok(format!("sqlite://{path}"))
        }
        _ => {
            let host = fields.get("host").cloned().unwrap_or_else(|| "localhost".to_string());
            let port = fields.get("port").cloned().unwrap_or_else(|| "5432".to_string());
            let name = fields.get("name").cloned().unwrap_or_else(|| "sigma".to_string());
            let user = fields.get("user").cloned().unwrap_or_else(|| "sigma".to_string());
            let password = fields.get("password").cloned().unwrap_or_default();
            Ok(format!("postgres://{user}:{password}@{host}:{port}/{name}"))
        }
    }
}

/// Populate `registry` from every leaf under `schemas_root`, each one a
/// raw JSON Schema document (spec config tree: `.../schemas/{name} →
/// JSON Schema body`). A malformed schema is logged and skipped rather
/// than aborting startup, matching `materialize_endpoints`'s policy for
/// malformed endpoints.
async fn load_schemas(store: &sigma_config::FsConfigStore, registry: &SchemaRegistry, schemas_root: &str) -> Result<()> {
    let names = store.children(schemas_root).await.unwrap_or_default();
    let mut loaded = 0;
    for name in names {
        let path = format!("{schemas_root}/{name}");
        let Some(bytes) = store.read(&path).await.unwrap_or(None) else {
            continue;
        };
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(document) => {
                registry.register(name.clone(), document);
                loaded += 1;
            }
            Err(e) => warn!(schema = %name, error = %e, "skipping malformed schema document"),
        }
    }
    info!(count = loaded, "loaded schemas");
    Ok(())
}

fn init_logging(log_level: &str) {
    let directive = format!(
        "sigma_gateway={level},sigma_registry={level},sigma_repository={level},sigma_schema={level},sigma_filter={level},sigma_config={level}",
        level = log_level
    );
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(directive))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
