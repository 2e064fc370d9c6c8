//! notisync-migrate - Main entry point.
//!
//! Applies, reverts and verifies the `user_rules` schema history against
//! PostgreSQL, configured from the same environment as the NotiSync services.

use clap::Parser;
use notisync_schema::cli::{Cli, Command};
use notisync_schema::config::{InvalidSetting, Settings};
use notisync_schema::db::{MemoryTarget, Migrator, PgTarget, SchemaInspector, connect};
use notisync_schema::error::{SchemaError, SchemaResult};
use notisync_schema::migrations::catalog::{RULE_TYPE_CHECK, USER_RULES};
use notisync_schema::migrations::sql_check::validate_ddl;
use notisync_schema::migrations::{self, Direction, schema_at};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(log_level: &str, json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // stdout carries command output
    if json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; the process environment still applies
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let (settings, invalid) = Settings::from_env();

    init_tracing(
        &settings.server.log_level,
        cli.json_logs || settings.server.is_production(),
    );

    invalid.iter().for_each(InvalidSetting::log);

    info!(
        environment = %settings.server.environment,
        "Starting notisync-migrate v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run(&cli, &settings).await {
        match e.suggestion() {
            Some(suggestion) => error!(error = %e, suggestion = %suggestion, "Command failed"),
            None => error!(error = %e, "Command failed"),
        }
        return Err(e.into());
    }

    Ok(())
}

async fn run(cli: &Cli, settings: &Settings) -> SchemaResult<()> {
    match &cli.command {
        Command::Config => print_json(&settings.redacted()),
        Command::Sql { version, down } => {
            let migration = migrations::find(*version).ok_or_else(|| {
                SchemaError::invalid_input(format!("Unknown migration version {}", version))
            })?;
            let direction = if *down { Direction::Down } else { Direction::Up };
            print!("{}", migration.sql(direction));
            Ok(())
        }
        Command::Plan { from, to } => plan(*from, *to).await,
        Command::Verify => {
            verify_offline()?;
            let mut migrator = Migrator::new(PgTarget::new(open_pool(cli, settings).await?));
            let current = migrator.current_version().await?;
            let expected = schema_at(current)?;
            let differences = SchemaInspector::verify(migrator.target().pool(), &expected).await?;
            print_json(&json!({
                "version": current,
                "differences": differences,
            }))?;
            if differences.is_empty() {
                info!(version = current, "Live schema matches the ledger version");
                Ok(())
            } else {
                Err(SchemaError::drift(format!(
                    "{} difference(s) between the live schema and version {}",
                    differences.len(),
                    current
                )))
            }
        }
        Command::Status => {
            let mut migrator = Migrator::new(PgTarget::new(open_pool(cli, settings).await?));
            print_json(&migrator.status().await?)
        }
        Command::Up { to } => {
            let mut migrator = Migrator::new(PgTarget::new(open_pool(cli, settings).await?));
            print_json(&migrator.up(*to).await?)
        }
        Command::Down { to } => {
            let mut migrator = Migrator::new(PgTarget::new(open_pool(cli, settings).await?));
            print_json(&migrator.down(*to).await?)
        }
    }
}

async fn open_pool(cli: &Cli, settings: &Settings) -> SchemaResult<sqlx::PgPool> {
    let url = match &cli.database_url {
        Some(url) => url.clone(),
        None => settings.database.postgres_url()?,
    };
    connect(&url, &cli.pool_options()).await
}

/// Replay the steps between two versions against an in-memory database.
async fn plan(from: u32, to: Option<u32>) -> SchemaResult<()> {
    let to = to.unwrap_or_else(migrations::latest_version);
    let ledger: Vec<(u32, &str)> = migrations::catalog()
        .iter()
        .take_while(|m| m.version <= from)
        .map(|m| (m.version, m.name))
        .collect();

    let mut migrator = Migrator::new(MemoryTarget::with_state(schema_at(from)?, &ledger));
    let steps = if to >= from {
        migrator.up(Some(to)).await?
    } else {
        migrator.down(Some(to)).await?
    };

    let target = migrator.into_inner();
    let allowed_rule_types = target
        .schema()
        .table(USER_RULES)
        .and_then(|t| t.checks.get(RULE_TYPE_CHECK))
        .map(|c| c.allowed_values.clone())
        .unwrap_or_default();

    print_json(&json!({
        "from": from,
        "to": to,
        "steps": steps,
        "allowed_rule_types": allowed_rule_types,
    }))
}

/// Parse every script and round-trip every migration without a database.
fn verify_offline() -> SchemaResult<()> {
    for migration in migrations::catalog() {
        validate_ddl(migration.sql(Direction::Up))?;
        validate_ddl(migration.sql(Direction::Down))?;
        migration.verify_round_trip(&schema_at(migration.version - 1)?)?;
        info!(migration = %migration.id(), "Scripts parse and round-trip");
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> SchemaResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| SchemaError::internal(format!("Failed to render JSON: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}
