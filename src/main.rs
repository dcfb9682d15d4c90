//! `sso` binary: runs the HTTP gateway and offers admin commands over the
//! same database.
//!
//! ```bash
//! sso serve --config ./sso.toml
//! sso migrate --storage-path ./storage/sso.db
//! sso tenant add --name web --secret "$WEB_SECRET"
//! sso user set-admin --id 1
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sso::auth::{AuthService, PasswordHasher, TokenIssuer};
use sso::config::Config;
use sso::gateway::{self, AppState};
use sso::storage::SqliteStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "sso", version, about = "Credential-based single sign-on service")]
struct Cli {
    /// Config file (falls back to SSO_CONFIG_PATH, then the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP gateway until SIGINT/SIGTERM
    Serve,
    /// Apply pending schema migrations
    Migrate {
        #[arg(long)]
        storage_path: Option<PathBuf>,
        #[arg(long)]
        migrations_table: Option<String>,
    },
    /// Manage tenants
    Tenant {
        #[command(subcommand)]
        action: TenantAction,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Debug, Subcommand)]
enum TenantAction {
    /// Register a tenant and print its id
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        secret: String,
    },
}

#[derive(Debug, Subcommand)]
enum UserAction {
    /// Grant (or with --revoke, remove) the admin flag
    SetAdmin {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        revoke: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    sso::logging::init(config.env);

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Migrate {
            storage_path,
            migrations_table,
        } => {
            if let Some(path) = storage_path {
                config.storage_path = path;
            }
            if let Some(table) = migrations_table {
                config.storage.migrations_table = table;
            }
            migrate(&config)
        }
        Command::Tenant {
            action: TenantAction::Add { name, secret },
        } => {
            let store = open_store(&config)?;
            let id = store
                .create_tenant(&name, &secret)
                .with_context(|| format!("failed to add tenant '{name}'"))?;
            println!("{id}");
            Ok(())
        }
        Command::User {
            action: UserAction::SetAdmin { id, revoke },
        } => {
            let store = open_store(&config)?;
            store
                .set_admin(id, !revoke)
                .with_context(|| format!("failed to update user {id}"))?;
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    let store = Arc::new(open_store(&config)?);
    let hasher = PasswordHasher::new(config.password.rounds)
        .context("failed to initialise password hasher")?;

    let span = tracing::info_span!("sso", env = ?config.env);
    let auth = AuthService::new(
        store.clone(),
        store,
        TokenIssuer::new(),
        hasher,
        config.token_ttl(),
        span,
    );

    tracing::info!(
        env = ?config.env,
        storage = %config.storage_path.display(),
        token_ttl_secs = config.token_ttl_secs,
        "starting sso"
    );

    let state = AppState::new(Arc::new(auth), config.gateway.request_timeout());
    gateway::run_gateway(
        &config.gateway.host,
        config.gateway.port,
        state,
        gateway::shutdown_signal(),
    )
    .await
}

fn migrate(config: &Config) -> Result<()> {
    let store = SqliteStore::open_unmigrated(&config.storage_path, &config.storage)
        .with_context(|| format!("failed to open {}", config.storage_path.display()))?;
    let report = store
        .migrate(&config.storage.migrations_table)
        .context("migration failed")?;

    if report.is_up_to_date() {
        println!("no migrations to apply (version {})", report.current_version);
    } else {
        println!(
            "applied migrations {:?}, now at version {}",
            report.applied, report.current_version
        );
    }
    Ok(())
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.storage_path, &config.storage)
        .with_context(|| format!("failed to open {}", config.storage_path.display()))
}
