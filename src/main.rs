use clap::Parser;
use emudb::storage::{Row, Schema};
use emudb::{create_router, BlobStore, CancellationToken, Database, EmulatorConfig, FieldType};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "emudb-sandbox")]
#[command(about = "In-memory document database emulator for sandbox deployments", long_about = None)]
struct Args {
    /// Directory holding emudb.toml and .env
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Skip creating the demo `teams` container
    #[arg(long)]
    no_seed: bool,
}

/// Demo row type served by the sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Team {
    id: String,
    name: String,
    email_address: String,
    member_count: i32,
    active: bool,
    founded: Option<chrono::DateTime<chrono::Utc>>,
}

impl Row for Team {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Team>> = Lazy::new(|| {
            Schema::builder()
                .column("id", FieldType::String, |t: &Team| t.id.clone().into())
                .column("name", FieldType::String, |t: &Team| t.name.clone().into())
                .column("emailAddress", FieldType::String, |t: &Team| {
                    t.email_address.clone().into()
                })
                .column("memberCount", FieldType::I32, |t: &Team| t.member_count.into())
                .column("active", FieldType::Bool, |t: &Team| t.active.into())
                .column("founded", FieldType::DateTime, |t: &Team| t.founded.into())
                .build()
        });
        &SCHEMA
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = EmulatorConfig::load(&args.config_dir)?;
    if let Some(port) = args.port {
        config.port = port;
    }

    emudb::logging::init_tracing(&config.log_filter);

    let database = Database::with_config(&config);
    if !args.no_seed {
        let teams = database.create_container_if_not_exists::<Team>("teams", "/emailAddress")?;
        let cancel = CancellationToken::new();
        teams.upsert_item(
            Team {
                id: uuid::Uuid::new_v4().to_string(),
                name: "Sandbox Team".to_string(),
                email_address: "sandbox@example.com".to_string(),
                member_count: 3,
                active: true,
                founded: Some(chrono::Utc::now()),
            },
            &cancel,
        )?;
        teams.create_snapshot("seed", &cancel)?;
        tracing::info!("Seeded container 'teams' with snapshot 'seed'");
    }

    let app = create_router(database, BlobStore::new());

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Sandbox listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
