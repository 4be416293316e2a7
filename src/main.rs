use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kickstart_store::api::{self, AppState, SecurityConfig};
use kickstart_store::config::Config;
use kickstart_store::db::Database;

#[derive(Parser)]
#[command(name = "ksstore")]
#[command(about = "Kickstart profile, tree and session store")]
struct Cli {
    /// Database file (overrides the config file)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port for HTTP API
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Create or upgrade the database schema
    Migrate,
    /// Inspect kickstart trees
    Tree {
        #[command(subcommand)]
        command: TreeCommands,
    },
    /// Manage kickstart sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Inspect kickstart command names
    Commands {
        #[command(subcommand)]
        command: CommandNameCommands,
    },
}

#[derive(Subcommand)]
enum TreeCommands {
    /// Print the tree an org sees under a label
    Show {
        #[arg(long)]
        org: i64,
        label: String,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Fail pending sessions of removed actions
    Fail {
        #[arg(long = "action", required = true)]
        actions: Vec<i64>,
        #[arg(long = "server", required = true)]
        servers: Vec<i64>,
    },
}

#[derive(Subcommand)]
enum CommandNameCommands {
    /// List command names available to a profile
    List {
        #[arg(long)]
        org: i64,
        #[arg(long)]
        profile: i64,
        /// Include basic options
        #[arg(long)]
        all: bool,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "kickstart_store=debug,tower_http=debug".into()),
    );

    // Logs go to stderr so command output on stdout stays clean.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(config: &Config) -> anyhow::Result<Database> {
    let path = config.database_path()?;
    let db = Database::open(path.clone())
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    db.migrate().context("Failed to migrate database")?;
    Ok(db)
}

async fn serve(config: &Config, port: u16) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let app = api::create_router_with_state(
        AppState::new(db),
        SecurityConfig::from_config(config),
    );

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Kickstart store listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = Config::load();
    if let Some(path) = cli.database {
        config.database_path = Some(path);
    }

    match cli.command {
        Some(Commands::Serve { port }) => {
            let port = port.unwrap_or_else(|| config.port());
            serve(&config, port).await?;
        }
        Some(Commands::Migrate) => {
            open_database(&config)?;
            println!("Database is up to date");
        }
        Some(Commands::Tree {
            command: TreeCommands::Show { org, label },
        }) => {
            let db = open_database(&config)?;
            let tree = db
                .lookup_tree_by_label(&label, org)?
                .with_context(|| format!("No tree labeled {label} for org {org}"))?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
        Some(Commands::Sessions {
            command: SessionCommands::Fail { actions, servers },
        }) => {
            let db = open_database(&config)?;
            let actions: HashSet<i64> = actions.into_iter().collect();
            let servers: HashSet<i64> = servers.into_iter().collect();
            let failed = db.fail_kickstart_sessions(&actions, &servers)?;
            println!("Failed {failed} kickstart session(s)");
        }
        Some(Commands::Commands {
            command: CommandNameCommands::List { org, profile, all },
        }) => {
            let db = open_database(&config)?;
            let profile = db
                .lookup_profile_by_id_and_org(org, profile)?
                .with_context(|| format!("No profile {profile} in org {org}"))?;
            let names = if all {
                db.lookup_all_command_names(&profile)?
            } else {
                db.lookup_command_names(&profile)?
            };
            for name in names {
                println!("{}", name.name);
            }
        }
        None => {
            let port = config.port();
            serve(&config, port).await?;
        }
    }

    Ok(())
}
