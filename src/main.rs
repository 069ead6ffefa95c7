use anyhow::Result;
use clap::{Parser, Subcommand};
use sourcetrack::config::AppConfig;
use sourcetrack::server::{self, MigrateDirection};
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[clap(short, long, env = "PORT", default_value = "3000")]
        port: u16,
        #[clap(short, long, env = "DATABASE_URL", default_value = "sourcetrack.db")]
        database: String,
        #[clap(long, env = "CORS_ORIGIN")]
        cors_origin: Option<String>,
        #[command(flatten)]
        config: AppConfig,
    },
    /// Apply or roll back schema migrations
    Migrate {
        #[clap(subcommand)]
        direction: MigrateDirection,
        #[clap(short, long, env = "DATABASE_URL", default_value = "sourcetrack.db")]
        database: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Commands::Serve {
            port,
            database,
            cors_origin,
            config,
        } => {
            info!("Starting server on port {}", port);
            server::start_server(port, &database, cors_origin.as_deref(), config).await?;
        }
        Commands::Migrate {
            direction,
            database,
        } => {
            server::migrate_database(&database, direction).await?;
        }
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_deref()
        .unwrap_or("info")
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "{},sqlx=warn,sea_orm_migration=warn",
            log_level
        )))
        .without_time()
        .init();
}
