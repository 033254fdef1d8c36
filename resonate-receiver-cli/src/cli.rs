use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use resonate_receiver_controls::{adapter::connection_url, identity::IdentityStore};
use resonate_receiver_database::Database;
use resonate_receiver_models::ServerTarget;
use snafu::prelude::*;
use tracing::debug;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long)]
    /// Log level
    verbosity: Option<tracing::Level>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set configuration options
    Config {
        #[clap(subcommand)]
        command: ConfigCommands,
    },
    /// Print the identifier this receiver presents to servers.
    ClientId,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Save the server to connect to.
    Server {
        hostname: String,
        port: u16,
        #[clap(short, long)]
        /// Display name for the server.
        name: Option<String>,
    },
    /// Forget the saved server.
    ClearServer,
    /// Turn server auto-discovery on or off.
    AutoDiscovery {
        #[clap(value_enum)]
        state: Toggle,
    },
    /// Show the saved configuration.
    Show,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{error}"))]
    DatabaseError { error: String },
    #[snafu(display("{error}"))]
    ConfigurationError { error: String },
}

impl From<resonate_receiver_database::Error> for Error {
    fn from(error: resonate_receiver_database::Error) -> Self {
        Error::DatabaseError {
            error: error.to_string(),
        }
    }
}

impl From<resonate_receiver_controls::error::Error> for Error {
    fn from(error: resonate_receiver_controls::error::Error) -> Self {
        Error::ConfigurationError {
            error: error.to_string(),
        }
    }
}

pub async fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_target(false)
        .compact()
        .init();

    let database = Database::new().await?;

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Server {
                hostname,
                port,
                name,
            } => {
                let name = name.filter(|name| !name.trim().is_empty());
                let target = ServerTarget::new(hostname.trim(), port, name);
                let url = connection_url(&target)?;
                debug!(%url, "server validated");

                database.set_server_target(&target).await?;

                println!("Server saved: {}", target.display_name());
                Ok(())
            }
            ConfigCommands::ClearServer => {
                database.clear_server_target().await?;

                println!("Server cleared.");
                Ok(())
            }
            ConfigCommands::AutoDiscovery { state } => {
                let enabled = matches!(state, Toggle::On);
                database.set_auto_discovery(enabled).await?;

                println!(
                    "Auto-discovery {}.",
                    if enabled { "enabled" } else { "disabled" }
                );
                Ok(())
            }
            ConfigCommands::Show => {
                match database.get_server_target().await? {
                    Some(target) => {
                        println!("Server: {} ({})", target.display_name(), target.address())
                    }
                    None => println!("Server: not set"),
                }

                let auto_discovery = database.get_auto_discovery().await?;
                println!(
                    "Auto-discovery: {}",
                    if auto_discovery { "on" } else { "off" }
                );
                Ok(())
            }
        },
        Commands::ClientId => {
            let identity = IdentityStore::new(Arc::new(database));
            println!("{}", identity.current_client_id().await?);
            Ok(())
        }
    }
}
