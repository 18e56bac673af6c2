//! `catmaid` - connector inspection and editing with undo/redo

mod config;
mod session;

use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catmaid_client::{
    spawn_logging_listener, CommandHistory, Connectors, HttpTransport, Permissions,
};

use config::{Args, Commands};
use session::{Session, SessionCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("catmaid={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let config = args.client_config();
    let transport = Arc::new(HttpTransport::new(config.clone())?);
    let connectors = Connectors::new(transport, Permissions::new());
    let _event_logger = spawn_logging_listener(connectors.events().clone());

    let permissions = connectors.fetch_permissions().await?;
    info!(url = %config.base_url, project = args.project, ?permissions, "Connected");

    match &args.command {
        Commands::Info { connector_id } => {
            let detail = connectors.info(args.project, *connector_id).await?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
        }
        command @ Commands::List { .. } => {
            let filter = command.filter().unwrap_or_default();
            let rows = connectors.list(args.project, &filter).await?;
            for row in rows {
                println!("{}", row);
            }
        }
        Commands::Session => {
            run_session(&connectors, &args, CommandHistory::from_config(&config)).await?;
        }
    }

    Ok(())
}

async fn run_session(
    connectors: &Connectors,
    args: &Args,
    history: CommandHistory,
) -> anyhow::Result<()> {
    let mut session = Session::new(connectors, args.project, history);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = match SessionCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("error: {}", e);
                continue;
            }
        };
        match session.run(command).await {
            Ok(Some(output)) => println!("{}", output),
            Ok(None) => break,
            Err(e) => match e.downcast_ref::<catmaid_client::ClientError>() {
                Some(client_error) => eprintln!("error: {}", client_error.user_message()),
                None => eprintln!("error: {:#}", e),
            },
        }
    }

    info!(commands = session.history().len(), "Session ended");
    Ok(())
}
