use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use odonet_console::client::config::Config;
use odonet_console::client::watcher;
use odonet_console::commands::{
    ConfigCommand, ConfigureCommand, MoveCamCommand, NodeTarget, RouteCommand, ShellCommand,
    WebCommand,
};
use odonet_console::transport::http::HttpApi;
use odonet_console::utils;

#[derive(Parser)]
#[command(name = "odonet", version, about = "OdoNet Console (root server client)")]
struct AppCli {
    /// Config file path
    #[arg(short, long, default_value = "config.json", global = true)]
    config: String,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the root for updates and log them (default)
    Watch,
    /// Reroute a node through the mesh
    Route { id: String, route: String },
    /// Run a shell script on a node
    Shell { id: String, script: String },
    /// Push a JSON config file to a node
    Config { id: String, file: PathBuf },
    /// Reboot a node
    Reboot { id: String },
    /// Reload a node's software
    Reload { id: String },
    /// Clear all device records on the root
    Reset,
    /// Give a node a new single-character id
    Configure { id: String, new_id: String },
    /// Step a node's camera (up, down, left, right)
    MoveCam { id: String, cam: u8, dir: String },
    /// Download a file referenced by an update
    Fetch {
        path: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::logging::init();

    let args = AppCli::parse();
    let config = Config::from_file(&args.config)?;

    match args.command {
        None | Some(Commands::Watch) => watcher::run(config).await?,
        Some(Commands::Fetch { path, output }) => fetch(&config, &path, output).await?,
        Some(Commands::Route { id, route }) => {
            dispatch(&config, WebCommand::Route(RouteCommand::new(id, &route))).await?
        }
        Some(Commands::Shell { id, script }) => {
            dispatch(&config, WebCommand::Shell(ShellCommand::new(id, script))).await?
        }
        Some(Commands::Config { id, file }) => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading config payload {}", file.display()))?;
            let conf = serde_json::from_str(&raw).context("config payload is not valid JSON")?;
            dispatch(&config, WebCommand::Config(ConfigCommand { id, conf })).await?
        }
        Some(Commands::Reboot { id }) => {
            dispatch(&config, WebCommand::Reboot(NodeTarget { id })).await?
        }
        Some(Commands::Reload { id }) => {
            dispatch(&config, WebCommand::Reload(NodeTarget { id })).await?
        }
        Some(Commands::Reset) => dispatch(&config, WebCommand::Reset).await?,
        Some(Commands::Configure { id, new_id }) => {
            dispatch(
                &config,
                WebCommand::Configure(ConfigureCommand { id, new_id }),
            )
            .await?
        }
        Some(Commands::MoveCam { id, cam, dir }) => {
            dispatch(&config, WebCommand::MoveCam(MoveCamCommand { id, cam, dir })).await?
        }
    }

    Ok(())
}

async fn dispatch(config: &Config, command: WebCommand) -> Result<()> {
    command.validate()?;

    let api = HttpApi::new(&config.base_url, config.request_timeout())?;
    let subject = command.subject();
    let payload = command.payload()?;

    let result = api
        .send_command(subject, &payload)
        .await
        .with_context(|| format!("sending {subject} command"))?;

    if let Some(alert) = result.user_alert() {
        warn!(subject = %subject, alert = %alert, "server rejected command");
        eprintln!("alert: {alert}");
    } else {
        info!(subject = %subject, "command accepted");
    }

    Ok(())
}

async fn fetch(config: &Config, path: &str, output: Option<PathBuf>) -> Result<()> {
    let api = HttpApi::new(&config.base_url, config.request_timeout())?;
    let bytes = api
        .fetch_file(path)
        .await
        .with_context(|| format!("downloading {path}"))?;

    match output {
        Some(dest) => {
            tokio::fs::write(&dest, &bytes)
                .await
                .with_context(|| format!("writing {}", dest.display()))?;
            info!(path = %path, dest = %dest.display(), size = bytes.len(), "file saved");
        }
        None => {
            use std::io::Write;
            std::io::stdout()
                .write_all(&bytes)
                .context("writing to stdout")?;
        }
    }

    Ok(())
}
