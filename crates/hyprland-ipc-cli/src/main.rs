//! hypripc CLI
//!
//! Query and watch a running Hyprland instance from the terminal.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use hyprland_ipc::{CommandRequest, Event, EventKind, Instance, InstanceSignature, JSON_FLAG};
use hyprland_ipc_config::{Config, LogLevel};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hypripc")]
#[command(about = "Talk to Hyprland over its IPC sockets")]
#[command(version)]
struct Cli {
    /// Path to configuration file [default: ~/.config/hyprland-ipc/config.kdl]
    #[arg(short, long)]
    config: Option<String>,

    /// Instance signature (overrides config and $HYPRLAND_INSTANCE_SIGNATURE)
    #[arg(short, long)]
    signature: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a raw command and print the reply
    Query {
        /// Command name, e.g. `clients` or `version`
        command: String,

        /// Arguments passed after the command
        args: Vec<String>,

        /// Ask for JSON output
        #[arg(short, long)]
        json: bool,
    },

    /// Run a dispatcher, e.g. `hypripc dispatch workspace 2`
    Dispatch {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List windows
    Windows,

    /// List workspaces
    Workspaces,

    /// List monitors
    Monitors,

    /// List the event names understood by `watch`
    Events,

    /// Print events as JSON lines until interrupted
    Watch {
        /// Only print this event (repeatable)
        #[arg(short, long = "event")]
        events: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let path: PathBuf = shellexpand::tilde(path).into_owned().into();
            hyprland_ipc_config::parse_config(&path)?
        }
        None => hyprland_ipc_config::load_config(&hyprland_ipc_config::default_config_path())?,
    };

    init_tracing(config.log_level);

    let signature = cli.signature.as_deref();
    match cli.command {
        Commands::Query {
            command,
            args,
            json,
        } => cmd_query(&build_instance(signature, &config)?, command, args, json).await,
        Commands::Dispatch { args } => cmd_dispatch(&build_instance(signature, &config)?, args).await,
        Commands::Windows => cmd_windows(&build_instance(signature, &config)?).await,
        Commands::Workspaces => cmd_workspaces(&build_instance(signature, &config)?).await,
        Commands::Monitors => cmd_monitors(&build_instance(signature, &config)?).await,
        Commands::Events => cmd_events(),
        Commands::Watch { events } => {
            cmd_watch(&build_instance(signature, &config)?, events, &config).await
        }
    }
}

fn init_tracing(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter())),
        )
        .init();
}

/// `--signature` wins over the config file, which wins over the environment
fn build_instance(signature: Option<&str>, config: &Config) -> miette::Result<Instance> {
    let signature = match signature.or(config.instance.signature.as_deref()) {
        Some(signature) => InstanceSignature::new(signature),
        None => InstanceSignature::from_env(),
    }
    .into_diagnostic()?;

    let mut builder = Instance::builder(signature).timeout(config.command.timeout);
    if let Some(dir) = &config.instance.runtime_dir {
        builder = builder.runtime_dir(dir);
    }
    Ok(builder.build())
}

async fn cmd_query(
    instance: &Instance,
    command: String,
    args: Vec<String>,
    json: bool,
) -> miette::Result<()> {
    let mut request = CommandRequest::new(command).args(args);
    if json {
        request = request.flag(JSON_FLAG);
    }

    let reply = instance.send(&request).await.into_diagnostic()?;
    println!("{}", reply.trim_end());
    Ok(())
}

async fn cmd_dispatch(instance: &Instance, args: Vec<String>) -> miette::Result<()> {
    instance.dispatch(args).await.into_diagnostic()
}

async fn cmd_windows(instance: &Instance) -> miette::Result<()> {
    let windows = instance.get_windows().await.into_diagnostic()?;

    for window in &windows {
        println!(
            "{:<16} ws {:<10} {:<20} {}",
            window.address, window.workspace.name, window.wm_class, window.title
        );
    }
    Ok(())
}

async fn cmd_workspaces(instance: &Instance) -> miette::Result<()> {
    let active = instance.get_active_workspace().await.into_diagnostic()?;
    let workspaces = instance.get_workspaces().await.into_diagnostic()?;

    for workspace in &workspaces {
        let marker = if workspace.id == active.id { "*" } else { " " };
        println!(
            "{} {:>4} {:<16} on {:<10} {} window(s)",
            marker, workspace.id, workspace.name, workspace.monitor, workspace.windows
        );
    }
    Ok(())
}

async fn cmd_monitors(instance: &Instance) -> miette::Result<()> {
    let monitors = instance.get_monitors().await.into_diagnostic()?;

    for monitor in &monitors {
        let marker = if monitor.focused { "*" } else { " " };
        println!(
            "{} {:>2} {:<10} {}x{}@{:.2} scale {} workspace {}",
            marker,
            monitor.id,
            monitor.name,
            monitor.width,
            monitor.height,
            monitor.refresh_rate,
            monitor.scale,
            monitor.active_workspace.name
        );
        if !monitor.description.is_empty() {
            println!("       {}", monitor.description);
        }
    }
    Ok(())
}

fn cmd_events() -> miette::Result<()> {
    for kind in EventKind::ALL {
        println!("{:<20} {} field(s)", kind.name(), kind.arity());
    }
    Ok(())
}

async fn cmd_watch(instance: &Instance, events: Vec<String>, config: &Config) -> miette::Result<()> {
    let names = if events.is_empty() {
        config.watch.events.clone()
    } else {
        events
    };

    let kinds = if names.is_empty() {
        EventKind::ALL.to_vec()
    } else {
        names
            .iter()
            .map(|name| {
                EventKind::from_name(name).ok_or_else(|| {
                    miette::miette!("Unknown event '{}', see `hypripc events`", name)
                })
            })
            .collect::<miette::Result<Vec<_>>>()?
    };

    let signals = instance.signals();
    let mut stream = futures::stream::select_all(
        kinds.iter().map(|kind| signals.signal(*kind).subscribe()),
    );

    let mut watch = instance.watch();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let ended = loop {
        tokio::select! {
            result = watch.finished() => break Some(result),
            _ = &mut ctrl_c => break None,
            Some(event) = stream.next() => print_event(&event)?,
        }
    };

    match ended {
        Some(result) => result.into_diagnostic(),
        None => {
            tracing::debug!("Interrupted, stopping event watch");
            watch.shutdown().await.into_diagnostic()
        }
    }
}

fn print_event(event: &Event) -> miette::Result<()> {
    let line = serde_json::to_string(event).into_diagnostic()?;
    println!("{}", line);
    Ok(())
}
