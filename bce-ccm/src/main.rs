//! bce-ccm: drive the BCE cloud controller from the command line.
//!
//! Each command runs one convergence operation to completion and prints
//! the result as JSON. Ctrl-C aborts a running wait.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bce_ccm::{BceCloud, CloudConfig, Node, ServiceSpec};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// BCE cloud controller
#[derive(Parser, Debug)]
#[command(name = "bce-ccm", version, about)]
struct Args {
    /// Path to the JSON cloud config
    #[arg(long, default_value = "/etc/kubernetes/cloud.config")]
    cloud_config: PathBuf,

    /// Log at debug level
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or converge the load balancer of a service
    Ensure {
        /// Service as JSON (inline, or @path to read a file)
        #[arg(long)]
        service: String,

        /// Nodes as a JSON array (inline, or @path to read a file)
        #[arg(long, default_value = "[]")]
        nodes: String,
    },

    /// Delete the load balancer of a service
    Delete {
        #[arg(long, default_value = "default")]
        namespace: String,

        #[arg(long)]
        name: String,
    },

    /// Show the load balancer of a service
    Status {
        #[arg(long, default_value = "default")]
        namespace: String,

        #[arg(long)]
        name: String,
    },

    /// Manage VPC routes
    Routes {
        #[command(subcommand)]
        command: RouteCommands,
    },

    /// Show the addresses of a node
    NodeAddresses {
        /// Node name (its internal IP)
        #[arg(long)]
        node: String,
    },
}

#[derive(Subcommand, Debug)]
enum RouteCommands {
    /// List managed routes
    List,

    /// Route a pod CIDR to a node
    Create {
        #[arg(long)]
        cidr: String,

        /// Internal IP of the target node
        #[arg(long)]
        node: String,
    },

    /// Delete the managed routes of a CIDR
    Delete {
        #[arg(long)]
        cidr: String,
    },
}

fn read_json_arg(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path)),
        None => Ok(value.to_string()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = CloudConfig::load(&args.cloud_config)
        .with_context(|| format!("loading cloud config {}", args.cloud_config.display()))?;

    let default_filter = if args.debug || config.debug {
        "bce_ccm=debug,bce_client=debug"
    } else {
        "bce_ccm=info,bce_client=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cloud = BceCloud::from_config(config).context("creating BCE client")?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received SIGINT, cancelling");
            trigger.cancel();
        }
    });

    match args.command {
        Commands::Ensure { service, nodes } => {
            let service: ServiceSpec = serde_json::from_str(&read_json_arg(&service)?)
                .context("parsing --service")?;
            let nodes: Vec<Node> =
                serde_json::from_str(&read_json_arg(&nodes)?).context("parsing --nodes")?;
            let status = cloud.ensure_load_balancer(&service, &nodes, &cancel).await?;
            print_json(&status)?;
        }
        Commands::Delete { namespace, name } => {
            cloud
                .ensure_load_balancer_deleted(&ServiceSpec::named(&namespace, &name), &cancel)
                .await?;
            info!("Load balancer of {}/{} is gone", namespace, name);
        }
        Commands::Status { namespace, name } => {
            let status = cloud
                .get_load_balancer(&ServiceSpec::named(&namespace, &name))
                .await?;
            print_json(&status)?;
        }
        Commands::Routes { command } => match command {
            RouteCommands::List => print_json(&cloud.list_routes().await?)?,
            RouteCommands::Create { cidr, node } => {
                let change = cloud.create_route(&cidr, &node).await?;
                info!("Route {} -> {}: {:?}", cidr, node, change);
            }
            RouteCommands::Delete { cidr } => {
                let deleted = cloud.delete_route(&cidr).await?;
                info!("Deleted {} route(s) for {}", deleted, cidr);
            }
        },
        Commands::NodeAddresses { node } => print_json(&cloud.node_addresses(&node)?)?,
    }

    Ok(())
}
