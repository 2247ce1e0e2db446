use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dbcluster_operator::{
    controller,
    crd::{DatabaseBackup, DatabaseCluster},
    Error,
};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version information
    Version,
    /// Show the deployments and backups managed in a namespace
    Info(InfoArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Deadline in seconds for every secret store call
    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value_t = 30)]
    store_timeout_secs: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Address of the health and metrics endpoint
    #[cfg(feature = "rest-api")]
    #[arg(long, env = "PROBE_BIND_ADDR", default_value = dbcluster_operator::rest_api::DEFAULT_BIND_ADDR)]
    bind_addr: std::net::SocketAddr,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Namespace to inspect
    #[arg(long, env = "OPERATOR_NAMESPACE", default_value = "default")]
    namespace: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("DBCluster Operator v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Info(info_args) => run_info(info_args).await,
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

async fn run_info(args: InfoArgs) -> Result<(), Error> {
    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    let clusters: kube::Api<DatabaseCluster> = kube::Api::namespaced(client.clone(), &args.namespace);
    let backups: kube::Api<DatabaseBackup> = kube::Api::namespaced(client, &args.namespace);
    let cluster_count = clusters
        .list(&Default::default())
        .await
        .map_err(Error::KubeError)?
        .items
        .len();
    let backup_count = backups
        .list(&Default::default())
        .await
        .map_err(Error::KubeError)?
        .items
        .len();

    println!("Managed deployments: {}", cluster_count);
    println!("Managed backups: {}", backup_count);
    Ok(())
}

fn init_tracing(json_logs: bool) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);
    if json_logs {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    init_tracing(args.json_logs);

    info!(
        "Starting DBCluster Operator v{}",
        env!("CARGO_PKG_VERSION")
    );

    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    info!("Connected to Kubernetes cluster");

    let state = Arc::new(controller::ControllerState {
        client,
        store_timeout: Duration::from_secs(args.store_timeout_secs),
    });

    #[cfg(feature = "rest-api")]
    {
        let addr = args.bind_addr;
        tokio::spawn(async move {
            if let Err(e) = dbcluster_operator::rest_api::run_server(addr).await {
                tracing::error!("Probe server error: {:?}", e);
            }
        });
    }

    tokio::try_join!(
        controller::run_controller(Arc::clone(&state)),
        controller::run_backup_controller(state),
    )?;

    info!("Controllers stopped");
    Ok(())
}
