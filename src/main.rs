use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;

use kubesync::cluster::{ClusterMetadataStore, ClusterService, RefreshWorker, SyncClock};
use kubesync::config::Config;
use kubesync::credentials::{CredResolverConfig, CredResolverKind, CredResolverService};
use kubesync::network::{ClusterClient, CredResolverClient};
use kubesync::notify::{forward_errors, NotificationStore};
use kubesync::storage::SettingsStore;

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[derive(Parser)]
#[command(name = "kubesync")]
#[command(about = "Manage Kubernetes cluster credentials and metadata against a kubeconfig backend")]
struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend gRPC address, e.g. http://127.0.0.1:9090
    #[arg(short, long, global = true)]
    backend: Option<String>,

    /// Directory for client-side state
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Minutes before cached cluster metadata counts as stale
    #[arg(long, global = true)]
    resync_interval: Option<i64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Cluster metadata operations
    Clusters {
        #[command(subcommand)]
        cmd: ClustersCmd,
    },

    /// Credential resolver operations
    Cred {
        #[command(subcommand)]
        cmd: CredCmd,
    },

    /// Sync clock inspection
    Clock {
        #[command(subcommand)]
        cmd: ClockCmd,
    },
}

#[derive(Subcommand)]
enum ClustersCmd {
    /// Refresh and print the known clusters
    List {
        /// Sync with the backend even if the cached metadata is fresh
        #[arg(long)]
        force: bool,
    },

    /// Tell the backend to rebuild its cluster metadata cache now
    Sync,

    /// Periodically refresh cluster metadata until interrupted
    Watch {
        /// Seconds between refresh cycles
        #[arg(long, default_value_t = 60)]
        period_secs: u64,
    },
}

#[derive(Subcommand)]
enum CredCmd {
    /// List known credential resolvers
    List,

    /// Register or update a credential resolver
    Set {
        /// Cloud account id the resolver belongs to
        #[arg(long)]
        account_id: String,

        /// Infra vendor, e.g. AWS, Azure, Tencent
        #[arg(long)]
        infra_vendor: String,

        /// Human-readable account alias
        #[arg(long, default_value = "")]
        account_alias: String,

        /// Resolver kind: default, env, imds or profile
        #[arg(long, default_value = "default")]
        kind: String,

        /// Resolver attribute as key=value (repeatable)
        #[arg(long = "attr")]
        attrs: Vec<String>,
    },

    /// Delete a credential resolver by account id
    Delete {
        #[arg(long)]
        account_id: String,
    },

    /// Tell the backend to rediscover available credential resolvers
    Sync,
}

#[derive(Subcommand)]
enum ClockCmd {
    /// Show the persisted last-synced time and current staleness
    Show,

    /// Clear the persisted last-synced time
    Reset,
}

fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(backend) = &cli.backend {
        cfg.backend_address = backend.clone();
    }
    if let Some(dir) = &cli.data_dir {
        cfg.data_dir = dir.clone();
    }
    if let Some(minutes) = cli.resync_interval {
        cfg.resync_interval_minutes = minutes;
    }

    Ok(cfg)
}

fn open_clock(cfg: &Config) -> anyhow::Result<SyncClock> {
    let settings = SettingsStore::open(&cfg.data_dir.join("settings.json"))?;
    Ok(SyncClock::with_interval(
        Box::new(settings),
        cfg.resync_interval_minutes,
    ))
}

fn build_store(cfg: &Config) -> anyhow::Result<Arc<ClusterMetadataStore>> {
    let clock = open_clock(cfg)?;
    let service = Arc::new(ClusterClient::new(&cfg.backend_address));
    Ok(Arc::new(ClusterMetadataStore::new(service, clock)))
}

async fn clusters_list(cfg: &Config, force: bool) -> anyhow::Result<()> {
    let store = build_store(cfg)?;
    let sink = NotificationStore::new();
    let forwarder = tokio::spawn(forward_errors(store.subscribe_errors(), sink.clone()));

    store.refresh(force).await;

    let items = store.items().borrow().clone();
    println!("{:<40} {:<30} RESOLVERS", "CLUSTER", "STATUS");
    for item in &items {
        println!(
            "{:<40} {:<30} {}",
            item.metadata.cluster_name,
            format!("{:?}", item.status),
            item.data_resolvers.join(",")
        );
    }
    info!("{} clusters known to the backend", items.len());

    // Dropping the store closes the error channel and ends the forwarder.
    drop(store);
    forwarder.await?;
    for notification in sink.take_all() {
        eprintln!("warning [{}]: {}", notification.key, notification.message);
    }

    Ok(())
}

async fn clusters_sync(cfg: &Config) -> anyhow::Result<()> {
    let service = ClusterClient::new(&cfg.backend_address);
    service.sync_available_clusters().await?;

    let mut clock = open_clock(cfg)?;
    clock.mark_synced(Utc::now());
    info!("Backend cluster metadata sync complete");

    Ok(())
}

async fn clusters_watch(cfg: &Config, period_secs: u64) -> anyhow::Result<()> {
    let store = build_store(cfg)?;
    info!(
        "Watching cluster metadata on {} every {period_secs}s",
        cfg.backend_address
    );

    let worker = RefreshWorker::new(store, Duration::from_secs(period_secs));
    worker.run().await;

    Ok(())
}

async fn cred_list(cfg: &Config) -> anyhow::Result<()> {
    let client = CredResolverClient::new(&cfg.backend_address);
    let configs = client.get_cred_resolvers().await?;

    println!(
        "{:<16} {:<10} {:<16} {:<10} STATUS",
        "ACCOUNT", "VENDOR", "ALIAS", "KIND"
    );
    for config in &configs {
        println!(
            "{:<16} {:<10} {:<16} {:<10} {:?}",
            config.account_id,
            config.infra_vendor,
            config.account_alias,
            format!("{:?}", config.kind),
            config.status
        );
    }

    Ok(())
}

async fn cred_set(
    cfg: &Config,
    account_id: String,
    infra_vendor: String,
    account_alias: String,
    kind: String,
    attrs: Vec<String>,
) -> anyhow::Result<()> {
    let Some(kind) = CredResolverKind::parse(&kind) else {
        bail!("unknown resolver kind: {kind}");
    };

    let mut resolver_attributes = HashMap::new();
    for pair in &attrs {
        let parts: Vec<&str> = pair.splitn(2, '=').collect();
        if parts.len() != 2 {
            bail!("attribute must be key=value, got: {pair}");
        }
        resolver_attributes.insert(parts[0].to_string(), parts[1].to_string());
    }

    let config = CredResolverConfig {
        account_id,
        infra_vendor,
        account_alias,
        kind,
        resolver_attributes,
        status: Default::default(),
    };

    let client = CredResolverClient::new(&cfg.backend_address);
    client.set_cred_resolver(&config).await?;
    info!("Credential resolver {} registered", config.account_id);

    Ok(())
}

async fn cred_delete(cfg: &Config, account_id: &str) -> anyhow::Result<()> {
    let client = CredResolverClient::new(&cfg.backend_address);
    client.delete_cred_resolver(account_id).await?;
    info!("Credential resolver {account_id} deleted");

    Ok(())
}

async fn cred_sync(cfg: &Config) -> anyhow::Result<()> {
    let client = CredResolverClient::new(&cfg.backend_address);
    client.sync_available_cred_resolvers().await?;
    info!("Backend credential resolver sync complete");

    Ok(())
}

fn clock_show(cfg: &Config) -> anyhow::Result<()> {
    let clock = open_clock(cfg)?;

    match clock.last_synced() {
        Some(time) => println!("last synced: {}", time.to_rfc3339()),
        None => println!("last synced: never"),
    }
    println!("resync interval: {} min", clock.resync_interval_minutes());
    println!("stale: {}", clock.should_resync());

    Ok(())
}

fn clock_reset(cfg: &Config) -> anyhow::Result<()> {
    let mut clock = open_clock(cfg)?;
    clock.reset();
    info!("Sync clock reset; next refresh will sync with the backend");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let cfg = resolve_config(&cli)?;

    match cli.command {
        Command::Clusters { cmd } => match cmd {
            ClustersCmd::List { force } => clusters_list(&cfg, force).await?,
            ClustersCmd::Sync => clusters_sync(&cfg).await?,
            ClustersCmd::Watch { period_secs } => clusters_watch(&cfg, period_secs).await?,
        },
        Command::Cred { cmd } => match cmd {
            CredCmd::List => cred_list(&cfg).await?,
            CredCmd::Set {
                account_id,
                infra_vendor,
                account_alias,
                kind,
                attrs,
            } => cred_set(&cfg, account_id, infra_vendor, account_alias, kind, attrs).await?,
            CredCmd::Delete { account_id } => cred_delete(&cfg, &account_id).await?,
            CredCmd::Sync => cred_sync(&cfg).await?,
        },
        Command::Clock { cmd } => match cmd {
            ClockCmd::Show => clock_show(&cfg)?,
            ClockCmd::Reset => clock_reset(&cfg)?,
        },
    }

    Ok(())
}
