use std::path::Path;
use std::sync::Arc;

use tablet_agent::config::AgentConfig;
use tablet_agent::metrics;
use tablet_agent::mysqld::StaticMysqlDaemon;
use tablet_agent::topo::MemoryTopoServer;
use tablet_agent::topo::Tablet;
use tablet_agent::utils::file_io::open_file_for_append;
use tablet_agent::utils::net::HostResolver;
use tablet_agent::utils::net::StaticResolver;
use tablet_agent::utils::net::SystemResolver;
use tablet_agent::AgentBuilder;
use tablet_agent::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config = AgentConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(config.tablet.uid, &config.log_dir)?;

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    if config.monitoring.prometheus_enabled {
        let port = config.monitoring.prometheus_port;
        tokio::spawn(metrics::start_server(port, graceful_rx.clone()));
    }

    // Standalone mode: the topology store lives in this process
    let topo = Arc::new(MemoryTopoServer::new());
    topo.create_tablet(Tablet {
        alias: config.tablet.alias(),
        keyspace: config.tablet.keyspace.clone(),
        shard: config.tablet.shard.clone(),
        tablet_type: config.tablet.target_tablet_type,
        ..Default::default()
    });

    let resolver: Arc<dyn HostResolver> = if config.tablet.hostname.is_empty() {
        Arc::new(SystemResolver)
    } else {
        // the advertised hostname may not be resolvable from this host
        Arc::new(
            StaticResolver::new(&config.tablet.hostname)
                .with_addr(&config.tablet.hostname, std::net::Ipv4Addr::LOCALHOST.into()),
        )
    };

    let agent = AgentBuilder::new(config.clone(), topo)
        .mysqld(Arc::new(StaticMysqlDaemon::new(config.tablet.mysql_port)))
        .resolver(resolver)
        .start()
        .await
        .inspect_err(|e| error!("tablet agent failed to start: {:?}", e))?;

    info!(alias = %agent.alias(), "Application started. Waiting for CTRL+C signal...");
    if let Err(e) = graceful_shutdown(graceful_tx).await {
        error!("Failed to shutdown: {:?}", e);
    }

    agent.stop().await;
    println!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    let _ = graceful_tx.send(());

    info!("Shutdown completed");
    Ok(())
}

pub fn init_observability(
    uid: u32,
    log_dir: &Path,
) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(&log_dir.join(format!("{uid}/agent.log")))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
