use std::sync::Once;

use autometrics::prometheus_exporter::{self};
use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::Gauge;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

lazy_static! {
    pub static ref HEALTH_STREAM_SUBSCRIBERS: IntGauge = IntGauge::new(
        "tablet_agent_health_stream_subscribers",
        "Number of registered health stream subscribers"
    )
    .expect("metric can not be created");

    pub static ref HEALTH_STREAM_DROPPED: IntCounter = IntCounter::new(
        "tablet_agent_health_stream_dropped_total",
        "Health stream replies dropped because a subscriber channel was full"
    )
    .expect("metric can not be created");

    pub static ref REFRESH_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tablet_agent_refresh_total", "Post-action tablet refreshes by result"),
        &["result"]
    )
    .expect("metric can not be created");

    pub static ref MYSQL_PORT_DRIFT_TOTAL: IntCounter = IntCounter::new(
        "tablet_agent_mysql_port_drift_total",
        "Times the mysql port reported by the daemon differed from the tablet record"
    )
    .expect("metric can not be created");

    pub static ref REPLICATION_DELAY_SECONDS: Gauge = Gauge::new(
        "tablet_agent_replication_delay_seconds",
        "Replication delay measured by the latest health check"
    )
    .expect("metric can not be created");

    pub static ref TARGET_TABLET_TYPE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("tablet_agent_target_tablet_type", "Tablet type this agent targets"),
        &["tablet_type"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

pub fn register_custom_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(HEALTH_STREAM_SUBSCRIBERS.clone()),
            Box::new(HEALTH_STREAM_DROPPED.clone()),
            Box::new(REFRESH_TOTAL.clone()),
            Box::new(MYSQL_PORT_DRIFT_TOTAL.clone()),
            Box::new(REPLICATION_DELAY_SECONDS.clone()),
            Box::new(TARGET_TABLET_TYPE.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                error!("collector can not be registered: {}", e);
            }
        }
    });
}

pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    register_custom_metrics();

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    info!(port, "metrics server listening");
    let (_, server) = warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
        let _ = shutdown_signal.changed().await;
    });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(get_metrics_body())
}

/// Export metrics for Prometheus to scrape
pub fn get_metrics_body() -> String {
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    let mut res = String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("custom metrics could not be from_utf8'd: {}", e);
        String::default()
    });

    res.push_str(&prometheus_exporter::encode_http_response().into_body());
    res
}
