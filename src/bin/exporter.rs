use std::net::SocketAddr;
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches, Parser};
use guardia_exporter::{
    Exporter, InstanceCache, Registry, cli,
    collectors::register_builtin,
    config::{DEFAULT_NAMESPACE, ExporterConfig, read_config_file},
};
use tracing::{debug, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(name = "guardia-exporter")]
#[command(about = "Prometheus exporter for host metrics", long_about = None)]
struct Args {
    /// Config file
    #[arg(short, long, value_name = "FILE")]
    file: Option<String>,

    /// Address to listen on for web interface and telemetry
    #[arg(long = "web.listen-address", value_name = "ADDR")]
    listen_address: Option<SocketAddr>,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path", value_name = "PATH")]
    metrics_path: Option<String>,

    /// Maximum number of parallel scrape requests, 0 to disable
    #[arg(long = "web.max-requests", value_name = "N")]
    max_requests: Option<usize>,

    /// Prefix of every exposed metric name
    #[arg(long)]
    namespace: Option<String>,

    /// Only scrape this collector, may be repeated
    #[arg(long = "collector", value_name = "NAME")]
    collectors: Vec<String>,

    /// Milliseconds between two CPU usage refreshes
    #[arg(long = "cpu.refresh-interval", value_name = "MS", default_value_t = 1000)]
    cpu_interval_ms: u64,

    /// Log level
    #[arg(long = "log-level", default_value = "info")]
    log_level: LevelFilter,
}

impl Args {
    fn apply(&self, config: ExporterConfig) -> ExporterConfig {
        let mut config = config;
        if let Some(listen_address) = self.listen_address {
            config = config.with_listen_address(listen_address);
        }
        if let Some(metrics_path) = &self.metrics_path {
            config = config.with_metrics_path(metrics_path.as_str());
        }
        if let Some(max_requests) = self.max_requests {
            config = config.with_max_requests(max_requests);
        }
        if let Some(namespace) = &self.namespace {
            config = config.with_namespace(namespace.as_str());
        }
        if !self.collectors.is_empty() {
            config = config.with_filter(self.collectors.iter().cloned());
        }
        config
    }
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("guardia_exporter", level),
        ("tower_http", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn builtin_registry(namespace: &str, cpu_interval: Duration) -> anyhow::Result<Registry> {
    let registry = Registry::new();
    register_builtin(&registry, namespace, cpu_interval)?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // collector flags only depend on the registered names
    let flags = builtin_registry(DEFAULT_NAMESPACE, Duration::ZERO)?;
    let matches = cli::with_collector_flags(Args::command(), &flags).get_matches();
    let args = Args::from_arg_matches(&matches)?;

    init(args.log_level);
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => ExporterConfig::default(),
    };
    let config = args.apply(config);
    debug!("effective config: {config:?}");

    let registry = builtin_registry(
        &config.namespace,
        Duration::from_millis(args.cpu_interval_ms),
    )?;
    let toggles = cli::apply_collector_flags(&registry, &matches)?;
    for toggle in toggles {
        debug!(collector = %toggle.name, enabled = toggle.enabled, "collector");
    }

    let cache = InstanceCache::new();
    Exporter::new(config, &registry, &cache)?.run().await
}
