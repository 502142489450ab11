use std::net::SocketAddr;

use anyhow::Context;
use tracing::trace;

/// Settings of one exporter process
///
/// Every field has a default, so an empty JSON object is a valid config file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExporterConfig {
    /// Address the HTTP server binds to
    pub listen_address: SocketAddr,

    /// Path the metrics are served under
    pub metrics_path: String,

    /// Prefix of every metric name, may be empty
    pub namespace: String,

    /// Concurrent scrapes allowed before answering 503, 0 disables the limit
    pub max_requests: usize,

    /// Restrict scrapes to these collectors, empty means all enabled ones
    pub collectors: Vec<String>,
}

pub const DEFAULT_METRICS_PATH: &str = "/metrics";

pub const DEFAULT_NAMESPACE: &str = "guardia";

pub const DEFAULT_MAX_REQUESTS: usize = 40;

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_address: crate::util::get_listen_address(),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_requests: DEFAULT_MAX_REQUESTS,
            collectors: vec![],
        }
    }
}

impl ExporterConfig {
    pub fn with_listen_address(mut self, listen_address: SocketAddr) -> Self {
        self.listen_address = listen_address;
        self
    }

    /// A missing leading slash is added
    pub fn with_metrics_path(mut self, metrics_path: impl Into<String>) -> Self {
        let metrics_path = metrics_path.into();
        self.metrics_path = if metrics_path.starts_with('/') {
            metrics_path
        } else {
            format!("/{metrics_path}")
        };
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_max_requests(mut self, max_requests: usize) -> Self {
        self.max_requests = max_requests;
        self
    }

    pub fn with_filter<I, S>(mut self, collectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collectors = collectors.into_iter().map(Into::into).collect();
        self
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.metrics_path.starts_with('/') {
            anyhow::bail!("metrics path {:?} must start with '/'", self.metrics_path);
        }
        if self.metrics_path == "/" {
            anyhow::bail!("metrics path must not be the landing page '/'");
        }
        if !crate::metric::is_valid_namespace(&self.namespace) {
            anyhow::bail!("namespace {:?} is not a valid metric name prefix", self.namespace);
        }
        Ok(())
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<ExporterConfig> {
    let file_content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let config: ExporterConfig = serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?;
    config.validate()?;

    trace!("loaded config: {config:?}");
    Ok(config)
}
