use {once_cell::sync::OnceCell, tracing::info};

#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static HANDLE: OnceCell<MetricsHandle> = OnceCell::new();

#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// When false the facade stays a no-op.
    pub enabled: bool,
    /// Labels attached to every exported series.
    pub global_labels: Vec<(String, String)>,
}

/// Handle to the installed recorder, if any.
#[derive(Clone, Default)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsHandle")
            .field("installed", &self.is_installed())
            .finish()
    }
}

impl MetricsHandle {
    #[must_use]
    pub fn is_installed(&self) -> bool {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus.is_some()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            false
        }
    }

    /// Prometheus text exposition of everything recorded so far.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus.as_ref().map(PrometheusHandle::render)
        }
        #[cfg(not(feature = "prometheus"))]
        {
            None
        }
    }
}

/// Install the process-wide recorder. Repeated calls return the first handle.
pub fn init_metrics(config: MetricsRecorderConfig) -> anyhow::Result<MetricsHandle> {
    if let Some(handle) = HANDLE.get() {
        return Ok(handle.clone());
    }
    if !config.enabled {
        return Ok(MetricsHandle::default());
    }

    #[cfg(feature = "prometheus")]
    let handle = {
        let mut builder = PrometheusBuilder::new();
        for (key, value) in &config.global_labels {
            builder = builder.add_global_label(key, value);
        }
        MetricsHandle {
            prometheus: Some(builder.install_recorder()?),
        }
    };
    #[cfg(not(feature = "prometheus"))]
    let handle = MetricsHandle::default();

    info!(installed = handle.is_installed(), "metrics recorder initialised");
    Ok(HANDLE.get_or_init(|| handle).clone())
}
