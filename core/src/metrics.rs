use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};

/// Tellere for kilde/cache. Hver instans har sitt eget register,
/// så tester og flere pipelines i samme prosess ikke deler tall.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    remote_fetch_total: IntCounter,
    cache_hit_total: IntCounter,
    cache_miss_total: IntCounter,
    fetch_error_total: IntCounter,
    rows_skipped_total: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let c = IntCounter::with_opts(Opts::new(name, help).namespace("runlog"))?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        Ok(Self {
            remote_fetch_total: counter(
                &registry,
                "source_remote_fetch_total",
                "Calls made to the remote record provider",
            )?,
            cache_hit_total: counter(&registry, "source_cache_hit_total", "Fetches served from cache")?,
            cache_miss_total: counter(
                &registry,
                "source_cache_miss_total",
                "Fetches that had to go to the provider",
            )?,
            fetch_error_total: counter(
                &registry,
                "source_fetch_error_total",
                "Provider calls that failed",
            )?,
            rows_skipped_total: counter(
                &registry,
                "sheet_rows_skipped_total",
                "Sheet rows dropped for missing date, distance or speed",
            )?,
            registry,
        })
    }

    pub fn remote_fetch_total(&self) -> &IntCounter {
        &self.remote_fetch_total
    }

    pub fn cache_hit_total(&self) -> &IntCounter {
        &self.cache_hit_total
    }

    pub fn cache_miss_total(&self) -> &IntCounter {
        &self.cache_miss_total
    }

    pub fn fetch_error_total(&self) -> &IntCounter {
        &self.fetch_error_total
    }

    pub fn rows_skipped_total(&self) -> &IntCounter {
        &self.rows_skipped_total
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus tekstformat (for /metrics eller debug-utskrift).
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("remote_fetch_total", &self.remote_fetch_total.get())
            .field("cache_hit_total", &self.cache_hit_total.get())
            .field("cache_miss_total", &self.cache_miss_total.get())
            .field("fetch_error_total", &self.fetch_error_total.get())
            .field("rows_skipped_total", &self.rows_skipped_total.get())
            .finish()
    }
}
