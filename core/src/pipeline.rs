use std::sync::Arc;

use crate::cache::{CachedSource, Clock, SystemClock};
use crate::config::PipelineConfig;
use crate::error::{ConfigError, SourceError};
use crate::metrics::Metrics;
use crate::shaper::ActivityShaper;
use crate::sheets::SheetsClient;
use crate::source::{QueryDescriptor, RecordProvider};
use crate::types::{RawRecord, ShapedDataset};

/// Hele løpet: cachet henting → shaping.
///
/// Bygges én gang ved oppstart og sendes eksplisitt til den som rendrer.
pub struct ActivityPipeline<P, C = SystemClock> {
    source: CachedSource<P, C>,
    shaper: ActivityShaper,
    query: QueryDescriptor,
    activity_filter: Option<String>,
}

impl<P: RecordProvider> ActivityPipeline<P, SystemClock> {
    pub fn new(provider: P, query: QueryDescriptor, cfg: &PipelineConfig, metrics: Metrics) -> Self {
        Self::with_clock(provider, query, cfg, metrics, SystemClock)
    }
}

impl ActivityPipeline<SheetsClient, SystemClock> {
    /// Produksjonsoppsett: Google Sheets bak TTL-cache.
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let url = cfg
            .sheet_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ConfigError::Invalid("sheet_url is required".into()))?;
        let metrics = Metrics::new().map_err(|e| ConfigError::Invalid(format!("metrics: {e}")))?;

        let mut client = SheetsClient::new(cfg.http_timeout(), metrics.clone());
        if let Some(token) = &cfg.access_token {
            client = client.with_bearer_token(token.clone());
        }
        Ok(Self::new(client, QueryDescriptor::select_all(url), cfg, metrics))
    }
}

impl<P: RecordProvider, C: Clock> ActivityPipeline<P, C> {
    pub fn with_clock(
        provider: P,
        query: QueryDescriptor,
        cfg: &PipelineConfig,
        metrics: Metrics,
        clock: C,
    ) -> Self {
        Self {
            source: CachedSource::with_clock(provider, cfg.cache_ttl(), metrics, clock),
            shaper: ActivityShaper::new(cfg.hr_window),
            query,
            activity_filter: cfg.activity_filter.clone(),
        }
    }

    pub fn query(&self) -> &QueryDescriptor {
        &self.query
    }

    pub fn activity_filter(&self) -> Option<&str> {
        self.activity_filter.as_deref()
    }

    pub fn source(&self) -> &CachedSource<P, C> {
        &self.source
    }

    pub fn metrics(&self) -> &Metrics {
        self.source.metrics()
    }

    /// Rårader (cachet innen TTL).
    pub fn records(&self) -> Result<Arc<[RawRecord]>, SourceError> {
        self.source.fetch(&self.query)
    }

    /// Ferdig datasett for grafer og tabell.
    pub fn load(&self) -> Result<ShapedDataset, SourceError> {
        let records = self.records()?;
        let shaped = self.shaper.shape(&records, self.activity_filter());
        log::debug!(
            "shaped {} of {} records (filter={:?}, flagged={})",
            shaped.len(),
            records.len(),
            self.activity_filter,
            shaped.flagged().count()
        );
        Ok(shaped)
    }
}
