use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::SourceError;
use crate::metrics::Metrics;
use crate::source::{QueryDescriptor, RecordProvider};
use crate::types::RawRecord;

/// Standard levetid for en cachet henting (10 min).
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Tidskilde – byttes ut i tester for å spole forbi TTL.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manuell klokke for tester.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: Mutex::new(Instant::now()) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *lock(&self.now)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

// Innholdet er alltid enten fraværende eller komplett, så en forgiftet lås kan trygt tas over.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
struct CacheEntry {
    records: Arc<[RawRecord]>,
    fetched_at: Instant,
}

/// RecordSource: TTL-cache foran en `RecordProvider`.
///
/// - treff innen TTL gir samme snapshot uten nytt fjernkall
/// - bare vellykkede hentinger caches; feil går rett til kaller
/// - maks én henting i gang per nøkkel, andre kallere venter på den
pub struct CachedSource<P, C = SystemClock> {
    provider: P,
    clock: C,
    ttl: Duration,
    entries: Mutex<HashMap<QueryDescriptor, CacheEntry>>,
    in_flight: Mutex<HashMap<QueryDescriptor, Arc<Mutex<()>>>>,
    metrics: Metrics,
}

impl<P: RecordProvider> CachedSource<P, SystemClock> {
    pub fn new(provider: P, ttl: Duration, metrics: Metrics) -> Self {
        Self::with_clock(provider, ttl, metrics, SystemClock)
    }
}

impl<P: RecordProvider, C: Clock> CachedSource<P, C> {
    pub fn with_clock(provider: P, ttl: Duration, metrics: Metrics, clock: C) -> Self {
        Self {
            provider,
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn fresh(&self, query: &QueryDescriptor) -> Option<Arc<[RawRecord]>> {
        let entries = lock(&self.entries);
        let entry = entries.get(query)?;
        let age = self.clock.now().saturating_duration_since(entry.fetched_at);
        if age < self.ttl {
            Some(Arc::clone(&entry.records))
        } else {
            None
        }
    }

    pub fn fetch(&self, query: &QueryDescriptor) -> Result<Arc<[RawRecord]>, SourceError> {
        if let Some(hit) = self.fresh(query) {
            self.metrics.cache_hit_total().inc();
            log::debug!("cache hit for {query}");
            return Ok(hit);
        }

        let gate = {
            let mut in_flight = lock(&self.in_flight);
            Arc::clone(in_flight.entry(query.clone()).or_default())
        };
        let _guard = lock(&gate);

        // Noen andre kan ha fylt cachen mens vi ventet på porten
        if let Some(hit) = self.fresh(query) {
            self.metrics.cache_hit_total().inc();
            log::debug!("cache hit for {query} after waiting on in-flight fetch");
            return Ok(hit);
        }

        self.metrics.cache_miss_total().inc();
        self.metrics.remote_fetch_total().inc();
        let purged = self.purge_expired();
        if purged > 0 {
            log::debug!("purged {purged} expired cache entries");
        }
        log::info!("fetching records for {query}");

        let outcome = match self.provider.fetch(query) {
            Ok(records) => {
                let records: Arc<[RawRecord]> = records.into();
                log::info!("fetched {} records for {query}", records.len());
                lock(&self.entries).insert(
                    query.clone(),
                    CacheEntry { records: Arc::clone(&records), fetched_at: self.clock.now() },
                );
                Ok(records)
            }
            Err(e) => {
                self.metrics.fetch_error_total().inc();
                log::warn!("fetch failed for {query}: {e}");
                Err(e)
            }
        };
        self.release_gate(query, &gate);
        outcome
    }

    // Cachen er allerede fylt (eller kallet feilet) når porten fjernes;
    // kallere som fortsatt holder en klone venter på den og sjekker cachen etterpå.
    fn release_gate(&self, query: &QueryDescriptor, gate: &Arc<Mutex<()>>) {
        let mut in_flight = lock(&self.in_flight);
        if in_flight.get(query).is_some_and(|g| Arc::ptr_eq(g, gate)) {
            in_flight.remove(query);
        }
    }

    /// Tving ny henting ved neste kall.
    pub fn invalidate(&self, query: &QueryDescriptor) {
        lock(&self.entries).remove(query);
    }

    /// Fjern utløpte oppføringer. Returnerer antall fjernet.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.fetched_at) < self.ttl);
        before - entries.len()
    }
}
