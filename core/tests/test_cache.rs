use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use runlog_core::{
    CachedSource, ManualClock, Metrics, QueryDescriptor, RawRecord, RecordProvider, SourceError,
};

/// Teller kall og svarer med et skript av resultater (siste gjentas).
struct CountingProvider {
    calls: AtomicUsize,
    script: Mutex<Vec<Result<Vec<RawRecord>, SourceError>>>,
    delay: Duration,
}

impl CountingProvider {
    fn new(script: Vec<Result<Vec<RawRecord>, SourceError>>) -> Self {
        Self { calls: AtomicUsize::new(0), script: Mutex::new(script), delay: Duration::ZERO }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RecordProvider for CountingProvider {
    fn fetch(&self, _query: &QueryDescriptor) -> Result<Vec<RawRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.remove(0)
        } else {
            script[0].clone()
        }
    }
}

fn one_run() -> Vec<RawRecord> {
    let date = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    vec![RawRecord::new(date, "Run", 3.0, 6.0, 150)]
}

fn source(
    provider: Arc<CountingProvider>,
    ttl_secs: u64,
) -> (CachedSource<Arc<CountingProvider>, Arc<ManualClock>>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let src = CachedSource::with_clock(
        provider,
        Duration::from_secs(ttl_secs),
        Metrics::new().unwrap(),
        Arc::clone(&clock),
    );
    (src, clock)
}

#[test]
fn second_fetch_within_ttl_is_a_cache_hit() {
    let provider = Arc::new(CountingProvider::new(vec![Ok(one_run())]));
    let (src, clock) = source(Arc::clone(&provider), 600);
    let q = QueryDescriptor::select_all("https://docs.google.com/spreadsheets/d/abc/edit");

    let a = src.fetch(&q).unwrap();
    clock.advance(Duration::from_secs(599));
    let b = src.fetch(&q).unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(a, b);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(src.metrics().cache_hit_total().get(), 1);
    assert_eq!(src.metrics().cache_miss_total().get(), 1);
}

#[test]
fn fetch_after_ttl_calls_provider_exactly_once_more() {
    let provider = Arc::new(CountingProvider::new(vec![Ok(one_run())]));
    let (src, clock) = source(Arc::clone(&provider), 600);
    let q = QueryDescriptor::new("sheet");

    src.fetch(&q).unwrap();
    clock.advance(Duration::from_secs(601));
    src.fetch(&q).unwrap();
    src.fetch(&q).unwrap();

    assert_eq!(provider.calls(), 2);
    assert_eq!(src.metrics().remote_fetch_total().get(), 2);
}

#[test]
fn different_descriptors_are_cached_separately() {
    let provider = Arc::new(CountingProvider::new(vec![Ok(one_run())]));
    let (src, _clock) = source(Arc::clone(&provider), 600);

    src.fetch(&QueryDescriptor::new("a")).unwrap();
    src.fetch(&QueryDescriptor::new("b")).unwrap();
    src.fetch(&QueryDescriptor::new("a")).unwrap();

    assert_eq!(provider.calls(), 2);
}

#[test]
fn failures_are_not_cached() {
    let provider = Arc::new(CountingProvider::new(vec![
        Err(SourceError::SourceUnavailable("timeout".into())),
        Ok(one_run()),
    ]));
    let (src, _clock) = source(Arc::clone(&provider), 600);
    let q = QueryDescriptor::new("sheet");

    let err = src.fetch(&q).unwrap_err();
    assert!(err.is_transient());
    assert_eq!(src.metrics().fetch_error_total().get(), 1);

    // ingen TTL-venting nødvendig: feilen ble aldri lagret
    let ok = src.fetch(&q).unwrap();
    assert_eq!(ok.len(), 1);
    assert_eq!(provider.calls(), 2);
}

#[test]
fn query_error_propagates_unchanged() {
    let provider = Arc::new(CountingProvider::new(vec![Err(SourceError::QueryError(
        "HTTP 404".into(),
    ))]));
    let (src, _clock) = source(Arc::clone(&provider), 600);
    let err = src.fetch(&QueryDescriptor::new("missing")).unwrap_err();
    assert_eq!(err, SourceError::QueryError("HTTP 404".into()));
    assert!(!err.is_transient());
}

#[test]
fn failed_refresh_keeps_nothing_stale() {
    let provider = Arc::new(CountingProvider::new(vec![
        Ok(one_run()),
        Err(SourceError::SourceUnavailable("down".into())),
    ]));
    let (src, clock) = source(Arc::clone(&provider), 10);
    let q = QueryDescriptor::new("sheet");

    src.fetch(&q).unwrap();
    clock.advance(Duration::from_secs(11));
    assert!(src.fetch(&q).is_err());
    assert!(src.fetch(&q).is_err());
    assert_eq!(provider.calls(), 3);
}

#[test]
fn invalidate_forces_refetch() {
    let provider = Arc::new(CountingProvider::new(vec![Ok(one_run())]));
    let (src, _clock) = source(Arc::clone(&provider), 600);
    let q = QueryDescriptor::new("sheet");

    src.fetch(&q).unwrap();
    src.invalidate(&q);
    src.fetch(&q).unwrap();
    assert_eq!(provider.calls(), 2);
}

#[test]
fn concurrent_callers_share_one_in_flight_fetch() {
    let mut p = CountingProvider::new(vec![Ok(one_run())]);
    p.delay = Duration::from_millis(100);
    let provider = Arc::new(p);
    let (src, _clock) = source(Arc::clone(&provider), 600);
    let src = Arc::new(src);
    let q = QueryDescriptor::new("sheet");

    let n = 8;
    let barrier = Arc::new(Barrier::new(n));
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let src = Arc::clone(&src);
            let barrier = Arc::clone(&barrier);
            let q = q.clone();
            thread::spawn(move || {
                barrier.wait();
                src.fetch(&q).unwrap().len()
            })
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), 1);
    }
    assert_eq!(provider.calls(), 1);
    assert_eq!(src.metrics().cache_hit_total().get(), (n - 1) as u64);
}
