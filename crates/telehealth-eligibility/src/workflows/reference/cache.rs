use super::{ReferenceDataError, ReferenceDataSource, ReferenceSnapshot};
use crate::workflows::clock::Clock;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    pub snapshot: Arc<ReferenceSnapshot>,
    pub built_at: DateTime<Utc>,
}

impl CachedSnapshot {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.built_at
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => self.age(now) > ttl,
            Err(_) => false,
        }
    }
}

/// Time-bounded holder of the current snapshot.
///
/// Callers receive an `Arc` handle, so a refresh never swaps data under a running
/// analysis. A failed refresh keeps serving the previous snapshot.
pub struct SnapshotCache<S> {
    source: S,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<CachedSnapshot>>,
    refresh_lock: Mutex<()>,
}

impl<S> SnapshotCache<S>
where
    S: ReferenceDataSource,
{
    pub fn new(source: S, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            ttl,
            clock,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Snapshot metadata without triggering a load.
    pub fn cached(&self) -> Option<CachedSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn snapshot(&self) -> Result<Arc<ReferenceSnapshot>, ReferenceDataError> {
        let now = self.clock.now();
        if let Some(cached) = self.cached() {
            if !cached.is_stale(now, self.ttl) {
                return Ok(cached.snapshot);
            }
        }

        let _refreshing = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another caller may have refreshed while we waited.
        if let Some(cached) = self.cached() {
            if !cached.is_stale(now, self.ttl) {
                return Ok(cached.snapshot);
            }
        }

        match self.rebuild() {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => match self.cached() {
                Some(stale) => {
                    warn!(
                        error = %err,
                        age_minutes = stale.age(now).num_minutes(),
                        "reference refresh failed; serving stale snapshot"
                    );
                    Ok(stale.snapshot)
                }
                None => Err(err),
            },
        }
    }

    /// Loads and installs a new snapshot regardless of age.
    pub fn refresh(&self) -> Result<Arc<ReferenceSnapshot>, ReferenceDataError> {
        let _refreshing = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.rebuild()
    }

    fn rebuild(&self) -> Result<Arc<ReferenceSnapshot>, ReferenceDataError> {
        let tables = self.source.load()?;
        let snapshot = Arc::new(ReferenceSnapshot::build(tables)?);
        let built_at = self.clock.now();

        info!(
            postcodes = snapshot.postcode_count(),
            disasters = snapshot.disaster_count(),
            "reference snapshot loaded"
        );

        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(CachedSnapshot {
            snapshot: snapshot.clone(),
            built_at,
        });
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::reference::{
        InMemoryReferenceSource, PostcodeMapping, PostcodeRecord, ReferenceTables, RemotenessArea,
    };
    use chrono::TimeZone;

    struct SteppingClock(Mutex<DateTime<Utc>>);

    impl SteppingClock {
        fn advance(&self, by: chrono::Duration) {
            let mut guard = self.0.lock().expect("clock mutex poisoned");
            *guard += by;
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().expect("clock mutex poisoned")
        }
    }

    fn tables(postcode: &str) -> ReferenceTables {
        ReferenceTables {
            postcodes: vec![PostcodeMapping {
                record: PostcodeRecord {
                    postcode: postcode.to_string(),
                    suburb: "Test".to_string(),
                    state: "VIC".to_string(),
                    lga_code: "LGA-1".to_string(),
                    lga_name: "Test".to_string(),
                    remoteness_area: RemotenessArea::Remote,
                    remoteness_code: "RA4".to_string(),
                },
                updated_at: None,
            }],
            ..ReferenceTables::default()
        }
    }

    fn cache_with_clock() -> (
        SnapshotCache<InMemoryReferenceSource>,
        Arc<SteppingClock>,
    ) {
        let clock = Arc::new(SteppingClock(Mutex::new(
            Utc.with_ymd_and_hms(2025, 10, 8, 9, 0, 0).unwrap(),
        )));
        let cache = SnapshotCache::new(
            InMemoryReferenceSource::new(tables("3000")),
            Duration::from_secs(60),
            clock.clone(),
        );
        (cache, clock)
    }

    #[test]
    fn fresh_snapshot_is_reused() {
        let (cache, _clock) = cache_with_clock();
        let first = cache.snapshot().expect("initial load");
        cache.source().replace(Some(tables("3001")));
        let second = cache.snapshot().expect("cached");

        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.resolve_postcode("3001").is_none());
    }

    #[test]
    fn stale_snapshot_is_rebuilt_but_held_handles_stay_intact() {
        let (cache, clock) = cache_with_clock();
        let held = cache.snapshot().expect("initial load");

        cache.source().replace(Some(tables("3001")));
        clock.advance(chrono::Duration::minutes(5));
        let refreshed = cache.snapshot().expect("refresh");

        assert!(refreshed.resolve_postcode("3001").is_some());
        assert!(held.resolve_postcode("3000").is_some());
        assert!(held.resolve_postcode("3001").is_none());
    }

    #[test]
    fn failed_refresh_falls_back_to_stale_snapshot() {
        let (cache, clock) = cache_with_clock();
        cache.snapshot().expect("initial load");

        cache.source().replace(None);
        clock.advance(chrono::Duration::minutes(5));
        let served = cache.snapshot().expect("stale snapshot served");
        assert!(served.resolve_postcode("3000").is_some());
        assert!(cache.refresh().is_err());
    }

    #[test]
    fn missing_snapshot_and_failing_source_is_an_error() {
        let cache = SnapshotCache::new(
            InMemoryReferenceSource::unavailable(),
            Duration::from_secs(60),
            Arc::new(crate::workflows::clock::SystemClock),
        );
        assert!(matches!(
            cache.snapshot(),
            Err(ReferenceDataError::Unavailable(_))
        ));
        assert!(cache.cached().is_none());
    }
}
