//! Live mode: periodic re-fetch and re-analysis of a device's recent track.
//!
//! Each poller is one tokio task. A tick fetches, analyzes and publishes before
//! the next tick is awaited, so requests never overlap and a snapshot is never
//! replaced by an older one.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};

use crate::{
    analytics::TrackAnalytics,
    locations::{LocationSource, LocationsQuery},
    models::{Fix, TrackAnalysis},
};

/// What a poller fetches on every tick. The window always ends at "now".
#[derive(Debug, Clone, PartialEq)]
pub struct LiveWindow {
    pub device_id: String,
    pub from: OffsetDateTime,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveSnapshot {
    /// Strictly increasing per poller
    pub sequence: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub from: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub to: OffsetDateTime,
    /// Count reported by the locations API
    pub count: u64,
    pub analysis: TrackAnalysis,
    pub last_location: Option<Fix>,
    /// Set when the latest fetch failed; `analysis` is then the previous one
    pub error: Option<String>,
}

pub type SnapshotReceiver = watch::Receiver<Option<Arc<LiveSnapshot>>>;

pub struct LivePoller {
    snapshots: SnapshotReceiver,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LivePoller {
    pub fn spawn(
        source: Arc<dyn LocationSource>,
        window: LiveWindow,
        interval: Duration,
        analytics: TrackAnalytics,
    ) -> Self {
        let (snapshot_tx, snapshots) = watch::channel(None);
        let (shutdown, shutdown_rx) = watch::channel(false);

        tracing::info!(device = %window.device_id, ?interval, "Live polling started");
        let task = tokio::spawn(poll_loop(
            source,
            window,
            interval,
            analytics,
            snapshot_tx,
            shutdown_rx,
        ));

        Self {
            snapshots,
            shutdown,
            task,
        }
    }

    pub fn subscribe(&self) -> SnapshotReceiver {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> Option<Arc<LiveSnapshot>> {
        self.snapshots.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal the task and wait for it to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = (&mut self.task).await {
            tracing::error!("Live polling task failed: {e}");
        }
    }
}

impl Drop for LivePoller {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn poll_loop(
    source: Arc<dyn LocationSource>,
    window: LiveWindow,
    interval: Duration,
    analytics: TrackAnalytics,
    snapshot_tx: watch::Sender<Option<Arc<LiveSnapshot>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sequence = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let to = OffsetDateTime::now_utc();
        let query = LocationsQuery {
            device_id: window.device_id.clone(),
            from: window.from,
            to,
            limit: window.limit,
        };

        let result = tokio::select! {
            result = source.fetch_locations(&query) => result,
            _ = shutdown.changed() => break,
        };

        sequence += 1;
        let previous = snapshot_tx.borrow().clone();
        let snapshot = match result {
            Ok(batch) => {
                let analysis = analytics.analyze(batch.fixes);
                LiveSnapshot {
                    sequence,
                    fetched_at: OffsetDateTime::now_utc(),
                    from: query.from,
                    to,
                    count: batch.count,
                    last_location: analysis.normalized.last().copied(),
                    analysis,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(device = %window.device_id, "Live fetch failed: {e}");
                let (analysis, count, last_location) = match previous {
                    Some(prev) => (prev.analysis.clone(), prev.count, prev.last_location),
                    None => (analytics.analyze(Vec::new()), 0, None),
                };
                LiveSnapshot {
                    sequence,
                    fetched_at: OffsetDateTime::now_utc(),
                    from: query.from,
                    to,
                    count,
                    analysis,
                    last_location,
                    error: Some(e.to_string()),
                }
            }
        };

        snapshot_tx.send_replace(Some(Arc::new(snapshot)));
    }

    tracing::info!(device = %window.device_id, "Live polling stopped");
}

/// At most one poller per device.
#[derive(Clone, Default)]
pub struct LiveRegistry {
    pollers: Arc<Mutex<HashMap<String, LivePoller>>>,
}

impl LiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling, replacing (and stopping) any poller for the same device.
    pub fn start(
        &self,
        source: Arc<dyn LocationSource>,
        window: LiveWindow,
        interval: Duration,
        analytics: TrackAnalytics,
    ) -> SnapshotReceiver {
        let device_id = window.device_id.clone();
        let poller = LivePoller::spawn(source, window, interval, analytics);
        let rx = poller.subscribe();

        let replaced = self.lock().insert(device_id.clone(), poller);
        if replaced.is_some() {
            tracing::info!(device = %device_id, "Replaced running live poller");
        }
        rx
    }

    /// `None` when no poller runs for the device, `Some(None)` before its first tick.
    pub fn latest(&self, device_id: &str) -> Option<Option<Arc<LiveSnapshot>>> {
        self.lock().get(device_id).map(LivePoller::latest)
    }

    pub fn is_running(&self, device_id: &str) -> bool {
        self.lock()
            .get(device_id)
            .is_some_and(LivePoller::is_running)
    }

    /// Returns whether a poller was running.
    pub async fn stop(&self, device_id: &str) -> bool {
        let poller = self.lock().remove(device_id);
        match poller {
            Some(poller) => {
                poller.stop().await;
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, LivePoller>> {
        self.pollers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locations::{LocationBatch, LocationsError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::macros::datetime;

    const FROM: OffsetDateTime = datetime!(2024-03-01 00:00:00 UTC);

    /// Returns one more fix per call; fails on the calls listed in `fail_on`.
    struct GrowingSource {
        calls: AtomicUsize,
        fail_on: Vec<usize>,
    }

    impl GrowingSource {
        fn new(fail_on: Vec<usize>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_on,
            })
        }
    }

    #[async_trait]
    impl LocationSource for GrowingSource {
        async fn fetch_locations(
            &self,
            query: &LocationsQuery,
        ) -> Result<LocationBatch, LocationsError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&call) {
                return Err(LocationsError::Status(503));
            }
            let fixes: Vec<Fix> = (0..=call)
                .map(|i| {
                    Fix::new(
                        0.01 * i as f64,
                        0.0,
                        query.from + time::Duration::seconds(60 * i as i64),
                    )
                })
                .collect();
            Ok(LocationBatch {
                count: fixes.len() as u64,
                fixes,
            })
        }
    }

    fn window() -> LiveWindow {
        LiveWindow {
            device_id: "gps-001".to_string(),
            from: FROM,
            limit: 200,
        }
    }

    async fn next_snapshot(rx: &mut SnapshotReceiver) -> Arc<LiveSnapshot> {
        rx.changed().await.unwrap();
        rx.borrow_and_update().clone().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshots_are_sequential() {
        let source = GrowingSource::new(vec![]);
        let poller = LivePoller::spawn(
            source.clone(),
            window(),
            Duration::from_secs(30),
            TrackAnalytics::default(),
        );
        let mut rx = poller.subscribe();

        let first = next_snapshot(&mut rx).await;
        assert_eq!(first.sequence, 1);
        assert_eq!(first.analysis.normalized.len(), 2);
        assert_eq!(first.last_location, first.analysis.normalized.last().copied());
        assert!(first.error.is_none());

        let second = next_snapshot(&mut rx).await;
        assert_eq!(second.sequence, 2);
        assert_eq!(second.count, 3);
        assert!(second.to >= first.to);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_keeps_previous_analysis() {
        let source = GrowingSource::new(vec![2]);
        let poller = LivePoller::spawn(
            source,
            window(),
            Duration::from_secs(30),
            TrackAnalytics::default(),
        );
        let mut rx = poller.subscribe();

        let first = next_snapshot(&mut rx).await;
        let failed = next_snapshot(&mut rx).await;

        assert_eq!(failed.sequence, 2);
        assert!(failed.error.as_deref().unwrap().contains("503"));
        assert_eq!(failed.analysis, first.analysis);
        assert_eq!(failed.count, first.count);

        let recovered = next_snapshot(&mut rx).await;
        assert!(recovered.error.is_none());
        assert_eq!(recovered.analysis.normalized.len(), 4);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_task() {
        let source = GrowingSource::new(vec![]);
        let poller = LivePoller::spawn(
            source.clone(),
            window(),
            Duration::from_secs(30),
            TrackAnalytics::default(),
        );
        let mut rx = poller.subscribe();
        next_snapshot(&mut rx).await;

        poller.stop().await;
        let calls = source.calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_replaces_and_stops() {
        let registry = LiveRegistry::new();
        let source = GrowingSource::new(vec![]);

        assert!(registry.latest("gps-001").is_none());

        let mut rx = registry.start(
            source.clone(),
            window(),
            Duration::from_secs(30),
            TrackAnalytics::default(),
        );
        next_snapshot(&mut rx).await;
        assert!(registry.is_running("gps-001"));
        assert_eq!(registry.latest("gps-001").flatten().unwrap().sequence, 1);

        // replacing drops the old poller, which closes its snapshot channel
        let mut replacement = registry.start(
            source,
            window(),
            Duration::from_secs(30),
            TrackAnalytics::default(),
        );
        next_snapshot(&mut replacement).await;
        assert_eq!(registry.latest("gps-001").flatten().unwrap().sequence, 1);

        assert!(registry.stop("gps-001").await);
        assert!(!registry.stop("gps-001").await);
        assert!(!registry.is_running("gps-001"));
    }
}
