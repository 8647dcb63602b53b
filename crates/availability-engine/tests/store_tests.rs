//! Tests for the store adapter: serialization of concurrent inserts, backend
//! failures and timeouts, and the in-memory backend's snapshot support.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use availability_engine::backend::{
    AvailabilityBackend, BackendError, BackendSnapshot, InMemoryBackend,
};
use availability_engine::model::{
    AvailabilityWindow, DayOfWeek, NewService, PrincipalId, Service, ServiceId, ServiceType,
    WindowId,
};
use availability_engine::overlap::TimeRange;
use availability_engine::store::{CandidateWindow, WindowStore};
use availability_engine::time::normalize_time;
use availability_engine::{AvailabilityError, AvailabilityManager, EngineConfig, NewAvailability};
use mockable::DefaultClock;

// ── Helpers ─────────────────────────────────────────────────────────────────

fn candidate(start: &str, end: &str) -> CandidateWindow {
    CandidateWindow {
        day_of_week: DayOfWeek::new(4).unwrap(),
        start_time: normalize_time(start).unwrap(),
        end_time: normalize_time(end).unwrap(),
    }
}

fn new_service() -> Service {
    Service::new(
        ServiceId::new(),
        PrincipalId::new(),
        NewService {
            name: "Cleaning".to_string(),
            service_type: ServiceType::HouseHelp,
            duration_minutes: 120,
        },
    )
    .unwrap()
}

async fn store_with_service() -> (Arc<WindowStore<InMemoryBackend>>, ServiceId) {
    let store = Arc::new(WindowStore::new(
        Arc::new(InMemoryBackend::new()),
        Duration::from_secs(2),
    ));
    let service = new_service();
    let id = service.id;
    store.put_service(service).await.unwrap();
    (store, id)
}

fn assert_pairwise_disjoint(windows: &[AvailabilityWindow]) {
    for (i, a) in windows.iter().enumerate() {
        for b in &windows[i + 1..] {
            assert!(
                !TimeRange::from(a).overlaps(&TimeRange::from(b)),
                "{a:?} overlaps {b:?}"
            );
        }
    }
}

/// Backend that always fails.
struct DownBackend;

#[async_trait]
impl AvailabilityBackend for DownBackend {
    async fn get_service(&self, _id: ServiceId) -> Result<Option<Service>, BackendError> {
        Err(BackendError::Unavailable("connection refused".to_string()))
    }

    async fn put_service(&self, _service: Service) -> Result<(), BackendError> {
        Err(BackendError::Unavailable("connection refused".to_string()))
    }

    async fn list_windows(&self, _id: ServiceId) -> Result<Vec<AvailabilityWindow>, BackendError> {
        Err(BackendError::Unavailable("connection refused".to_string()))
    }

    async fn insert_window(&self, _window: AvailabilityWindow) -> Result<(), BackendError> {
        Err(BackendError::Unavailable("connection refused".to_string()))
    }

    async fn delete_window(&self, _s: ServiceId, _w: WindowId) -> Result<bool, BackendError> {
        Err(BackendError::Unavailable("connection refused".to_string()))
    }
}

/// In-memory backend whose reads of one service (or every write) can be slowed down.
struct SlowBackend {
    inner: InMemoryBackend,
    slow_service: Option<ServiceId>,
    slow_lookups: bool,
    slow_inserts: bool,
    fail_inserts: bool,
    delay: Duration,
}

impl SlowBackend {
    fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryBackend::new(),
            slow_service: None,
            slow_lookups: false,
            slow_inserts: false,
            fail_inserts: false,
            delay,
        }
    }
}

#[async_trait]
impl AvailabilityBackend for SlowBackend {
    async fn get_service(&self, id: ServiceId) -> Result<Option<Service>, BackendError> {
        if self.slow_lookups {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.get_service(id).await
    }

    async fn put_service(&self, service: Service) -> Result<(), BackendError> {
        self.inner.put_service(service).await
    }

    async fn list_windows(&self, id: ServiceId) -> Result<Vec<AvailabilityWindow>, BackendError> {
        if self.slow_service == Some(id) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.list_windows(id).await
    }

    async fn insert_window(&self, window: AvailabilityWindow) -> Result<(), BackendError> {
        if self.fail_inserts {
            return Err(BackendError::Unavailable("disk full".to_string()));
        }
        if self.slow_inserts {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.insert_window(window).await
    }

    async fn delete_window(&self, s: ServiceId, w: WindowId) -> Result<bool, BackendError> {
        self.inner.delete_window(s, w).await
    }
}

// ── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_inserts_admit_exactly_one() {
    for _ in 0..50 {
        let (store, svc) = store_with_service().await;

        let a = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.insert(svc, candidate("09:00", "10:00")).await }
        });
        let b = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.insert(svc, candidate("09:30", "10:30")).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        let ok = results.iter().filter(|r| r.is_ok()).count();
        let overlapping = results
            .iter()
            .filter(|r| matches!(r, Err(AvailabilityError::OverlappingWindow { .. })))
            .count();
        assert_eq!((ok, overlapping), (1, 1), "{results:?}");
        assert_eq!(store.list_for_service(svc).await.unwrap().len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_disjoint_inserts_all_succeed() {
    let (store, svc) = store_with_service().await;
    let ranges = [
        ("08:00", "09:00"),
        ("09:00", "10:00"),
        ("10:00", "11:00"),
        ("11:00", "12:00"),
        ("13:00", "14:00"),
        ("14:00", "14:30"),
        ("14:30", "15:00"),
        ("18:00", "19:00"),
    ];

    let handles: Vec<_> = ranges
        .iter()
        .map(|&(start, end)| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.insert(svc, candidate(start, end)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let windows = store.list_for_service(svc).await.unwrap();
    assert_eq!(windows.len(), ranges.len());
    assert_pairwise_disjoint(&windows);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mixed_inserts_leave_disjoint_state() {
    let (store, svc) = store_with_service().await;

    let handles: Vec<_> = (0..24u32)
        .map(|i| {
            let store = Arc::clone(&store);
            // Hour-long windows starting every 30 minutes: neighbours collide.
            let start = format!("{:02}:{:02}", 8 + i / 2, (i % 2) * 30);
            let end = format!("{:02}:{:02}", 9 + i / 2, (i % 2) * 30);
            tokio::spawn(async move { store.insert(svc, candidate(&start, &end)).await })
        })
        .collect();
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(
            matches!(result, Ok(_) | Err(AvailabilityError::OverlappingWindow { .. })),
            "{result:?}"
        );
    }

    assert_pairwise_disjoint(&store.list_for_service(svc).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_service_does_not_block_other_services() {
    let mut backend = SlowBackend::new(Duration::from_millis(500));
    let slow = new_service();
    let fast = new_service();
    backend.slow_service = Some(slow.id);
    let backend = Arc::new(backend);
    backend.put_service(slow.clone()).await.unwrap();
    backend.put_service(fast.clone()).await.unwrap();

    let store = Arc::new(WindowStore::new(backend, Duration::from_secs(5)));

    let blocked = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.insert(slow.id, candidate("09:00", "10:00")).await }
    });
    // Let the slow insert take its service lock first.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let quick = tokio::time::timeout(
        Duration::from_millis(250),
        store.insert(fast.id, candidate("09:00", "10:00")),
    )
    .await;
    assert!(matches!(quick, Ok(Ok(_))), "{quick:?}");

    blocked.await.unwrap().unwrap();
}

// ── Failure handling ────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn service_locks_are_released_after_use() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut services = Vec::new();
    for _ in 0..10 {
        let service = new_service();
        backend.put_service(service.clone()).await.unwrap();
        services.push(service.id);
    }
    let store = Arc::new(WindowStore::new(backend, Duration::from_secs(1)));

    let mut handles = Vec::new();
    for &svc in &services {
        for start in ["09:00", "09:30", "10:00"] {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let end = if start == "10:00" { "11:00" } else { "10:30" };
                store.insert(svc, candidate(start, end)).await
            }));
        }
    }
    for handle in handles {
        let _ = handle.await.unwrap();
    }
    let removed = store.list_for_service(services[0]).await.unwrap()[0].id();
    assert!(store.remove(services[0], removed).await.unwrap());

    assert_eq!(store.active_locks().await, 0);
}

#[tokio::test]
async fn failed_operations_release_their_lock() {
    let (store, svc) = store_with_service().await;
    store.insert(svc, candidate("09:00", "10:00")).await.unwrap();

    store.insert(svc, candidate("09:30", "10:30")).await.unwrap_err();
    store.insert(svc, candidate("11:00", "11:00")).await.unwrap_err();

    assert_eq!(store.active_locks().await, 0);
}

#[tokio::test]
async fn backend_failure_surfaces_as_store_unavailable() {
    let store = WindowStore::new(Arc::new(DownBackend), Duration::from_secs(1));

    let err = store
        .insert(ServiceId::new(), candidate("09:00", "10:00"))
        .await
        .unwrap_err();

    assert!(matches!(err, AvailabilityError::StoreUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn manager_reports_store_failures() {
    let manager = AvailabilityManager::new(
        Arc::new(DownBackend),
        Arc::new(DefaultClock),
        &EngineConfig::default(),
    );
    let svc = ServiceId::new();

    assert!(matches!(
        manager
            .create_availability(svc, NewAvailability::new(1, "09:00", "10:00"))
            .await,
        Err(AvailabilityError::StoreUnavailable(_))
    ));
    assert!(matches!(
        manager
            .query_slots(svc, chrono::NaiveDate::from_ymd_opt(2099, 1, 1).unwrap())
            .await,
        Err(AvailabilityError::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn input_validation_runs_before_store_access() {
    let manager = AvailabilityManager::new(
        Arc::new(DownBackend),
        Arc::new(DefaultClock),
        &EngineConfig::default(),
    );

    let err = manager
        .create_availability(ServiceId::new(), NewAvailability::new(1, "10:00", "09:00"))
        .await
        .unwrap_err();

    assert!(matches!(err, AvailabilityError::InvalidTimeFormat(_)));
}

#[tokio::test]
async fn slow_backend_times_out() {
    let mut backend = SlowBackend::new(Duration::from_secs(5));
    backend.slow_lookups = true;
    let store = WindowStore::new(Arc::new(backend), Duration::from_millis(50));

    let err = store.service(ServiceId::new()).await.unwrap_err();

    match err {
        AvailabilityError::StoreUnavailable(message) => assert!(message.contains("timed out")),
        other => panic!("expected StoreUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_insert_persists_nothing() {
    let mut backend = SlowBackend::new(Duration::ZERO);
    backend.fail_inserts = true;
    let backend = Arc::new(backend);
    let service = new_service();
    backend.put_service(service.clone()).await.unwrap();
    let store = WindowStore::new(Arc::clone(&backend), Duration::from_secs(1));

    let err = store
        .insert(service.id, candidate("09:00", "10:00"))
        .await
        .unwrap_err();

    assert!(matches!(err, AvailabilityError::StoreUnavailable(_)));
    assert!(store.list_for_service(service.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn timed_out_insert_persists_nothing() {
    let mut backend = SlowBackend::new(Duration::from_secs(5));
    backend.slow_inserts = true;
    let backend = Arc::new(backend);
    let service = new_service();
    backend.put_service(service.clone()).await.unwrap();
    let store = WindowStore::new(Arc::clone(&backend), Duration::from_millis(50));

    let err = store
        .insert(service.id, candidate("09:00", "10:00"))
        .await
        .unwrap_err();

    assert!(matches!(err, AvailabilityError::StoreUnavailable(_)));
    assert!(backend.inner.list_windows(service.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_service_reported_before_overlap_check() {
    let (store, _) = store_with_service().await;
    let missing = ServiceId::new();

    // A degenerate candidate would fail the overlap check; the missing service wins.
    let err = store
        .insert(missing, candidate("10:00", "09:00"))
        .await
        .unwrap_err();

    assert_eq!(err, AvailabilityError::ServiceNotFound(missing));
}

// ── In-memory backend ───────────────────────────────────────────────────────

#[tokio::test]
async fn insert_window_enforces_unique_ids() {
    let backend = InMemoryBackend::new();
    let window = AvailabilityWindow::new(
        WindowId::new(),
        ServiceId::new(),
        DayOfWeek::new(0).unwrap(),
        normalize_time("09:00").unwrap(),
        normalize_time("10:00").unwrap(),
    )
    .unwrap();

    backend.insert_window(window.clone()).await.unwrap();
    assert_eq!(
        backend.insert_window(window.clone()).await,
        Err(BackendError::Duplicate(window.id()))
    );
}

#[tokio::test]
async fn snapshot_restores_services_and_windows() {
    let (store, svc) = store_with_service().await;
    store.insert(svc, candidate("13:00", "14:00")).await.unwrap();
    store.insert(svc, candidate("09:00", "10:00")).await.unwrap();

    let snapshot = store.backend().snapshot().await;
    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: BackendSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, snapshot);

    // Windows come out ordered by start time.
    assert!(parsed.windows[0].start_time() < parsed.windows[1].start_time());

    let restored = InMemoryBackend::from_snapshot(parsed).unwrap();
    assert_eq!(restored.list_windows(svc).await.unwrap().len(), 2);
    assert!(restored.get_service(svc).await.unwrap().is_some());
}

fn window_for(service: ServiceId, start: &str, end: &str) -> AvailabilityWindow {
    AvailabilityWindow::new(
        WindowId::new(),
        service,
        DayOfWeek::new(0).unwrap(),
        normalize_time(start).unwrap(),
        normalize_time(end).unwrap(),
    )
    .unwrap()
}

#[test]
fn snapshot_with_duplicate_window_ids_rejected() {
    let service = new_service();
    let window = window_for(service.id, "09:00", "10:00");
    let snapshot = BackendSnapshot {
        services: vec![service],
        windows: vec![window.clone(), window.clone()],
    };

    assert!(matches!(
        InMemoryBackend::from_snapshot(snapshot),
        Err(BackendError::Duplicate(id)) if id == window.id()
    ));
}

#[test]
fn snapshot_with_overlapping_windows_rejected() {
    let service = new_service();
    let first = window_for(service.id, "09:00", "11:00");
    let second = window_for(service.id, "10:00", "12:00");
    let snapshot = BackendSnapshot {
        services: vec![service],
        windows: vec![first.clone(), second.clone()],
    };

    assert_eq!(
        InMemoryBackend::from_snapshot(snapshot).unwrap_err(),
        BackendError::Overlap {
            window: second.id(),
            conflicting: first.id(),
        }
    );
}

#[tokio::test]
async fn snapshot_keeps_adjacent_windows_and_separate_services() {
    let (a, b) = (new_service(), new_service());
    let snapshot = BackendSnapshot {
        windows: vec![
            window_for(a.id, "09:00", "10:00"),
            window_for(a.id, "10:00", "11:00"),
            window_for(b.id, "09:30", "10:30"),
        ],
        services: vec![a.clone(), b.clone()],
    };

    let restored = InMemoryBackend::from_snapshot(snapshot).unwrap();
    assert_eq!(restored.list_windows(a.id).await.unwrap().len(), 2);
    assert_eq!(restored.list_windows(b.id).await.unwrap().len(), 1);
}

#[test]
fn snapshot_with_orphan_window_rejected() {
    let missing = ServiceId::new();
    let window = window_for(missing, "09:00", "10:00");
    let snapshot = BackendSnapshot {
        services: vec![new_service()],
        windows: vec![window.clone()],
    };

    assert_eq!(
        InMemoryBackend::from_snapshot(snapshot).unwrap_err(),
        BackendError::UnknownService {
            window: window.id(),
            service: missing,
        }
    );
}

#[test]
fn inverted_window_cannot_be_deserialized() {
    let json = format!(
        r#"{{"id":"{}","service_id":"{}","day_of_week":1,
            "start_time":"2000-01-01T10:00:00Z","end_time":"2000-01-01T09:00:00Z"}}"#,
        WindowId::new(),
        ServiceId::new()
    );
    assert!(serde_json::from_str::<AvailabilityWindow>(&json).is_err());
}

#[test]
fn day_of_week_out_of_range_cannot_be_deserialized() {
    assert!(serde_json::from_str::<DayOfWeek>("7").is_err());
    assert_eq!(serde_json::from_str::<DayOfWeek>("6").unwrap().value(), 6);
}
