//! Availability store adapter: validated, serialized writes over a backend.
//!
//! Inserts for one service run "load existing, check overlap, persist" under a
//! per-service lock, so two concurrent candidates can never both pass against
//! the same pre-insert state. Different services use different locks.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::backend::{AvailabilityBackend, BackendError};
use crate::error::{AvailabilityError, Result};
use crate::model::{AvailabilityWindow, DayOfWeek, Service, ServiceId, WindowId};
use crate::overlap::{self, TimeRange};

/// A normalized window that has not been admitted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateWindow {
    pub day_of_week: DayOfWeek,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl CandidateWindow {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

/// Owns the per-service window collections on top of an [`AvailabilityBackend`].
///
/// The lock map only holds entries for services with an operation in flight.
pub struct WindowStore<B> {
    backend: Arc<B>,
    locks: Mutex<HashMap<ServiceId, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl<B: AvailabilityBackend> WindowStore<B> {
    /// Wrap a backend; every call to it is bounded by `timeout`.
    pub fn new(backend: Arc<B>, timeout: Duration) -> Self {
        Self {
            backend,
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Fetch a service, failing if it does not exist.
    ///
    /// # Errors
    /// `ServiceNotFound` if absent, `StoreUnavailable` if the backend fails.
    pub async fn service(&self, service_id: ServiceId) -> Result<Service> {
        self.call("get_service", self.backend.get_service(service_id))
            .await?
            .ok_or(AvailabilityError::ServiceNotFound(service_id))
    }

    /// Persist a service record.
    ///
    /// # Errors
    /// `StoreUnavailable` if the backend fails.
    pub async fn put_service(&self, service: Service) -> Result<()> {
        self.call("put_service", self.backend.put_service(service)).await
    }

    /// Admit and persist a candidate window for a service.
    ///
    /// The service must exist; that is checked before any overlap test. The
    /// candidate is then compared against every stored window of the service
    /// while holding that service's lock.
    ///
    /// # Errors
    /// `ServiceNotFound`, `InvalidTimeFormat` for a degenerate candidate,
    /// `OverlappingWindow` on conflict, or `StoreUnavailable`.
    pub async fn insert(
        &self,
        service_id: ServiceId,
        candidate: CandidateWindow,
    ) -> Result<WindowId> {
        self.service(service_id).await?;

        let lock = self.service_lock(service_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.admit(service_id, candidate).await
        };
        self.release_lock(service_id, lock).await;
        result
    }

    async fn admit(&self, service_id: ServiceId, candidate: CandidateWindow) -> Result<WindowId> {
        let existing = self.list_for_service(service_id).await?;
        let range = candidate.range();
        if let Err(err) = overlap::check_admissible(&range, &existing) {
            if matches!(err, AvailabilityError::OverlappingWindow { .. }) {
                for hit in overlap::find_overlaps(&range, &existing) {
                    warn!(
                        %service_id,
                        conflicting = %hit.window_id,
                        overlap_minutes = hit.overlap_minutes,
                        "rejecting overlapping window"
                    );
                }
            }
            return Err(err);
        }

        let window = AvailabilityWindow::new(
            WindowId::new(),
            service_id,
            candidate.day_of_week,
            candidate.start_time,
            candidate.end_time,
        )?;
        let window_id = window.id();
        self.call("insert_window", self.backend.insert_window(window)).await?;
        debug!(%service_id, %window_id, existing = existing.len(), "window admitted");
        Ok(window_id)
    }

    /// All windows of a service, in no guaranteed order.
    ///
    /// # Errors
    /// `StoreUnavailable` if the backend fails.
    pub async fn list_for_service(
        &self,
        service_id: ServiceId,
    ) -> Result<Vec<AvailabilityWindow>> {
        self.call("list_windows", self.backend.list_windows(service_id)).await
    }

    /// Delete one window of a service. Returns `false` if it was not there.
    ///
    /// Removing a window cannot create an overlap, but it still takes the
    /// service lock so an insert never validates against a half-deleted view.
    ///
    /// # Errors
    /// `ServiceNotFound` or `StoreUnavailable`.
    pub async fn remove(&self, service_id: ServiceId, window_id: WindowId) -> Result<bool> {
        self.service(service_id).await?;

        let lock = self.service_lock(service_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.call(
                "delete_window",
                self.backend.delete_window(service_id, window_id),
            )
            .await
        };
        self.release_lock(service_id, lock).await;
        result
    }

    /// Number of services whose lock is currently held or awaited.
    pub async fn active_locks(&self) -> usize {
        self.locks.lock().await.len()
    }

    async fn service_lock(&self, service_id: ServiceId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(service_id).or_default())
    }

    /// Drop the map entry once no other task holds a handle to the lock.
    async fn release_lock(&self, service_id: ServiceId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // Handles are only cloned under the map lock: one in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&service_id);
        }
    }

    async fn call<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = std::result::Result<T, BackendError>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(op, error = %err, "backing store call failed");
                Err(err.into())
            }
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                warn!(op, timeout_ms, "backing store call timed out");
                Err(AvailabilityError::StoreUnavailable(format!(
                    "{op} timed out after {timeout_ms} ms"
                )))
            }
        }
    }
}
