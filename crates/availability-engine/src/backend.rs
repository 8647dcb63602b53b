//! Port for the durable service/availability record store, plus an in-memory adapter.
//!
//! The core only needs keyed lookups and a conditional insert from the store.
//! Validation and overlap checking happen above this layer, in
//! [`crate::store::WindowStore`].

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::error::AvailabilityError;
use crate::model::{AvailabilityWindow, Service, ServiceId, WindowId};
use crate::overlap::{self, TimeRange};

/// Failures reported by a backing store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The store could not be reached or rejected the operation.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The uniqueness precondition on the window id failed.
    #[error("window {0} already exists")]
    Duplicate(WindowId),

    /// A restored window points at a service the snapshot does not contain.
    #[error("window {window} references unknown service {service}")]
    UnknownService { window: WindowId, service: ServiceId },

    /// A restored window overlaps another window of the same service.
    #[error("window {window} overlaps window {conflicting}")]
    Overlap {
        window: WindowId,
        conflicting: WindowId,
    },
}

/// Keyed store the availability core reads and writes through.
///
/// Implementations must make `insert_window` atomic: either the window is
/// stored in full or not at all. Callers bound every call with a timeout and
/// drop the future when it expires, so a dropped `insert_window` must also
/// commit nothing, or the adapter must make a later retry of the same window
/// id idempotent.
#[async_trait]
pub trait AvailabilityBackend: Send + Sync {
    /// Look up a service by id. `Ok(None)` means it does not exist.
    async fn get_service(&self, id: ServiceId) -> Result<Option<Service>, BackendError>;

    /// Create or replace a service record.
    async fn put_service(&self, service: Service) -> Result<(), BackendError>;

    /// All windows attached to a service, in no particular order.
    async fn list_windows(
        &self,
        service_id: ServiceId,
    ) -> Result<Vec<AvailabilityWindow>, BackendError>;

    /// Store a new window. Fails with [`BackendError::Duplicate`] if its id is taken.
    async fn insert_window(&self, window: AvailabilityWindow) -> Result<(), BackendError>;

    /// Remove a window. Returns `false` when no such window belonged to the service.
    async fn delete_window(
        &self,
        service_id: ServiceId,
        window_id: WindowId,
    ) -> Result<bool, BackendError>;
}

/// Serializable dump of an [`InMemoryBackend`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendSnapshot {
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub windows: Vec<AvailabilityWindow>,
}

#[derive(Debug, Default)]
struct Tables {
    services: BTreeMap<ServiceId, Service>,
    windows: HashMap<ServiceId, Vec<AvailabilityWindow>>,
    owners: HashMap<WindowId, ServiceId>,
}

/// Process-local store backed by hash maps behind a `tokio` read/write lock.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    tables: RwLock<Tables>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot.
    ///
    /// Every window is admitted against the windows of its service restored
    /// before it, so a loaded store holds the same guarantees as one built
    /// through inserts.
    ///
    /// # Errors
    /// [`BackendError::Duplicate`] if two windows share an id,
    /// [`BackendError::UnknownService`] for a window without a service record,
    /// [`BackendError::Overlap`] if two windows of one service overlap.
    pub fn from_snapshot(snapshot: BackendSnapshot) -> Result<Self, BackendError> {
        let mut tables = Tables::default();
        for service in snapshot.services {
            tables.services.insert(service.id, service);
        }
        for window in snapshot.windows {
            let (window_id, service_id) = (window.id(), window.service_id());
            if !tables.services.contains_key(&service_id) {
                return Err(BackendError::UnknownService {
                    window: window_id,
                    service: service_id,
                });
            }
            if tables.owners.insert(window_id, service_id).is_some() {
                return Err(BackendError::Duplicate(window_id));
            }
            let accepted = tables.windows.entry(service_id).or_default();
            match overlap::check_admissible(&TimeRange::from(&window), accepted.as_slice()) {
                Ok(()) => accepted.push(window),
                Err(AvailabilityError::OverlappingWindow { conflicting }) => {
                    return Err(BackendError::Overlap {
                        window: window_id,
                        conflicting,
                    });
                }
                Err(err) => return Err(BackendError::Unavailable(err.to_string())),
            }
        }
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }

    /// Dump the current contents, services by id and windows by service then start.
    pub async fn snapshot(&self) -> BackendSnapshot {
        let tables = self.tables.read().await;
        let services: Vec<Service> = tables.services.values().cloned().collect();
        let mut windows: Vec<AvailabilityWindow> =
            tables.windows.values().flatten().cloned().collect();
        windows.sort_by_key(|w| (w.service_id(), w.start_time(), w.id()));
        BackendSnapshot { services, windows }
    }
}

#[async_trait]
impl AvailabilityBackend for InMemoryBackend {
    async fn get_service(&self, id: ServiceId) -> Result<Option<Service>, BackendError> {
        Ok(self.tables.read().await.services.get(&id).cloned())
    }

    async fn put_service(&self, service: Service) -> Result<(), BackendError> {
        self.tables.write().await.services.insert(service.id, service);
        Ok(())
    }

    async fn list_windows(
        &self,
        service_id: ServiceId,
    ) -> Result<Vec<AvailabilityWindow>, BackendError> {
        Ok(self
            .tables
            .read()
            .await
            .windows
            .get(&service_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_window(&self, window: AvailabilityWindow) -> Result<(), BackendError> {
        let mut tables = self.tables.write().await;
        if tables.owners.contains_key(&window.id()) {
            return Err(BackendError::Duplicate(window.id()));
        }
        tables.owners.insert(window.id(), window.service_id());
        tables
            .windows
            .entry(window.service_id())
            .or_default()
            .push(window);
        Ok(())
    }

    async fn delete_window(
        &self,
        service_id: ServiceId,
        window_id: WindowId,
    ) -> Result<bool, BackendError> {
        let mut tables = self.tables.write().await;
        if tables.owners.get(&window_id) != Some(&service_id) {
            return Ok(false);
        }
        tables.owners.remove(&window_id);
        if let Some(windows) = tables.windows.get_mut(&service_id) {
            windows.retain(|w| w.id() != window_id);
        }
        Ok(true)
    }
}
