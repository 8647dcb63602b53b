//! The availability window manager: the core object the HTTP layer calls into.
//!
//! It is built explicitly from a backend, a clock and an [`EngineConfig`], and
//! keeps no process-wide state. Callers are expected to have run the
//! [`crate::access`] checks already.

use std::sync::Arc;

use chrono::NaiveDate;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::backend::AvailabilityBackend;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::model::{
    AvailabilityWindow, DayOfWeek, NewService, PrincipalId, Service, ServiceId, Slot, WindowId,
};
use crate::slots::SlotQueryEngine;
use crate::store::{CandidateWindow, WindowStore};
use crate::time::normalize_range;

/// A provider's window request as it arrives from the boundary, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAvailability {
    pub day_of_week: u8,
    /// `"HH:MM"`
    pub start_time: String,
    /// `"HH:MM"`
    pub end_time: String,
}

impl NewAvailability {
    pub fn new(
        day_of_week: u8,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Self {
        Self {
            day_of_week,
            start_time: start_time.into(),
            end_time: end_time.into(),
        }
    }
}

/// Entry point for declaring availability windows and querying bookable slots.
pub struct AvailabilityManager<B> {
    store: Arc<WindowStore<B>>,
    slots: SlotQueryEngine<B>,
}

impl<B: AvailabilityBackend> AvailabilityManager<B> {
    pub fn new(
        backend: Arc<B>,
        clock: Arc<dyn Clock + Send + Sync>,
        config: &EngineConfig,
    ) -> Self {
        let store = Arc::new(WindowStore::new(backend, config.store_timeout()));
        let slots = SlotQueryEngine::new(Arc::clone(&store), clock);
        Self { store, slots }
    }

    pub fn store(&self) -> &WindowStore<B> {
        &self.store
    }

    /// Declare a new availability window for a service.
    ///
    /// Request fields are validated first, then the service is looked up, then
    /// the window is checked against the service's existing windows and stored
    /// only if it overlaps none of them.
    ///
    /// # Errors
    /// `InvalidRequest` for a day outside 0..=6, `InvalidTimeFormat` for
    /// malformed or inverted times, `ServiceNotFound`, `OverlappingWindow`, or
    /// `StoreUnavailable`.
    #[instrument(skip(self, request), fields(%service_id))]
    pub async fn create_availability(
        &self,
        service_id: ServiceId,
        request: NewAvailability,
    ) -> Result<WindowId> {
        let day_of_week = DayOfWeek::new(request.day_of_week)?;
        let (start_time, end_time) = normalize_range(&request.start_time, &request.end_time)?;
        let candidate = CandidateWindow {
            day_of_week,
            start_time,
            end_time,
        };

        let window_id = self.store.insert(service_id, candidate).await?;
        info!(
            %window_id,
            start = %request.start_time,
            end = %request.end_time,
            "availability window created"
        );
        Ok(window_id)
    }

    /// Bookable slots for a service on `date`, ascending by start time.
    ///
    /// # Errors
    /// `ServiceNotFound` or `StoreUnavailable`.
    #[instrument(skip(self), fields(%service_id, %date))]
    pub async fn query_slots(&self, service_id: ServiceId, date: NaiveDate) -> Result<Vec<Slot>> {
        let slots = self.slots.slots_for(service_id, date).await?;
        debug!(count = slots.len(), "slots resolved");
        Ok(slots)
    }

    /// Validate and store a new service owned by `provider_id`.
    ///
    /// # Errors
    /// `InvalidRequest` for an invalid draft, `StoreUnavailable` if the
    /// backend fails.
    #[instrument(skip(self, draft), fields(%provider_id))]
    pub async fn register_service(
        &self,
        provider_id: PrincipalId,
        draft: NewService,
    ) -> Result<Service> {
        let service = Service::new(ServiceId::new(), provider_id, draft)?;
        self.store.put_service(service.clone()).await?;
        info!(service_id = %service.id, name = %service.name, "service registered");
        Ok(service)
    }

    /// Look up a service.
    ///
    /// # Errors
    /// `ServiceNotFound` or `StoreUnavailable`.
    pub async fn service(&self, service_id: ServiceId) -> Result<Service> {
        self.store.service(service_id).await
    }

    /// Every window of an existing service, in no guaranteed order.
    ///
    /// # Errors
    /// `ServiceNotFound` or `StoreUnavailable`.
    pub async fn windows_for(&self, service_id: ServiceId) -> Result<Vec<AvailabilityWindow>> {
        self.store.service(service_id).await?;
        self.store.list_for_service(service_id).await
    }

    /// Delete a window. Returns `false` if the service had no such window.
    ///
    /// # Errors
    /// `ServiceNotFound` or `StoreUnavailable`.
    #[instrument(skip(self), fields(%service_id, %window_id))]
    pub async fn remove_availability(
        &self,
        service_id: ServiceId,
        window_id: WindowId,
    ) -> Result<bool> {
        let removed = self.store.remove(service_id, window_id).await?;
        if removed {
            info!("availability window removed");
        }
        Ok(removed)
    }
}
