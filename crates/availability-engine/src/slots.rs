//! Slot queries -- which windows a consumer can book on a given date.
//!
//! Each window's time-of-day is re-anchored onto the queried date. A window is
//! surfaced when both re-anchored ends are at or after the query's lower bound,
//! which is the start of the date or the current instant, whichever is later.
//! So a past date yields nothing, today yields the windows that have not
//! started yet, and a future date yields every window.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use mockable::Clock;

use crate::backend::AvailabilityBackend;
use crate::error::Result;
use crate::model::{AvailabilityWindow, ServiceId, Slot};
use crate::store::WindowStore;
use crate::time::reanchor;

/// Earliest instant a slot on `date` may start, given the current time.
pub fn lower_bound(date: NaiveDate, now: DateTime<Utc>) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc().max(now)
}

/// Project windows onto `date`, keeping the ones at or after the lower bound.
///
/// Output is sorted by start time, then end time, then slot id, independent of
/// the input order.
pub fn project_slots(
    windows: &[AvailabilityWindow],
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<Slot> {
    let bound = lower_bound(date, now);

    let mut slots: Vec<Slot> = windows
        .iter()
        .map(|window| Slot {
            slot_id: window.id(),
            start_time: reanchor(window.start_time(), date),
            end_time: reanchor(window.end_time(), date),
        })
        .filter(|slot| slot.start_time >= bound && slot.end_time >= bound)
        .collect();

    slots.sort_by_key(|slot| (slot.start_time, slot.end_time, slot.slot_id));
    slots
}

/// Answers slot queries by reading through a [`WindowStore`].
pub struct SlotQueryEngine<B> {
    store: Arc<WindowStore<B>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<B: AvailabilityBackend> SlotQueryEngine<B> {
    pub fn new(store: Arc<WindowStore<B>>, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { store, clock }
    }

    /// Bookable slots of a service on `date`, sorted ascending by start time.
    ///
    /// A service without matching windows yields an empty list.
    ///
    /// # Errors
    /// `ServiceNotFound` if the service does not exist, `StoreUnavailable` if
    /// the backend fails.
    pub async fn slots_for(&self, service_id: ServiceId, date: NaiveDate) -> Result<Vec<Slot>> {
        self.store.service(service_id).await?;
        let windows = self.store.list_for_service(service_id).await?;
        Ok(project_slots(&windows, date, self.clock.utc()))
    }
}
