//! # availability-engine
//!
//! The availability window manager of a booking platform.
//!
//! Providers declare recurring availability windows for their services; the
//! engine rejects any window that would overlap one the service already has,
//! and answers which slots a consumer can book on a given date. Windows are
//! half-open `[start, end)` intervals, so back-to-back windows are legal.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use availability_engine::{
//!     AvailabilityManager, EngineConfig, InMemoryBackend, NewAvailability, NewService,
//!     PrincipalId, ServiceType,
//! };
//! use chrono::NaiveDate;
//! use mockable::DefaultClock;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), availability_engine::AvailabilityError> {
//! let manager = AvailabilityManager::new(
//!     Arc::new(InMemoryBackend::new()),
//!     Arc::new(DefaultClock),
//!     &EngineConfig::default(),
//! );
//!
//! let service = manager
//!     .register_service(
//!         PrincipalId::new(),
//!         NewService {
//!             name: "Physio".to_string(),
//!             service_type: ServiceType::Medical,
//!             duration_minutes: 60,
//!         },
//!     )
//!     .await?;
//!
//! manager
//!     .create_availability(service.id, NewAvailability::new(1, "09:00", "10:00"))
//!     .await?;
//! manager
//!     .create_availability(service.id, NewAvailability::new(1, "10:00", "11:00"))
//!     .await?;
//!
//! let date = NaiveDate::from_ymd_opt(2099, 1, 5).unwrap();
//! let slots = manager.query_slots(service.id, date).await?;
//! assert_eq!(slots.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`time`] — `"HH:MM"` strings → instants on a fixed reference date
//! - [`overlap`] — half-open interval overlap detection and admission
//! - [`backend`] — store port and the in-memory adapter
//! - [`store`] — validated, per-service serialized window inserts
//! - [`slots`] — projection of windows onto a queried date
//! - [`manager`] — the core object exposing create/query operations
//! - [`access`] — provider/consumer capability checks for the boundary
//! - [`config`] — TOML engine configuration
//! - [`model`] — services, windows, slots and identifiers
//! - [`error`] — Error types

pub mod access;
pub mod backend;
pub mod config;
pub mod error;
pub mod manager;
pub mod model;
pub mod overlap;
pub mod slots;
pub mod store;
pub mod time;

pub use access::{require_owner, require_provider, AccessError, Principal, Role};
pub use backend::{AvailabilityBackend, BackendError, BackendSnapshot, InMemoryBackend};
pub use config::{ConfigError, EngineConfig};
pub use error::AvailabilityError;
pub use manager::{AvailabilityManager, NewAvailability};
pub use model::{
    AvailabilityWindow, DayOfWeek, NewService, PrincipalId, Service, ServiceId, ServiceType, Slot,
    WindowId,
};
pub use overlap::{check_admissible, find_overlaps, TimeRange};
pub use slots::project_slots;
pub use time::normalize_time;
