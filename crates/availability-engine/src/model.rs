//! Domain types: services, availability windows and the slots derived from them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AvailabilityError, Result};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The underlying UUID.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id! {
    /// Identifier of a [`Service`].
    ServiceId
}

define_id! {
    /// Identifier of an [`AvailabilityWindow`]. Also used as the slot id.
    WindowId
}

define_id! {
    /// Identifier of an authenticated user, as asserted by the identity provider.
    PrincipalId
}

/// Day of the week a window applies to, `0` (Sunday) through `6` (Saturday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    /// Validate a raw day number.
    ///
    /// # Errors
    /// Returns `AvailabilityError::InvalidRequest` when `day` is greater than 6.
    pub fn new(day: u8) -> Result<Self> {
        if day > 6 {
            return Err(AvailabilityError::InvalidRequest(format!(
                "day of week must be in 0..=6, got {day}"
            )));
        }
        Ok(Self(day))
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Counterpart of a chrono weekday, counting from Sunday.
    pub fn from_weekday(weekday: Weekday) -> Self {
        // num_days_from_sunday is always in 0..=6
        Self(weekday.num_days_from_sunday() as u8)
    }
}

impl TryFrom<u8> for DayOfWeek {
    type Error = AvailabilityError;

    fn try_from(day: u8) -> Result<Self> {
        Self::new(day)
    }
}

impl From<DayOfWeek> for u8 {
    fn from(day: DayOfWeek) -> Self {
        day.0
    }
}

/// Category a service is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Medical,
    HouseHelp,
    Beauty,
    Fitness,
    Education,
    Other,
}

impl FromStr for ServiceType {
    type Err = AvailabilityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MEDICAL" => Ok(Self::Medical),
            "HOUSE_HELP" => Ok(Self::HouseHelp),
            "BEAUTY" => Ok(Self::Beauty),
            "FITNESS" => Ok(Self::Fitness),
            "EDUCATION" => Ok(Self::Education),
            "OTHER" => Ok(Self::Other),
            other => Err(AvailabilityError::InvalidRequest(format!(
                "unknown service type '{other}'"
            ))),
        }
    }
}

/// Shortest bookable service.
pub const MIN_SERVICE_MINUTES: u32 = 30;
/// Longest bookable service.
pub const MAX_SERVICE_MINUTES: u32 = 120;
/// Service durations are whole multiples of this step.
pub const SERVICE_MINUTES_STEP: u32 = 30;

/// A provider's request to publish a service, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    pub service_type: ServiceType,
    pub duration_minutes: u32,
}

/// A published service that availability windows attach to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub provider_id: PrincipalId,
    pub name: String,
    pub service_type: ServiceType,
    pub duration_minutes: u32,
}

impl Service {
    /// Validate a draft and assign it an identifier.
    ///
    /// # Errors
    /// Returns `AvailabilityError::InvalidRequest` if the name is blank or the
    /// duration is not a multiple of 30 minutes within 30..=120.
    pub fn new(id: ServiceId, provider_id: PrincipalId, draft: NewService) -> Result<Self> {
        if draft.name.trim().is_empty() {
            return Err(AvailabilityError::InvalidRequest(
                "service name must not be empty".to_string(),
            ));
        }
        let minutes = draft.duration_minutes;
        if !(MIN_SERVICE_MINUTES..=MAX_SERVICE_MINUTES).contains(&minutes)
            || minutes % SERVICE_MINUTES_STEP != 0
        {
            return Err(AvailabilityError::InvalidRequest(format!(
                "duration must be a multiple of {SERVICE_MINUTES_STEP} between \
                 {MIN_SERVICE_MINUTES} and {MAX_SERVICE_MINUTES} minutes, got {minutes}"
            )));
        }
        Ok(Self {
            id,
            provider_id,
            name: draft.name,
            service_type: draft.service_type,
            duration_minutes: minutes,
        })
    }
}

/// A provider-declared availability interval, normalized to the reference date.
///
/// `start_time < end_time` always holds; [`AvailabilityWindow::new`] and
/// deserialization both enforce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowRecord")]
pub struct AvailabilityWindow {
    id: WindowId,
    service_id: ServiceId,
    day_of_week: DayOfWeek,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl AvailabilityWindow {
    /// Build a window from already-normalized instants.
    ///
    /// # Errors
    /// Returns `AvailabilityError::InvalidTimeFormat` when `start_time >= end_time`.
    pub fn new(
        id: WindowId,
        service_id: ServiceId,
        day_of_week: DayOfWeek,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self> {
        if start_time >= end_time {
            return Err(AvailabilityError::InvalidTimeFormat(format!(
                "window start {} must be before end {}",
                start_time.format("%H:%M"),
                end_time.format("%H:%M")
            )));
        }
        Ok(Self {
            id,
            service_id,
            day_of_week,
            start_time,
            end_time,
        })
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn service_id(&self) -> ServiceId {
        self.service_id
    }

    pub fn day_of_week(&self) -> DayOfWeek {
        self.day_of_week
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }
}

/// Unchecked wire shape of a window; converted through [`AvailabilityWindow::new`].
#[derive(Deserialize)]
struct WindowRecord {
    id: WindowId,
    service_id: ServiceId,
    day_of_week: DayOfWeek,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl TryFrom<WindowRecord> for AvailabilityWindow {
    type Error = AvailabilityError;

    fn try_from(raw: WindowRecord) -> Result<Self> {
        Self::new(
            raw.id,
            raw.service_id,
            raw.day_of_week,
            raw.start_time,
            raw.end_time,
        )
    }
}

/// A consumer-facing view of a window on a specific date. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub slot_id: WindowId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}
