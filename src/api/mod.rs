pub mod adapter;
mod error;
pub mod http;
pub mod memory;
pub mod wire;

pub use error::ApiError;

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{ResourceId, ResourceKind, SlotId};
use wire::*;

/// Read side of the reservation backend.
///
/// Implementations return wire payloads; `adapter` turns them into the
/// domain model.
#[async_trait]
pub trait PlanningSource: Send + Sync {
    async fn list_time_slots(&self) -> Result<Vec<SlotDto>, ApiError>;

    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<ResourceDto>, ApiError>;

    /// Day planning keyed by slot display name.
    async fn get_day_planning(&self, date: NaiveDate) -> Result<DayPlanningPayload, ApiError>;

    /// Bookings of one kind with `from <= date <= to`.
    async fn list_bookings(
        &self,
        kind: ResourceKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ReservationDto>, ApiError>;

    /// The authenticated user's own bookings with `from <= date <= to`.
    async fn list_my_bookings(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<MyBookingsPayload, ApiError>;

    async fn check_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<Availability, ApiError>;

    /// Booking counters over everything the backend holds.
    async fn get_statistics(&self) -> Result<BookingTotals, ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityRequest {
    pub kind: ResourceKind,
    pub resource: ResourceId,
    pub date: NaiveDate,
    pub slot: SlotId,
}

impl AvailabilityRequest {
    pub fn to_wire(&self) -> AvailabilityRequestDto {
        AvailabilityRequestDto {
            type_ressource: self.kind.wire_name().to_string(),
            ressource_id: self.resource.0,
            date: self.date,
            creneau_id: self.slot.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    pub conflict_reason: Option<String>,
}

impl From<AvailabilityDto> for Availability {
    fn from(dto: AvailabilityDto) -> Self {
        Self {
            available: dto.disponible,
            conflict_reason: dto.conflit,
        }
    }
}

/// Backend-wide booking counts, not bounded by any date window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BookingTotals {
    pub rooms: u64,
    pub equipment: u64,
}

impl BookingTotals {
    pub fn total(&self) -> u64 {
        self.rooms + self.equipment
    }
}

impl From<StatisticsDto> for BookingTotals {
    fn from(dto: StatisticsDto) -> Self {
        Self {
            rooms: dto.total_reservations_salles,
            equipment: dto.total_reservations_materiels,
        }
    }
}

/// Session credentials, owned outside this crate.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;

    /// Called when the backend answers 401.
    fn on_unauthorized(&self);
}

/// Token fixed at startup, forgotten after the first 401.
pub struct StaticToken {
    token: Mutex<Option<String>>,
}

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Mutex::new(token),
        }
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn on_unauthorized(&self) {
        if let Ok(mut t) = self.token.lock()
            && t.take().is_some()
        {
            tracing::warn!("backend rejected session token; cleared");
        }
    }
}
