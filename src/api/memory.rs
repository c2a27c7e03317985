use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::model::*;

use super::adapter::{booking_to_wire, resource_to_wire, slot_to_wire};
use super::wire::*;
use super::{ApiError, Availability, AvailabilityRequest, BookingTotals, PlanningSource};

/// In-process backend. Serves the same wire payloads as the REST API from
/// domain values, with per-date failure injection and call counters.
pub struct MemorySource {
    catalog: RwLock<ResourceCatalog>,
    bookings: RwLock<Vec<Booking>>,
    owner: Option<UserId>,
    failing_dates: DashMap<NaiveDate, ApiError>,
    latency: Option<Duration>,
    calls: DashMap<&'static str, AtomicUsize>,
}

impl MemorySource {
    pub fn new(catalog: ResourceCatalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            bookings: RwLock::new(Vec::new()),
            owner: None,
            failing_dates: DashMap::new(),
            latency: None,
            calls: DashMap::new(),
        }
    }

    /// Bookings whose `owner_id` matches are served by `list_my_bookings`.
    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Delay every answer, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn insert_booking(&self, booking: Booking) {
        self.bookings.write().await.push(booking);
    }

    pub async fn remove_booking(&self, id: BookingId) -> Option<Booking> {
        let mut bookings = self.bookings.write().await;
        let pos = bookings.iter().position(|b| b.id == id)?;
        Some(bookings.remove(pos))
    }

    /// Swap the catalog, as an administrator adding or renaming slots would.
    pub async fn replace_catalog(&self, catalog: ResourceCatalog) {
        *self.catalog.write().await = catalog;
    }

    /// Make every request touching `date` fail with `error`.
    pub fn fail_date(&self, date: NaiveDate, error: ApiError) {
        self.failing_dates.insert(date, error);
    }

    pub fn heal_date(&self, date: NaiveDate) {
        self.failing_dates.remove(&date);
    }

    /// Number of calls served for an operation name (e.g. `"get_day_planning"`).
    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .get(operation)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    async fn enter(&self, operation: &'static str) {
        self.calls
            .entry(operation)
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_range(&self, from: NaiveDate, to: NaiveDate) -> Result<(), ApiError> {
        for entry in self.failing_dates.iter() {
            if from <= *entry.key() && *entry.key() <= to {
                return Err(entry.value().clone());
            }
        }
        Ok(())
    }

    async fn wire_bookings(
        &self,
        filter: impl Fn(&Booking) -> bool,
    ) -> Vec<ReservationDto> {
        let catalog = self.catalog.read().await;
        self.bookings
            .read()
            .await
            .iter()
            .filter(|b| filter(*b))
            .map(|b| {
                let slot_name = catalog.slot(b.slot_id).map(|s| s.name.as_str());
                booking_to_wire(b, slot_name)
            })
            .collect()
    }
}

#[async_trait]
impl PlanningSource for MemorySource {
    async fn list_time_slots(&self) -> Result<Vec<SlotDto>, ApiError> {
        self.enter("list_time_slots").await;
        Ok(self.catalog.read().await.slots.iter().map(slot_to_wire).collect())
    }

    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<ResourceDto>, ApiError> {
        self.enter("list_resources").await;
        Ok(self
            .catalog
            .read()
            .await
            .resources(kind)
            .iter()
            .map(resource_to_wire)
            .collect())
    }

    async fn get_day_planning(&self, date: NaiveDate) -> Result<DayPlanningPayload, ApiError> {
        self.enter("get_day_planning").await;
        self.check_range(date, date)?;

        let catalog = self.catalog.read().await;
        let bookings = self.bookings.read().await;
        let mut payload = DayPlanningPayload {
            date: Some(date),
            planning: Default::default(),
        };
        for b in bookings.iter().filter(|b| b.date == date) {
            // The real backend cannot key an unknown slot either.
            let Some(slot) = catalog.slot(b.slot_id) else {
                continue;
            };
            let entry = payload.planning.entry(slot.name.clone()).or_default();
            let dto = booking_to_wire(b, Some(&slot.name));
            match b.kind {
                ResourceKind::Room => entry.salle.push(dto),
                ResourceKind::Equipment => entry.materiels.push(dto),
            }
        }
        Ok(payload)
    }

    async fn list_bookings(
        &self,
        kind: ResourceKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ReservationDto>, ApiError> {
        self.enter("list_bookings").await;
        self.check_range(from, to)?;
        Ok(self
            .wire_bookings(|b| b.kind == kind && from <= b.date && b.date <= to)
            .await)
    }

    async fn list_my_bookings(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<MyBookingsPayload, ApiError> {
        self.enter("list_my_bookings").await;
        let Some(owner) = self.owner else {
            return Err(ApiError::Unauthorized);
        };
        let mine = |b: &Booking| b.owner_id == Some(owner) && from <= b.date && b.date <= to;
        Ok(MyBookingsPayload {
            reservations_salles: self
                .wire_bookings(|b| b.kind == ResourceKind::Room && mine(b))
                .await,
            reservations_materiels: self
                .wire_bookings(|b| b.kind == ResourceKind::Equipment && mine(b))
                .await,
        })
    }

    async fn check_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<Availability, ApiError> {
        self.enter("check_availability").await;
        if self
            .catalog
            .read()
            .await
            .resource(request.kind, request.resource)
            .is_none()
        {
            return Err(ApiError::NotFound);
        }
        let conflict = self
            .bookings
            .read()
            .await
            .iter()
            .find(|b| {
                b.kind == request.kind
                    && b.resource_id == request.resource
                    && b.date == request.date
                    && b.slot_id == request.slot
            })
            .map(|b| b.id);
        Ok(Availability {
            available: conflict.is_none(),
            conflict_reason: conflict.map(|id| format!("already booked (reservation {id})")),
        })
    }

    async fn get_statistics(&self) -> Result<BookingTotals, ApiError> {
        self.enter("get_statistics").await;
        let bookings = self.bookings.read().await;
        let rooms = bookings
            .iter()
            .filter(|b| b.kind == ResourceKind::Room)
            .count() as u64;
        Ok(BookingTotals {
            rooms,
            equipment: bookings.len() as u64 - rooms,
        })
    }
}
