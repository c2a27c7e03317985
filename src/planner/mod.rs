mod error;

pub use error::PlannerError;

use std::sync::Arc;
use std::time::Instant;

use chrono::{Days, NaiveDate};

use crate::api::adapter::{
    bookings_from_wire, normalize_day_planning, resource_from_wire, slot_from_wire,
};
use crate::api::wire::{DayPlanningPayload, ReservationDto};
use crate::api::{ApiError, Availability, AvailabilityRequest, BookingTotals, PlanningSource};
use crate::cache::QueryCache;
use crate::config::CacheTtls;
use crate::limits::{DASHBOARD_HORIZON_DAYS, MAX_STATS_WINDOW_DAYS};
use crate::model::*;
use crate::observability::{GRID_ANOMALIES_TOTAL, STATS_DURATION_SECONDS};
use crate::planning::{
    build_grid, build_week, compute_stats, summarize_dashboard, DashboardSummary, GridReport,
    StatsRange, StatsSnapshot, WeekReport,
};

const CATALOG_KEY: &str = "catalog";
const PLANNING_PREFIX: &str = "planning:";
const BOOKINGS_PREFIX: &str = "bookings:";
const DASHBOARD_PREFIX: &str = "dashboard:";
const STATISTICS_KEY: &str = "statistics";

/// Room and equipment bookings of one date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeBookings {
    pub rooms: Vec<Booking>,
    pub equipment: Vec<Booking>,
    pub anomalies: Vec<Anomaly>,
}

impl RangeBookings {
    fn from_wire(rooms: Vec<ReservationDto>, equipment: Vec<ReservationDto>) -> Self {
        let (rooms, mut anomalies) = bookings_from_wire(rooms, ResourceKind::Room);
        let (equipment, more) = bookings_from_wire(equipment, ResourceKind::Equipment);
        anomalies.extend(more);
        Self {
            rooms,
            equipment,
            anomalies,
        }
    }
}

async fn fetch_catalog(source: Arc<dyn PlanningSource>) -> Result<Arc<ResourceCatalog>, ApiError> {
    let (slots, rooms, equipment) = tokio::try_join!(
        source.list_time_slots(),
        source.list_resources(ResourceKind::Room),
        source.list_resources(ResourceKind::Equipment),
    )?;
    let catalog = ResourceCatalog::new(
        slots.into_iter().map(slot_from_wire).collect(),
        rooms
            .into_iter()
            .map(|r| resource_from_wire(r, ResourceKind::Room))
            .collect(),
        equipment
            .into_iter()
            .map(|r| resource_from_wire(r, ResourceKind::Equipment))
            .collect(),
    );
    tracing::info!(
        "catalog loaded: {} slots, {} rooms, {} equipment",
        catalog.slot_count(),
        catalog.room_count(),
        catalog.equipment.len()
    );
    Ok(Arc::new(catalog))
}

async fn fetch_day(
    source: Arc<dyn PlanningSource>,
    date: NaiveDate,
) -> Result<Arc<DayPlanningPayload>, ApiError> {
    Ok(Arc::new(source.get_day_planning(date).await?))
}

async fn fetch_range(
    source: Arc<dyn PlanningSource>,
    window: DateWindow,
) -> Result<Arc<RangeBookings>, ApiError> {
    let (rooms, equipment) = tokio::try_join!(
        source.list_bookings(ResourceKind::Room, window.start, window.end),
        source.list_bookings(ResourceKind::Equipment, window.start, window.end),
    )?;
    Ok(Arc::new(RangeBookings::from_wire(rooms, equipment)))
}

async fn fetch_mine(
    source: Arc<dyn PlanningSource>,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Arc<RangeBookings>, ApiError> {
    let payload = source.list_my_bookings(from, to).await?;
    Ok(Arc::new(RangeBookings::from_wire(
        payload.reservations_salles,
        payload.reservations_materiels,
    )))
}

async fn fetch_totals(source: Arc<dyn PlanningSource>) -> Result<BookingTotals, ApiError> {
    source.get_statistics().await
}

fn record_anomalies(anomalies: &[Anomaly]) {
    for a in anomalies {
        metrics::counter!(GRID_ANOMALIES_TOTAL, "kind" => a.label()).increment(1);
        tracing::warn!(kind = a.label(), "{a}");
    }
}

/// Entry point for views. Fetches through per-family caches and hands back
/// freshly built grids and summaries.
pub struct Planner {
    source: Arc<dyn PlanningSource>,
    ttls: CacheTtls,
    catalog: QueryCache<Arc<ResourceCatalog>>,
    days: QueryCache<Arc<DayPlanningPayload>>,
    ranges: QueryCache<Arc<RangeBookings>>,
    mine: QueryCache<Arc<RangeBookings>>,
    totals: QueryCache<BookingTotals>,
}

impl Planner {
    pub fn new(source: Arc<dyn PlanningSource>, ttls: CacheTtls) -> Self {
        Self {
            source,
            ttls,
            catalog: QueryCache::new("catalog"),
            days: QueryCache::new("planning"),
            ranges: QueryCache::new("bookings"),
            mine: QueryCache::new("dashboard"),
            totals: QueryCache::new("statistics"),
        }
    }

    /// Slots, rooms and equipment, fetched together.
    pub async fn catalog(&self) -> Result<Arc<ResourceCatalog>, ApiError> {
        let source = self.source.clone();
        self.catalog
            .get_or_fetch(CATALOG_KEY, self.ttls.catalog, move || fetch_catalog(source))
            .await
    }

    /// Bookings of one date, shared by day and week views. The raw payload
    /// is cached; the slot-name join runs against the catalog passed in.
    async fn day_bookings(
        &self,
        date: NaiveDate,
        catalog: &ResourceCatalog,
    ) -> Result<Arc<DayBookings>, ApiError> {
        let source = self.source.clone();
        let payload = self
            .days
            .get_or_fetch(
                &format!("{PLANNING_PREFIX}{date}"),
                self.ttls.planning,
                move || fetch_day(source, date),
            )
            .await?;
        Ok(Arc::new(normalize_day_planning(
            date,
            (*payload).clone(),
            &catalog.slots,
        )))
    }

    async fn range_bookings(&self, window: DateWindow) -> Result<Arc<RangeBookings>, ApiError> {
        let source = self.source.clone();
        self.ranges
            .get_or_fetch(
                &format!("{BOOKINGS_PREFIX}{}", window.signature()),
                self.ttls.stats,
                move || fetch_range(source, window),
            )
            .await
    }

    pub async fn day(&self, date: NaiveDate) -> Result<GridReport, PlannerError> {
        let catalog = self.catalog().await?;
        let day = self.day_bookings(date, &catalog).await?;
        let report = build_grid(date, &catalog, &day);
        record_anomalies(&report.anomalies);
        Ok(report)
    }

    /// Monday..Friday around `reference`. Only a catalog failure fails the
    /// view; failed days come back empty with a warning.
    pub async fn week(&self, reference: NaiveDate) -> Result<WeekReport, PlannerError> {
        let catalog = self.catalog().await?;
        let report =
            build_week(reference, &catalog, |date| self.day_bookings(date, &catalog)).await;
        record_anomalies(&report.anomalies);
        if let Some(warning) = &report.warning {
            tracing::warn!("week of {reference}: {warning}");
        }
        Ok(report)
    }

    pub async fn stats(&self, window: DateWindow) -> Result<StatsSnapshot, PlannerError> {
        if window.days() > MAX_STATS_WINDOW_DAYS {
            return Err(PlannerError::LimitExceeded(
                "statistics window wider than 366 days",
            ));
        }
        let (catalog, bookings) =
            tokio::try_join!(self.catalog(), self.range_bookings(window))?;
        record_anomalies(&bookings.anomalies);

        let started = Instant::now();
        let snapshot = compute_stats(
            &bookings.rooms,
            &bookings.equipment,
            catalog.room_count(),
            catalog.slot_count(),
            window,
        );
        metrics::histogram!(STATS_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        Ok(snapshot)
    }

    pub async fn stats_for(
        &self,
        range: StatsRange,
        today: NaiveDate,
    ) -> Result<StatsSnapshot, PlannerError> {
        self.stats(range.window(today)).await
    }

    /// Counts and next bookings of the signed-in user, from `today` through
    /// the dashboard horizon.
    pub async fn dashboard(&self, today: NaiveDate) -> Result<DashboardSummary, PlannerError> {
        let until = today
            .checked_add_days(Days::new(DASHBOARD_HORIZON_DAYS as u64))
            .unwrap_or(today);
        let source = self.source.clone();
        let mine = self
            .mine
            .get_or_fetch(
                &format!("{DASHBOARD_PREFIX}{today}"),
                self.ttls.planning,
                move || fetch_mine(source, today, until),
            )
            .await?;
        record_anomalies(&mine.anomalies);
        Ok(summarize_dashboard(&mine.rooms, &mine.equipment, today))
    }

    /// Backend-wide room and equipment booking counts.
    pub async fn totals(&self) -> Result<BookingTotals, PlannerError> {
        let source = self.source.clone();
        Ok(self
            .totals
            .get_or_fetch(STATISTICS_KEY, self.ttls.stats, move || fetch_totals(source))
            .await?)
    }

    /// Ask the backend whether a (resource, date, slot) is free. Never cached.
    pub async fn check_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<Availability, PlannerError> {
        Ok(self.source.check_availability(request).await?)
    }

    /// Forget everything a booking created or cancelled on `date` may have
    /// changed: that day's planning, every range listing, the dashboard and
    /// the backend totals.
    pub fn booking_changed(&self, date: NaiveDate) {
        let removed = self.days.invalidate(&format!("{PLANNING_PREFIX}{date}"))
            + self.ranges.invalidate(BOOKINGS_PREFIX)
            + self.mine.invalidate(DASHBOARD_PREFIX)
            + self.totals.invalidate(STATISTICS_KEY);
        tracing::debug!("booking changed on {date}: {removed} cached queries dropped");
    }

    /// Drop the catalog so the next view reloads slots and resources. Cached
    /// day payloads stay: they are joined against whichever catalog is current.
    pub fn catalog_changed(&self) {
        self.catalog.invalidate(CATALOG_KEY);
    }
}
