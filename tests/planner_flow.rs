use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use slotgrid::api::memory::MemorySource;
use slotgrid::api::{ApiError, AvailabilityRequest};
use slotgrid::config::CacheTtls;
use slotgrid::model::*;
use slotgrid::planner::{Planner, PlannerError};

// ── Test infrastructure ──────────────────────────────────────

const ROOM_A: ResourceId = ResourceId(1);
const ROOM_B: ResourceId = ResourceId(2);
const ROOM_C: ResourceId = ResourceId(3);
const PROJECTOR: ResourceId = ResourceId(50);
const TEACHER: UserId = UserId(7);

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn catalog() -> ResourceCatalog {
    let slot = |id: i64, name: &str, start: &str, end: &str| TimeSlot {
        id: SlotId(id),
        name: name.into(),
        start: start.into(),
        end: end.into(),
    };
    let room = |id: ResourceId, name: &str| Resource {
        id,
        name: name.into(),
        kind: ResourceKind::Room,
        capacity: Some(24),
        active: true,
        details: None,
    };
    ResourceCatalog::new(
        vec![
            slot(1, "M1", "08:00", "10:00"),
            slot(2, "M2", "10:15", "12:15"),
            slot(3, "S1", "13:30", "15:30"),
            slot(4, "S2", "15:45", "17:45"),
        ],
        vec![room(ROOM_A, "A101"), room(ROOM_B, "B204"), room(ROOM_C, "C012")],
        vec![Resource {
            id: PROJECTOR,
            name: "Vidéoprojecteur".into(),
            kind: ResourceKind::Equipment,
            capacity: None,
            active: true,
            details: Some("Projection".into()),
        }],
    )
}

fn booking(id: i64, kind: ResourceKind, resource: ResourceId, slot: i64, date: &str) -> Booking {
    Booking {
        id: BookingId(id),
        kind,
        resource_id: resource,
        resource_name: None,
        date: d(date),
        slot_id: SlotId(slot),
        owner_id: Some(TEACHER),
        owner_name: None,
        subject: None,
        comment: None,
        created_at: None,
    }
}

fn room(id: i64, resource: ResourceId, slot: i64, date: &str) -> Booking {
    booking(id, ResourceKind::Room, resource, slot, date)
}

async fn source_with(bookings: Vec<Booking>) -> Arc<MemorySource> {
    let source = MemorySource::new(catalog())
        .with_owner(TEACHER)
        .with_latency(Duration::from_millis(20));
    for b in bookings {
        source.insert_booking(b).await;
    }
    Arc::new(source)
}

fn planner(source: &Arc<MemorySource>) -> Planner {
    Planner::new(source.clone(), CacheTtls::default())
}

// ── Day and week views ───────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn day_view_places_bookings() {
    let source = source_with(vec![
        room(1, ROOM_A, 1, "2024-03-04"),
        room(2, ROOM_B, 2, "2024-03-04"),
        room(3, ROOM_C, 1, "2024-03-05"),
    ])
    .await;
    let planner = planner(&source);

    let report = planner.day(d("2024-03-04")).await.unwrap();
    assert!(report.anomalies.is_empty());
    assert_eq!(report.grid.rows().len(), 4);
    assert_eq!(report.grid.booked_cells(), 2);
    assert_eq!(
        report.grid.cell(SlotId(1), ROOM_A).booking.map(|b| b.id),
        Some(BookingId(1))
    );
    assert!(report.grid.cell(SlotId(1), ROOM_C).booking.is_none());
}

#[tokio::test(start_paused = true)]
async fn concurrent_views_fetch_once() {
    let source = source_with(vec![room(1, ROOM_A, 1, "2024-03-06")]).await;
    let planner = planner(&source);

    let (a, b, c) = tokio::join!(
        planner.day(d("2024-03-06")),
        planner.day(d("2024-03-06")),
        planner.day(d("2024-03-06")),
    );
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(c.unwrap().grid.booked_cells(), 1);

    assert_eq!(source.calls("list_time_slots"), 1);
    assert_eq!(source.calls("list_resources"), 2);
    assert_eq!(source.calls("get_day_planning"), 1);
}

#[tokio::test(start_paused = true)]
async fn day_and_week_share_day_fetches() {
    let source = source_with(vec![
        room(1, ROOM_A, 1, "2024-03-04"),
        room(2, ROOM_A, 1, "2024-03-06"),
        room(3, ROOM_B, 4, "2024-03-08"),
    ])
    .await;
    let planner = planner(&source);

    planner.day(d("2024-03-06")).await.unwrap();
    let report = planner.week(d("2024-03-06")).await.unwrap();

    assert!(report.warning.is_none());
    assert_eq!(report.week.booked_cells(), 3);
    assert_eq!(source.calls("get_day_planning"), 5);

    // a second week view is served from cache
    planner.week(d("2024-03-07")).await.unwrap();
    assert_eq!(source.calls("get_day_planning"), 5);
    assert_eq!(source.calls("list_time_slots"), 1);
}

#[tokio::test(start_paused = true)]
async fn week_days_load_concurrently() {
    let source = source_with(vec![room(1, ROOM_A, 1, "2024-03-04")]).await;
    let planner = planner(&source);
    planner.catalog().await.unwrap();

    let started = tokio::time::Instant::now();
    let report = planner.week(d("2024-03-06")).await.unwrap();
    let elapsed = started.elapsed();

    // one 20ms round trip, not five in a row
    assert!(elapsed >= Duration::from_millis(20), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(40), "{elapsed:?}");
    assert_eq!(source.calls("get_day_planning"), 5);
    assert_eq!(report.week.booked_cells(), 1);
}

#[tokio::test(start_paused = true)]
async fn week_survives_a_failing_day() {
    let source = source_with(vec![
        room(1, ROOM_A, 1, "2024-03-04"),
        room(2, ROOM_A, 2, "2024-03-07"),
        room(3, ROOM_B, 3, "2024-03-08"),
    ])
    .await;
    source.fail_date(d("2024-03-07"), ApiError::Server(502));
    let planner = planner(&source);

    let report = planner.week(d("2024-03-09")).await.unwrap();

    let days: Vec<NaiveDate> = report.week.days().copied().collect();
    assert_eq!(
        days,
        vec![
            d("2024-03-04"),
            d("2024-03-05"),
            d("2024-03-06"),
            d("2024-03-07"),
            d("2024-03-08"),
        ]
    );
    assert_eq!(report.week.get(d("2024-03-04")).unwrap().booked_cells(), 1);
    assert_eq!(report.week.get(d("2024-03-07")).unwrap().booked_cells(), 0);
    assert_eq!(report.week.get(d("2024-03-07")).unwrap().rows().len(), 4);
    assert_eq!(report.week.get(d("2024-03-08")).unwrap().booked_cells(), 1);

    let warning = report.warning.unwrap();
    assert_eq!(warning.failures, vec![(d("2024-03-07"), ApiError::Server(502))]);

    // the failure was not cached
    source.heal_date(d("2024-03-07"));
    let report = planner.week(d("2024-03-09")).await.unwrap();
    assert!(report.warning.is_none());
    assert_eq!(report.week.booked_cells(), 3);
    assert_eq!(source.calls("get_day_planning"), 6);
}

#[tokio::test(start_paused = true)]
async fn failed_day_view_is_an_error() {
    let source = source_with(vec![]).await;
    source.fail_date(d("2024-03-05"), ApiError::Connection("refused".into()));
    let planner = planner(&source);

    let err = planner.day(d("2024-03-05")).await.unwrap_err();
    assert_eq!(err, PlannerError::Api(ApiError::Connection("refused".into())));
    assert!(planner.day(d("2024-03-04")).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn day_view_reports_duplicates() {
    let source = source_with(vec![
        room(1, ROOM_A, 2, "2024-03-04"),
        room(2, ROOM_A, 2, "2024-03-04"),
    ])
    .await;
    let planner = planner(&source);

    let report = planner.day(d("2024-03-04")).await.unwrap();
    assert_eq!(report.grid.booked_cells(), 1);
    assert_eq!(
        report.anomalies,
        vec![Anomaly::DuplicateBooking {
            kept: BookingId(1),
            dropped: BookingId(2),
            slot: SlotId(2),
            resource: ROOM_A,
        }]
    );
}

// ── Invalidation ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn booking_changed_forces_refetch() {
    let source = source_with(vec![room(1, ROOM_A, 1, "2024-03-05")]).await;
    let planner = planner(&source);

    assert_eq!(planner.day(d("2024-03-05")).await.unwrap().grid.booked_cells(), 1);

    source.insert_booking(room(2, ROOM_B, 1, "2024-03-05")).await;
    // still cached
    assert_eq!(planner.day(d("2024-03-05")).await.unwrap().grid.booked_cells(), 1);

    planner.booking_changed(d("2024-03-05"));
    assert_eq!(planner.day(d("2024-03-05")).await.unwrap().grid.booked_cells(), 2);
    assert_eq!(source.calls("get_day_planning"), 2);
    // the catalog survives
    assert_eq!(source.calls("list_time_slots"), 1);
}

#[tokio::test(start_paused = true)]
async fn catalog_changed_rejoins_cached_days() {
    let source = source_with(vec![room(1, ROOM_A, 1, "2024-03-05")]).await;
    let planner = planner(&source);
    planner.day(d("2024-03-05")).await.unwrap();

    // an evening slot appears, and a booking lands in it
    let mut with_evening = catalog();
    with_evening.slots.push(TimeSlot {
        id: SlotId(5),
        name: "Soir".into(),
        start: "18:00".into(),
        end: "20:00".into(),
    });
    source.replace_catalog(with_evening).await;
    source.insert_booking(room(2, ROOM_B, 5, "2024-03-05")).await;
    planner.booking_changed(d("2024-03-05"));

    // the cached catalog does not know "Soir" yet
    let stale = planner.day(d("2024-03-05")).await.unwrap();
    assert_eq!(stale.grid.booked_cells(), 1);
    assert_eq!(
        stale.anomalies,
        vec![Anomaly::UnknownSlotName {
            name: "Soir".into(),
            dropped: vec![BookingId(2)],
        }]
    );

    planner.catalog_changed();
    let fresh = planner.day(d("2024-03-05")).await.unwrap();
    assert!(fresh.anomalies.is_empty());
    assert_eq!(fresh.grid.rows().len(), 5);
    assert_eq!(fresh.grid.booked_cells(), 2);
    assert_eq!(
        fresh.grid.cell(SlotId(5), ROOM_B).booking.map(|b| b.id),
        Some(BookingId(2))
    );
    // the day payload itself was reused
    assert_eq!(source.calls("get_day_planning"), 2);
    assert_eq!(source.calls("list_time_slots"), 2);
}

#[tokio::test(start_paused = true)]
async fn booking_changed_leaves_other_days_cached() {
    let source = source_with(vec![]).await;
    let planner = planner(&source);

    planner.day(d("2024-03-05")).await.unwrap();
    planner.day(d("2024-03-06")).await.unwrap();
    planner.booking_changed(d("2024-03-05"));
    planner.day(d("2024-03-06")).await.unwrap();

    assert_eq!(source.calls("get_day_planning"), 2);
}

#[tokio::test(start_paused = true)]
async fn planning_expires_after_ttl() {
    let source = source_with(vec![]).await;
    let planner = planner(&source);

    planner.day(d("2024-03-05")).await.unwrap();
    tokio::time::advance(CacheTtls::default().planning + Duration::from_secs(1)).await;
    planner.day(d("2024-03-05")).await.unwrap();

    assert_eq!(source.calls("get_day_planning"), 2);
    assert_eq!(source.calls("list_time_slots"), 1);
}

// ── Statistics ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stats_over_a_week() {
    let dates = ["2024-03-04", "2024-03-05", "2024-03-06", "2024-03-07"];
    let rooms = [ROOM_A, ROOM_B, ROOM_C];
    let bookings: Vec<Booking> = (0..12)
        .map(|i| room(i + 1, rooms[i as usize % 3], 1, dates[i as usize / 3]))
        .collect();
    let source = source_with(bookings).await;
    let planner = planner(&source);
    let window = DateWindow::new(d("2024-03-04"), d("2024-03-10")).unwrap();

    let snap = planner.stats(window).await.unwrap();
    assert_eq!(snap.room_bookings, 12);
    assert_eq!(snap.equipment_bookings, 0);
    assert_eq!(snap.occupancy_rate, 20.0);
    assert_eq!(snap.timeline.len(), 7);
    assert_eq!(snap.timeline[0].rooms, 3);

    planner.stats(window).await.unwrap();
    // one room listing and one equipment listing
    assert_eq!(source.calls("list_bookings"), 2);

    planner.booking_changed(d("2024-03-04"));
    planner.stats(window).await.unwrap();
    assert_eq!(source.calls("list_bookings"), 4);
}

#[tokio::test]
async fn stats_window_limit() {
    let source = source_with(vec![]).await;
    let planner = planner(&source);
    let window = DateWindow::new(d("2023-01-01"), d("2024-03-01")).unwrap();

    let err = planner.stats(window).await.unwrap_err();
    assert!(matches!(err, PlannerError::LimitExceeded(_)));
    assert_eq!(source.calls("list_bookings"), 0);
}

#[tokio::test(start_paused = true)]
async fn stats_failure_surfaces() {
    let source = source_with(vec![]).await;
    source.fail_date(d("2024-03-05"), ApiError::Server(500));
    let planner = planner(&source);
    let window = DateWindow::new(d("2024-03-04"), d("2024-03-10")).unwrap();

    let err = planner.stats(window).await.unwrap_err();
    assert_eq!(err, PlannerError::Api(ApiError::Server(500)));
}

// ── Dashboard and availability ───────────────────────────────

#[tokio::test(start_paused = true)]
async fn dashboard_summarizes_own_bookings() {
    let mut other = room(9, ROOM_C, 1, "2024-03-04");
    other.owner_id = Some(UserId(99));
    let mut talk = room(2, ROOM_B, 3, "2024-03-05");
    talk.subject = Some("Conseil de classe".into());
    let source = source_with(vec![
        room(1, ROOM_A, 1, "2024-03-04"),
        talk,
        booking(3, ResourceKind::Equipment, PROJECTOR, 1, "2024-03-04"),
        room(4, ROOM_A, 2, "2024-03-20"),
        other,
    ])
    .await;
    let planner = planner(&source);

    let summary = planner.dashboard(d("2024-03-04")).await.unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.due_today, 2);
    assert_eq!(summary.due_tomorrow, 1);
    assert_eq!(summary.due_this_week, 3);
    let ids: Vec<BookingId> = summary.upcoming.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![BookingId(1), BookingId(3), BookingId(2)]);
    assert_eq!(summary.upcoming[2].title, "Conseil de classe");

    planner.dashboard(d("2024-03-04")).await.unwrap();
    assert_eq!(source.calls("list_my_bookings"), 1);
}

#[tokio::test]
async fn dashboard_without_session() {
    let source = Arc::new(MemorySource::new(catalog()));
    let planner = Planner::new(source.clone(), CacheTtls::default());

    let err = planner.dashboard(d("2024-03-04")).await.unwrap_err();
    assert_eq!(err, PlannerError::Api(ApiError::Unauthorized));
}

#[tokio::test(start_paused = true)]
async fn totals_cached_until_booking_changes() {
    let source = source_with(vec![
        room(1, ROOM_A, 1, "2024-03-04"),
        room(2, ROOM_B, 1, "2024-03-04"),
        booking(3, ResourceKind::Equipment, PROJECTOR, 2, "2024-03-05"),
    ])
    .await;
    let planner = planner(&source);

    let totals = planner.totals().await.unwrap();
    assert_eq!((totals.rooms, totals.equipment), (2, 1));
    assert_eq!(totals.total(), 3);

    source.insert_booking(room(4, ROOM_C, 3, "2024-03-06")).await;
    assert_eq!(planner.totals().await.unwrap().rooms, 2);
    assert_eq!(source.calls("get_statistics"), 1);

    planner.booking_changed(d("2024-03-06"));
    assert_eq!(planner.totals().await.unwrap().rooms, 3);
    assert_eq!(source.calls("get_statistics"), 2);
}

#[tokio::test(start_paused = true)]
async fn availability_is_never_cached() {
    let source = source_with(vec![room(1, ROOM_A, 1, "2024-03-04")]).await;
    let planner = planner(&source);
    let request = AvailabilityRequest {
        kind: ResourceKind::Room,
        resource: ROOM_A,
        date: d("2024-03-04"),
        slot: SlotId(1),
    };

    let taken = planner.check_availability(&request).await.unwrap();
    assert!(!taken.available);
    assert!(taken.conflict_reason.is_some());

    source.remove_booking(BookingId(1)).await;
    let free = planner.check_availability(&request).await.unwrap();
    assert!(free.available);
    assert_eq!(source.calls("check_availability"), 2);

    let unknown = AvailabilityRequest {
        resource: ResourceId(404),
        ..request
    };
    assert_eq!(
        planner.check_availability(&unknown).await.unwrap_err(),
        PlannerError::Api(ApiError::NotFound)
    );
}
