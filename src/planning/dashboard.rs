use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::limits::{DASHBOARD_HORIZON_DAYS, DASHBOARD_UPCOMING};
use crate::model::{Booking, BookingId, ResourceKind, SlotId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingBooking {
    pub id: BookingId,
    pub kind: ResourceKind,
    pub date: NaiveDate,
    pub slot_id: SlotId,
    pub resource: Option<String>,
    pub title: String,
}

/// Quick counts and next bookings for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub today: NaiveDate,
    pub total: usize,
    pub due_today: usize,
    pub due_tomorrow: usize,
    /// Bookings from today through today + 7.
    pub due_this_week: usize,
    pub upcoming: Vec<UpcomingBooking>,
}

fn title(b: &Booking) -> String {
    if let Some(subject) = b.subject.as_deref().filter(|s| !s.trim().is_empty()) {
        return subject.to_string();
    }
    match b.kind {
        ResourceKind::Room => "Réservation de salle".to_string(),
        ResourceKind::Equipment => format!(
            "Réservation de {}",
            b.resource_name.as_deref().unwrap_or("matériel")
        ),
    }
}

pub fn summarize_dashboard(
    rooms: &[Booking],
    equipment: &[Booking],
    today: NaiveDate,
) -> DashboardSummary {
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let horizon = today
        .checked_add_days(Days::new(DASHBOARD_HORIZON_DAYS as u64))
        .unwrap_or(today);

    let all = || rooms.iter().chain(equipment);

    let mut upcoming: Vec<&Booking> = all().filter(|b| b.date >= today).collect();
    // stable: same-day bookings keep rooms-then-equipment fetch order
    upcoming.sort_by_key(|b| b.date);

    DashboardSummary {
        today,
        total: rooms.len() + equipment.len(),
        due_today: all().filter(|b| b.date == today).count(),
        due_tomorrow: all().filter(|b| b.date == tomorrow).count(),
        due_this_week: all().filter(|b| today <= b.date && b.date <= horizon).count(),
        upcoming: upcoming
            .into_iter()
            .take(DASHBOARD_UPCOMING)
            .map(|b| UpcomingBooking {
                id: b.id,
                kind: b.kind,
                date: b.date,
                slot_id: b.slot_id,
                resource: b.resource_name.clone(),
                title: title(b),
            })
            .collect(),
    }
}
