use std::collections::HashMap;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::limits::{TIMELINE_DAYS, TOP_RESOURCES, WEEKDAYS_PER_WEEK};
use crate::model::{Booking, DateWindow};

const UNKNOWN_RESOURCE: &str = "Inconnu";

const WEEKDAY_LABELS: [&str; WEEKDAYS_PER_WEEK] = ["Lundi", "Mardi", "Mercredi", "Jeudi", "Vendredi"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekdayCount {
    pub day: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineDay {
    pub date: NaiveDate,
    pub rooms: usize,
    pub equipment: usize,
    pub total: usize,
}

/// Analytics over the bookings of one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub window: DateWindow,
    pub total: usize,
    pub room_bookings: usize,
    pub equipment_bookings: usize,
    /// Percent of room × weekday × slot capacity, two decimals.
    pub occupancy_rate: f64,
    /// Monday..Friday; weekend bookings are only in the totals.
    pub weekday_distribution: Vec<WeekdayCount>,
    pub top_rooms: Vec<ResourceCount>,
    pub top_equipment: Vec<ResourceCount>,
    /// The seven days ending on `window.end`, oldest first.
    pub timeline: Vec<TimelineDay>,
    pub avg_per_day: f64,
}

/// Preset windows offered by the statistics view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsRange {
    Last7Days,
    #[default]
    Last30Days,
    ThisMonth,
    Last90Days,
}

impl StatsRange {
    pub fn window(self, today: NaiveDate) -> DateWindow {
        let start = match self {
            StatsRange::Last7Days => today.checked_sub_days(Days::new(7)),
            StatsRange::Last30Days => today.checked_sub_days(Days::new(30)),
            StatsRange::Last90Days => today.checked_sub_days(Days::new(90)),
            StatsRange::ThisMonth => today.with_day(1),
        };
        DateWindow {
            start: start.unwrap_or(today),
            end: today,
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn weekday_index(date: NaiveDate) -> Option<usize> {
    match date.weekday() {
        Weekday::Sat | Weekday::Sun => None,
        d => Some(d.num_days_from_monday() as usize),
    }
}

/// Count bookings per resource name, descending. Equal counts keep the
/// order in which the names were first met.
fn top_resources(bookings: &[Booking]) -> Vec<ResourceCount> {
    let mut order: Vec<ResourceCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for b in bookings {
        let name = b.resource_name.as_deref().unwrap_or(UNKNOWN_RESOURCE);
        match index.get(name) {
            Some(&i) => order[i].count += 1,
            None => {
                index.insert(name, order.len());
                order.push(ResourceCount {
                    name: name.to_string(),
                    count: 1,
                });
            }
        }
    }
    // sort_by is stable
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(TOP_RESOURCES);
    order
}

/// Derive a statistics snapshot. Never fails: empty inputs give zero counts
/// and a zero occupancy rate.
///
/// Occupancy divides room bookings by `room_count × 5 × slot_count`,
/// whatever the window length.
pub fn compute_stats(
    rooms: &[Booking],
    equipment: &[Booking],
    room_count: usize,
    slot_count: usize,
    window: DateWindow,
) -> StatsSnapshot {
    let total = rooms.len() + equipment.len();

    let mut per_weekday = [0usize; WEEKDAYS_PER_WEEK];
    let timeline_start = window
        .end
        .checked_sub_days(Days::new(TIMELINE_DAYS as u64 - 1))
        .unwrap_or(window.end);
    let mut timeline: Vec<TimelineDay> = (0..TIMELINE_DAYS as u64)
        .map(|i| TimelineDay {
            date: timeline_start
                .checked_add_days(Days::new(i))
                .unwrap_or(window.end),
            rooms: 0,
            equipment: 0,
            total: 0,
        })
        .collect();

    for (b, is_room) in rooms
        .iter()
        .map(|b| (b, true))
        .chain(equipment.iter().map(|b| (b, false)))
    {
        if let Some(i) = weekday_index(b.date) {
            per_weekday[i] += 1;
        }
        let offset = (b.date - timeline_start).num_days();
        if let Ok(i) = usize::try_from(offset)
            && let Some(day) = timeline.get_mut(i)
        {
            if is_room {
                day.rooms += 1;
            } else {
                day.equipment += 1;
            }
            day.total += 1;
        }
    }

    let capacity = room_count * WEEKDAYS_PER_WEEK * slot_count;
    let occupancy_rate = if capacity == 0 {
        0.0
    } else {
        round2(rooms.len() as f64 / capacity as f64 * 100.0)
    };

    let days = window.days();
    let avg_per_day = if days > 0 {
        round2(total as f64 / days as f64)
    } else {
        0.0
    };

    StatsSnapshot {
        window,
        total,
        room_bookings: rooms.len(),
        equipment_bookings: equipment.len(),
        occupancy_rate,
        weekday_distribution: WEEKDAY_LABELS
            .iter()
            .zip(per_weekday)
            .map(|(&day, count)| WeekdayCount { day, count })
            .collect(),
        top_rooms: top_resources(rooms),
        top_equipment: top_resources(equipment),
        timeline,
        avg_per_day,
    }
}
