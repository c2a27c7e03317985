use std::fmt;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ── Identifiers ──────────────────────────────────────────────────

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(SlotId);
id_type!(ResourceId);
id_type!(BookingId);
id_type!(UserId);

// ── Catalog ──────────────────────────────────────────────────────

/// A named time interval shared by every resource on a given day.
///
/// `start` and `end` are zero-padded `HH:MM` strings, so lexicographic
/// order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: SlotId,
    pub name: String,
    pub start: String,
    pub end: String,
}

impl TimeSlot {
    pub fn contains(&self, hhmm: &str) -> bool {
        self.start.as_str() <= hhmm && hhmm < self.end.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Room,
    Equipment,
}

impl ResourceKind {
    /// Name the backend uses for this kind (`type_ressource`).
    pub fn wire_name(self) -> &'static str {
        match self {
            ResourceKind::Room => "salle",
            ResourceKind::Equipment => "materiel",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Room => f.write_str("room"),
            ResourceKind::Equipment => f.write_str("equipment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub kind: ResourceKind,
    /// Seats; rooms only.
    pub capacity: Option<u32>,
    /// Only active resources are offered for new bookings. Inactive ones
    /// still show up in grids and statistics.
    pub active: bool,
    /// Room equipment list or equipment type, for display.
    pub details: Option<String>,
}

/// Everything a grid needs besides bookings. Fetched once per session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceCatalog {
    pub slots: Vec<TimeSlot>,
    pub rooms: Vec<Resource>,
    pub equipment: Vec<Resource>,
}

impl ResourceCatalog {
    pub fn new(slots: Vec<TimeSlot>, rooms: Vec<Resource>, equipment: Vec<Resource>) -> Self {
        Self {
            slots,
            rooms,
            equipment,
        }
    }

    pub fn slot(&self, id: SlotId) -> Option<&TimeSlot> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn slot_by_name(&self, name: &str) -> Option<&TimeSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    pub fn resources(&self, kind: ResourceKind) -> &[Resource] {
        match kind {
            ResourceKind::Room => &self.rooms,
            ResourceKind::Equipment => &self.equipment,
        }
    }

    pub fn resource(&self, kind: ResourceKind, id: ResourceId) -> Option<&Resource> {
        self.resources(kind).iter().find(|r| r.id == id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

// ── Bookings ─────────────────────────────────────────────────────

/// A confirmed reservation of one resource, in one slot, on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub kind: ResourceKind,
    pub resource_id: ResourceId,
    /// Denormalized by the backend; statistics group on it.
    pub resource_name: Option<String>,
    pub date: NaiveDate,
    pub slot_id: SlotId,
    pub owner_id: Option<UserId>,
    pub owner_name: Option<String>,
    pub subject: Option<String>,
    pub comment: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// One day's raw bookings, already normalized to slot ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBookings {
    pub date: NaiveDate,
    pub rooms: Vec<Booking>,
    pub equipment: Vec<Booking>,
    /// Problems found while normalizing the backend payload.
    pub anomalies: Vec<Anomaly>,
}

impl DayBookings {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            rooms: Vec::new(),
            equipment: Vec::new(),
            anomalies: Vec::new(),
        }
    }
}

// ── Date windows ─────────────────────────────────────────────────

/// Inclusive calendar-day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Returns `None` when `end` is before `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Window of `days` days ending on (and including) `end`.
    pub fn ending_on(end: NaiveDate, days: u64) -> Self {
        let start = end
            .checked_sub_days(Days::new(days.saturating_sub(1)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }

    /// Stable cache-key fragment.
    pub fn signature(&self) -> String {
        format!("{}..{}", self.start, self.end)
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

// ── Anomalies ────────────────────────────────────────────────────

/// A data inconsistency found while merging raw collections.
/// The offending record is skipped; the anomaly is reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "anomaly", rename_all = "snake_case")]
pub enum Anomaly {
    /// Booking points at a slot id missing from the catalog.
    UnknownSlot { booking: BookingId, slot: SlotId },
    /// Day payload keyed by a slot name missing from the catalog.
    UnknownSlotName { name: String, dropped: Vec<BookingId> },
    /// Several catalog slots share a display name the day payload uses.
    /// Its bookings all went to `kept`.
    AmbiguousSlotName {
        name: String,
        kept: SlotId,
        ignored: Vec<SlotId>,
    },
    /// Booking points at a resource missing from the catalog.
    UnknownResource {
        booking: BookingId,
        kind: ResourceKind,
        resource: ResourceId,
    },
    /// Two bookings for the same (date, slot, resource); `kept` came first.
    DuplicateBooking {
        kept: BookingId,
        dropped: BookingId,
        slot: SlotId,
        resource: ResourceId,
    },
    /// Backend record missing a field needed to place it.
    MalformedRecord { booking: BookingId, reason: &'static str },
}

impl Anomaly {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Anomaly::UnknownSlot { .. } => "unknown_slot",
            Anomaly::UnknownSlotName { .. } => "unknown_slot_name",
            Anomaly::AmbiguousSlotName { .. } => "ambiguous_slot_name",
            Anomaly::UnknownResource { .. } => "unknown_resource",
            Anomaly::DuplicateBooking { .. } => "duplicate_booking",
            Anomaly::MalformedRecord { .. } => "malformed_record",
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::UnknownSlot { booking, slot } => {
                write!(f, "booking {booking} references unknown slot {slot}")
            }
            Anomaly::UnknownSlotName { name, dropped } => {
                write!(f, "planning keyed by unknown slot {name:?}; dropped bookings {dropped:?}")
            }
            Anomaly::AmbiguousSlotName {
                name,
                kept,
                ignored,
            } => write!(
                f,
                "slot name {name:?} shared by slots {kept} and {ignored:?}; bookings placed in {kept}"
            ),
            Anomaly::UnknownResource {
                booking,
                kind,
                resource,
            } => write!(f, "booking {booking} references unknown {kind} {resource}"),
            Anomaly::DuplicateBooking {
                kept,
                dropped,
                slot,
                resource,
            } => write!(
                f,
                "duplicate booking {dropped} for slot {slot} / resource {resource}; kept {kept}"
            ),
            Anomaly::MalformedRecord { booking, reason } => {
                write!(f, "malformed booking {booking}: {reason}")
            }
        }
    }
}
