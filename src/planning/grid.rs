use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::*;

/// Occupancy of one (slot, room) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "booking", rename_all = "lowercase")]
pub enum Cell {
    Available,
    Booked(Booking),
}

impl Cell {
    pub fn booking(&self) -> Option<&Booking> {
        match self {
            Cell::Available => None,
            Cell::Booked(b) => Some(b),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Cell::Available)
    }
}

/// One slot of a day: a cell for every catalog room plus the slot's
/// equipment bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridRow {
    pub slot: TimeSlot,
    pub rooms: BTreeMap<ResourceId, Cell>,
    pub equipment: Vec<Booking>,
}

impl GridRow {
    fn empty(slot: &TimeSlot, rooms: &[Resource]) -> Self {
        Self {
            slot: slot.clone(),
            rooms: rooms.iter().map(|r| (r.id, Cell::Available)).collect(),
            equipment: Vec::new(),
        }
    }

    pub fn booked_rooms(&self) -> usize {
        self.rooms.values().filter(|c| !c.is_available()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.booked_rooms() == 0 && self.equipment.is_empty()
    }
}

/// What a room cell renders: its booking, and the slot's equipment
/// bookings attached to it when the room is booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellView<'a> {
    pub booking: Option<&'a Booking>,
    pub equipment: &'a [Booking],
}

impl CellView<'_> {
    const AVAILABLE: CellView<'static> = CellView {
        booking: None,
        equipment: &[],
    };
}

/// Slot × resource lookup for one date. Every catalog slot has a row and
/// every catalog room a cell in it, so rendering never checks for presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanningGrid {
    pub date: NaiveDate,
    rows: Vec<GridRow>,
    #[serde(skip)]
    index: HashMap<SlotId, usize>,
}

impl PlanningGrid {
    /// All slots, all rooms available.
    pub fn empty(date: NaiveDate, catalog: &ResourceCatalog) -> Self {
        let rows: Vec<GridRow> = catalog
            .slots
            .iter()
            .map(|s| GridRow::empty(s, &catalog.rooms))
            .collect();
        let mut index = HashMap::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            // First definition wins if the catalog repeats an id.
            index.entry(row.slot.id).or_insert(i);
        }
        Self { date, rows, index }
    }

    /// Rows in catalog order.
    pub fn rows(&self) -> &[GridRow] {
        &self.rows
    }

    pub fn row(&self, slot: SlotId) -> Option<&GridRow> {
        self.index.get(&slot).map(|&i| &self.rows[i])
    }

    fn row_mut(&mut self, slot: SlotId) -> Option<&mut GridRow> {
        self.index.get(&slot).map(|&i| &mut self.rows[i])
    }

    /// Cell of a (slot, room) pair. Unknown pairs read as available.
    pub fn cell(&self, slot: SlotId, room: ResourceId) -> CellView<'_> {
        let Some(row) = self.row(slot) else {
            return CellView::AVAILABLE;
        };
        match row.rooms.get(&room) {
            Some(Cell::Booked(b)) => CellView {
                booking: Some(b),
                equipment: &row.equipment,
            },
            _ => CellView::AVAILABLE,
        }
    }

    pub fn booked_cells(&self) -> usize {
        self.rows.iter().map(GridRow::booked_rooms).sum()
    }

    pub fn total_cells(&self) -> usize {
        self.rows.iter().map(|r| r.rooms.len()).sum()
    }

    pub fn equipment_bookings(&self) -> usize {
        self.rows.iter().map(|r| r.equipment.len()).sum()
    }
}

/// A grid plus every anomaly met while building it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridReport {
    pub grid: PlanningGrid,
    pub anomalies: Vec<Anomaly>,
}

/// Merge one day's bookings into the catalog's slot × room grid.
///
/// The caller filters `day` to `date`; bookings are placed whatever their own
/// date says. A booking whose slot or resource is not in the catalog is
/// skipped, and so is every booking after the first for a (slot, resource)
/// pair. Each skip is reported in the returned anomalies.
pub fn build_grid(date: NaiveDate, catalog: &ResourceCatalog, day: &DayBookings) -> GridReport {
    let mut grid = PlanningGrid::empty(date, catalog);
    let mut anomalies = day.anomalies.clone();

    for booking in &day.rooms {
        if let Err(a) = place_room(&mut grid, catalog, booking) {
            anomalies.push(a);
        }
    }

    let mut seen_equipment: HashMap<(SlotId, ResourceId), BookingId> = HashMap::new();
    for booking in &day.equipment {
        if let Err(a) = place_equipment(&mut grid, catalog, booking, &mut seen_equipment) {
            anomalies.push(a);
        }
    }

    GridReport { grid, anomalies }
}

fn place_room(
    grid: &mut PlanningGrid,
    catalog: &ResourceCatalog,
    booking: &Booking,
) -> Result<(), Anomaly> {
    if catalog.resource(ResourceKind::Room, booking.resource_id).is_none() {
        return Err(Anomaly::UnknownResource {
            booking: booking.id,
            kind: ResourceKind::Room,
            resource: booking.resource_id,
        });
    }
    let row = grid.row_mut(booking.slot_id).ok_or(Anomaly::UnknownSlot {
        booking: booking.id,
        slot: booking.slot_id,
    })?;
    // Every catalog room got a cell in `GridRow::empty`.
    let cell = row
        .rooms
        .entry(booking.resource_id)
        .or_insert(Cell::Available);
    if let Cell::Booked(kept) = cell {
        return Err(Anomaly::DuplicateBooking {
            kept: kept.id,
            dropped: booking.id,
            slot: booking.slot_id,
            resource: booking.resource_id,
        });
    }
    *cell = Cell::Booked(booking.clone());
    Ok(())
}

fn place_equipment(
    grid: &mut PlanningGrid,
    catalog: &ResourceCatalog,
    booking: &Booking,
    seen: &mut HashMap<(SlotId, ResourceId), BookingId>,
) -> Result<(), Anomaly> {
    if catalog
        .resource(ResourceKind::Equipment, booking.resource_id)
        .is_none()
    {
        return Err(Anomaly::UnknownResource {
            booking: booking.id,
            kind: ResourceKind::Equipment,
            resource: booking.resource_id,
        });
    }
    let row = grid.row_mut(booking.slot_id).ok_or(Anomaly::UnknownSlot {
        booking: booking.id,
        slot: booking.slot_id,
    })?;
    if let Some(&kept) = seen.get(&(booking.slot_id, booking.resource_id)) {
        return Err(Anomaly::DuplicateBooking {
            kept,
            dropped: booking.id,
            slot: booking.slot_id,
            resource: booking.resource_id,
        });
    }
    seen.insert((booking.slot_id, booking.resource_id), booking.id);
    row.equipment.push(booking.clone());
    Ok(())
}
