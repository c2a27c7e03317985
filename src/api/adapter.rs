//! Wire → domain conversion.
//!
//! The backend keys its day planning by slot *name*. That join is resolved
//! here, once, so everything downstream works on slot ids.

use chrono::NaiveDate;

use crate::model::*;

use super::wire::*;

/// Backend times may carry seconds (`08:00:00`); the model keeps `HH:MM`.
fn hhmm(raw: &str) -> String {
    raw.get(..5).unwrap_or(raw).to_string()
}

pub fn slot_from_wire(dto: SlotDto) -> TimeSlot {
    TimeSlot {
        id: SlotId(dto.id),
        name: dto.nom,
        start: hhmm(&dto.heure_debut),
        end: hhmm(&dto.heure_fin),
    }
}

pub fn resource_from_wire(dto: ResourceDto, kind: ResourceKind) -> Resource {
    let details = match kind {
        ResourceKind::Room => dto.equipements,
        ResourceKind::Equipment => dto.type_materiel_detail.map(|t| t.nom),
    };
    Resource {
        id: ResourceId(dto.id),
        name: dto.nom,
        kind,
        capacity: match kind {
            ResourceKind::Room => dto.capacite,
            ResourceKind::Equipment => None,
        },
        active: dto.active,
        details,
    }
}

/// Convert one reservation. `slot` overrides whatever slot the record names;
/// without it the record must carry `creneau` or `creneau_detail`.
pub fn booking_from_wire(
    dto: ReservationDto,
    kind: ResourceKind,
    slot: Option<SlotId>,
) -> Result<Booking, Anomaly> {
    let id = BookingId(dto.id);
    let (resource, detail) = match kind {
        ResourceKind::Room => (dto.salle, dto.salle_detail),
        ResourceKind::Equipment => (dto.materiel, dto.materiel_detail),
    };
    let resource_id = resource
        .or(detail.as_ref().map(|d| d.id))
        .map(ResourceId)
        .ok_or(Anomaly::MalformedRecord {
            booking: id,
            reason: "no resource reference",
        })?;
    let slot_id = slot
        .or(dto.creneau.map(SlotId))
        .or(dto.creneau_detail.as_ref().map(|c| SlotId(c.id)))
        .ok_or(Anomaly::MalformedRecord {
            booking: id,
            reason: "no slot reference",
        })?;
    let owner_name = dto.enseignant_detail.as_ref().map(|u| {
        format!("{} {}", u.first_name, u.last_name).trim().to_string()
    });

    Ok(Booking {
        id,
        kind,
        resource_id,
        resource_name: detail.map(|d| d.nom),
        date: dto.date,
        slot_id,
        owner_id: dto
            .enseignant
            .or(dto.enseignant_detail.as_ref().and_then(|u| u.id))
            .map(UserId),
        owner_name,
        subject: dto.sujet,
        comment: dto.commentaires,
        created_at: dto.created_at,
    })
}

/// Convert a flat listing, skipping (and reporting) records that cannot be placed.
pub fn bookings_from_wire(
    dtos: Vec<ReservationDto>,
    kind: ResourceKind,
) -> (Vec<Booking>, Vec<Anomaly>) {
    let mut bookings = Vec::with_capacity(dtos.len());
    let mut anomalies = Vec::new();
    for dto in dtos {
        match booking_from_wire(dto, kind, None) {
            Ok(b) => bookings.push(b),
            Err(a) => anomalies.push(a),
        }
    }
    (bookings, anomalies)
}

/// Normalize a slot-name-keyed day payload into slot-id-keyed bookings.
///
/// Slots are walked in catalog order and bookings keep their payload order
/// within a slot, so "first encountered" is deterministic. Names the catalog
/// does not know are reported in sorted order. When several catalog slots
/// share a name, the first one takes the bookings and the clash is reported.
pub fn normalize_day_planning(
    date: NaiveDate,
    mut payload: DayPlanningPayload,
    slots: &[TimeSlot],
) -> DayBookings {
    let mut day = DayBookings::empty(date);

    for (i, slot) in slots.iter().enumerate() {
        let Some(entry) = payload.planning.remove(&slot.name) else {
            continue;
        };
        let ignored: Vec<SlotId> = slots[i + 1..]
            .iter()
            .filter(|s| s.name == slot.name)
            .map(|s| s.id)
            .collect();
        if !ignored.is_empty() && !(entry.salle.is_empty() && entry.materiels.is_empty()) {
            day.anomalies.push(Anomaly::AmbiguousSlotName {
                name: slot.name.clone(),
                kept: slot.id,
                ignored,
            });
        }
        for (kind, dtos) in [
            (ResourceKind::Room, entry.salle),
            (ResourceKind::Equipment, entry.materiels),
        ] {
            for dto in dtos {
                match booking_from_wire(dto, kind, Some(slot.id)) {
                    Ok(b) if kind == ResourceKind::Room => day.rooms.push(b),
                    Ok(b) => day.equipment.push(b),
                    Err(a) => day.anomalies.push(a),
                }
            }
        }
    }

    let mut leftovers: Vec<_> = payload.planning.into_iter().collect();
    leftovers.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, entry) in leftovers {
        let dropped: Vec<BookingId> = entry
            .salle
            .iter()
            .chain(entry.materiels.iter())
            .map(|r| BookingId(r.id))
            .collect();
        if !dropped.is_empty() {
            day.anomalies.push(Anomaly::UnknownSlotName { name, dropped });
        }
    }

    day
}

// ── Domain → wire, for the in-memory backend ─────────────────────

pub fn booking_to_wire(b: &Booking, slot_name: Option<&str>) -> ReservationDto {
    let detail = b.resource_name.as_ref().map(|nom| NamedRef {
        id: b.resource_id.0,
        nom: nom.clone(),
    });
    let (salle, salle_detail, materiel, materiel_detail) = match b.kind {
        ResourceKind::Room => (Some(b.resource_id.0), detail, None, None),
        ResourceKind::Equipment => (None, None, Some(b.resource_id.0), detail),
    };
    ReservationDto {
        id: b.id.0,
        date: b.date,
        salle,
        salle_detail,
        materiel,
        materiel_detail,
        creneau: Some(b.slot_id.0),
        creneau_detail: slot_name.map(|nom| NamedRef {
            id: b.slot_id.0,
            nom: nom.to_string(),
        }),
        enseignant: b.owner_id.map(|u| u.0),
        enseignant_detail: None,
        sujet: b.subject.clone(),
        commentaires: b.comment.clone(),
        created_at: b.created_at,
    }
}

pub fn slot_to_wire(s: &TimeSlot) -> SlotDto {
    SlotDto {
        id: s.id.0,
        nom: s.name.clone(),
        heure_debut: s.start.clone(),
        heure_fin: s.end.clone(),
    }
}

pub fn resource_to_wire(r: &Resource) -> ResourceDto {
    ResourceDto {
        id: r.id.0,
        nom: r.name.clone(),
        capacite: r.capacity,
        equipements: match r.kind {
            ResourceKind::Room => r.details.clone(),
            ResourceKind::Equipment => None,
        },
        numero_serie: None,
        type_materiel_detail: match r.kind {
            ResourceKind::Room => None,
            ResourceKind::Equipment => r.details.clone().map(|nom| NamedRef { id: 0, nom }),
        },
        active: r.active,
    }
}
