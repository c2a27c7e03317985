//! JSON shapes of the reservation backend. Field names are the backend's.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// List endpoints answer either a bare array or a paginated envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page { results: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Page { results } => results,
            Listing::Bare(items) => items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDto {
    pub id: i64,
    pub nom: String,
    pub heure_debut: String,
    pub heure_fin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: i64,
    pub nom: String,
}

/// Rooms and equipment share one shape; each kind fills its own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDto {
    pub id: i64,
    pub nom: String,
    #[serde(default)]
    pub capacite: Option<u32>,
    #[serde(default)]
    pub equipements: Option<String>,
    #[serde(default)]
    pub numero_serie: Option<String>,
    #[serde(default)]
    pub type_materiel_detail: Option<NamedRef>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDto {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub matricule: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationDto {
    pub id: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub salle: Option<i64>,
    #[serde(default)]
    pub salle_detail: Option<NamedRef>,
    #[serde(default)]
    pub materiel: Option<i64>,
    #[serde(default)]
    pub materiel_detail: Option<NamedRef>,
    #[serde(default)]
    pub creneau: Option<i64>,
    #[serde(default)]
    pub creneau_detail: Option<NamedRef>,
    #[serde(default)]
    pub enseignant: Option<i64>,
    #[serde(default)]
    pub enseignant_detail: Option<UserDto>,
    #[serde(default)]
    pub sujet: Option<String>,
    #[serde(default)]
    pub commentaires: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Bookings of one slot in the day planning payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotPlanningDto {
    #[serde(default)]
    pub salle: Vec<ReservationDto>,
    #[serde(default)]
    pub materiels: Vec<ReservationDto>,
}

/// `GET /planning/?date=`: keyed by slot display name, not id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlanningPayload {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub planning: HashMap<String, SlotPlanningDto>,
}

/// `GET /mes-reservations/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MyBookingsPayload {
    #[serde(default)]
    pub reservations_salles: Vec<ReservationDto>,
    #[serde(default)]
    pub reservations_materiels: Vec<ReservationDto>,
}

/// `POST /disponibilite/` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRequestDto {
    pub type_ressource: String,
    pub ressource_id: i64,
    pub date: NaiveDate,
    pub creneau_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityDto {
    pub disponible: bool,
    #[serde(default)]
    pub conflit: Option<String>,
}

/// `GET /statistiques/`: backend-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsDto {
    #[serde(default)]
    pub total_reservations_salles: u64,
    #[serde(default)]
    pub total_reservations_materiels: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_accepts_both_shapes() {
        let bare: Listing<SlotDto> = serde_json::from_str(
            r#"[{"id":1,"nom":"M1","heure_debut":"08:00:00","heure_fin":"10:00:00"}]"#,
        )
        .unwrap();
        assert_eq!(bare.into_vec().len(), 1);

        let page: Listing<SlotDto> = serde_json::from_str(
            r#"{"count":1,"next":null,"results":[{"id":1,"nom":"M1","heure_debut":"08:00","heure_fin":"10:00"}]}"#,
        )
        .unwrap();
        assert_eq!(page.into_vec()[0].nom, "M1");
    }

    #[test]
    fn resource_defaults_to_active() {
        let r: ResourceDto = serde_json::from_str(r#"{"id":4,"nom":"Projecteur"}"#).unwrap();
        assert!(r.active);
        assert_eq!(r.capacite, None);
    }

    #[test]
    fn day_planning_tolerates_missing_kinds() {
        let p: DayPlanningPayload = serde_json::from_str(
            r#"{"date":"2024-03-04","planning":{"M1":{"salle":[{"id":9,"date":"2024-03-04","salle":2}]}}}"#,
        )
        .unwrap();
        let slot = &p.planning["M1"];
        assert_eq!(slot.salle.len(), 1);
        assert!(slot.materiels.is_empty());
        assert_eq!(slot.salle[0].salle, Some(2));
    }

    #[test]
    fn statistics_missing_counters_read_zero() {
        let s: StatisticsDto =
            serde_json::from_str(r#"{"total_reservations_salles":42}"#).unwrap();
        assert_eq!(s.total_reservations_salles, 42);
        assert_eq!(s.total_reservations_materiels, 0);
    }
}
