use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::api::ApiError;
use crate::limits::WEEKDAYS_PER_WEEK;
use crate::model::{Anomaly, DayBookings, ResourceCatalog};
use crate::observability::WEEK_DAYS_DEGRADED_TOTAL;

use super::grid::{build_grid, PlanningGrid};

/// Monday..Friday of the week containing `reference`. Weeks start on
/// Monday, so a weekend date belongs to the week before it.
pub fn week_days(reference: NaiveDate) -> [NaiveDate; WEEKDAYS_PER_WEEK] {
    let back = u64::from(reference.weekday().num_days_from_monday());
    let monday = reference
        .checked_sub_days(Days::new(back))
        .unwrap_or(reference);
    std::array::from_fn(|i| {
        monday
            .checked_add_days(Days::new(i as u64))
            .unwrap_or(monday)
    })
}

/// Five day grids keyed Monday..Friday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekGrid(pub BTreeMap<NaiveDate, PlanningGrid>);

impl WeekGrid {
    pub fn days(&self) -> impl Iterator<Item = &NaiveDate> {
        self.0.keys()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&PlanningGrid> {
        self.0.get(&date)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &PlanningGrid)> {
        self.0.iter()
    }

    pub fn booked_cells(&self) -> usize {
        self.0.values().map(PlanningGrid::booked_cells).sum()
    }
}

/// Days of a week view that could not be fetched. Raised once per build,
/// however many days failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWarning {
    pub failures: Vec<(NaiveDate, ApiError)>,
}

impl fmt::Display for FetchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} day(s) could not be loaded:", self.failures.len())?;
        for (date, err) in &self.failures {
            write!(f, " {date} ({err})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekReport {
    pub week: WeekGrid,
    pub anomalies: Vec<Anomaly>,
    pub warning: Option<FetchWarning>,
}

/// Fetch the five weekdays around `reference` concurrently and grid them.
///
/// A failed day is shown as an all-available grid and listed in the
/// warning; the other days are unaffected.
pub async fn build_week<F, Fut>(
    reference: NaiveDate,
    catalog: &ResourceCatalog,
    fetch_day: F,
) -> WeekReport
where
    F: Fn(NaiveDate) -> Fut,
    Fut: Future<Output = Result<Arc<DayBookings>, ApiError>>,
{
    let days = week_days(reference);
    let results = futures::future::join_all(days.iter().map(|&d| fetch_day(d))).await;

    let mut grids = BTreeMap::new();
    let mut anomalies = Vec::new();
    let mut failures = Vec::new();

    for (date, result) in days.into_iter().zip(results) {
        match result {
            Ok(day) => {
                let report = build_grid(date, catalog, &day);
                anomalies.extend(report.anomalies);
                grids.insert(date, report.grid);
            }
            Err(e) => {
                metrics::counter!(WEEK_DAYS_DEGRADED_TOTAL).increment(1);
                tracing::warn!("planning for {date} unavailable: {e}");
                grids.insert(date, PlanningGrid::empty(date, catalog));
                failures.push((date, e));
            }
        }
    }

    WeekReport {
        week: WeekGrid(grids),
        anomalies,
        warning: (!failures.is_empty()).then_some(FetchWarning { failures }),
    }
}
