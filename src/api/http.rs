use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use crate::model::ResourceKind;
use crate::observability::{FETCH_DURATION_SECONDS, FETCH_FAILURES_TOTAL};

use super::wire::*;
use super::{
    ApiError, Availability, AvailabilityRequest, BookingTotals, PlanningSource, TokenProvider,
};

/// REST client for the reservation backend.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpSource {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Connection(format!("client build error: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<R: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<R, ApiError> {
        let request = match self.tokens.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let started = Instant::now();
        let result = self.execute(request).await;
        metrics::histogram!(FETCH_DURATION_SECONDS, "operation" => operation)
            .record(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            metrics::counter!(FETCH_FAILURES_TOTAL, "operation" => operation).increment(1);
            tracing::debug!("{operation} failed: {e}");
            if matches!(e, ApiError::Unauthorized) {
                self.tokens.on_unauthorized();
            }
        }
        result
    }

    async fn execute<R: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<R, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &body));
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get_listing<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        let listing: Listing<T> = self
            .send(operation, self.client.get(self.url(path)).query(query))
            .await?;
        Ok(listing.into_vec())
    }
}

fn range_query(from: NaiveDate, to: NaiveDate) -> [(&'static str, String); 2] {
    [("date_debut", from.to_string()), ("date_fin", to.to_string())]
}

#[async_trait]
impl PlanningSource for HttpSource {
    async fn list_time_slots(&self) -> Result<Vec<SlotDto>, ApiError> {
        self.get_listing("list_time_slots", "creneaux/", &[]).await
    }

    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<ResourceDto>, ApiError> {
        let path = match kind {
            ResourceKind::Room => "salles/",
            ResourceKind::Equipment => "materiels/",
        };
        self.get_listing("list_resources", path, &[]).await
    }

    async fn get_day_planning(&self, date: NaiveDate) -> Result<DayPlanningPayload, ApiError> {
        let request = self
            .client
            .get(self.url("planning/"))
            .query(&[("date", date.to_string())]);
        self.send("get_day_planning", request).await
    }

    async fn list_bookings(
        &self,
        kind: ResourceKind,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ReservationDto>, ApiError> {
        let path = match kind {
            ResourceKind::Room => "reservations-salles/",
            ResourceKind::Equipment => "reservations-materiels/",
        };
        self.get_listing("list_bookings", path, &range_query(from, to))
            .await
    }

    async fn list_my_bookings(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<MyBookingsPayload, ApiError> {
        let request = self
            .client
            .get(self.url("mes-reservations/"))
            .query(&range_query(from, to));
        self.send("list_my_bookings", request).await
    }

    async fn check_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<Availability, ApiError> {
        let http = self
            .client
            .post(self.url("disponibilite/"))
            .json(&request.to_wire());
        let dto: AvailabilityDto = self.send("check_availability", http).await?;
        Ok(dto.into())
    }

    async fn get_statistics(&self) -> Result<BookingTotals, ApiError> {
        let request = self.client.get(self.url("statistiques/"));
        let dto: StatisticsDto = self.send("get_statistics", request).await?;
        Ok(dto.into())
    }
}
