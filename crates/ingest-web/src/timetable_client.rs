use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use model::vehicle_journey::VehicleJourney;
use reqwest::{Client, StatusCode};
use transit_core::{TimetableClient, TimetableError, TimetableResult};

/// Thin HTTP timetable lookup: `GET {base_url}/vehicle_journeys/{base_trip_id}`
/// with the circulation window as query parameters, bearer-token
/// authenticated. Deliberately generic rather than tied to a specific
/// vendor's response shape, matching [`transit_core::timetable`]'s note
/// that authoring a vendor-specific client is out of scope.
pub struct HttpTimetableClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTimetableClient {
    pub fn new(base_url: String, token: Option<String>, timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url, token })
    }
}

#[async_trait]
impl TimetableClient for HttpTimetableClient {
    async fn resolve_vehicle_journey(&self, base_trip_id: &str, lower_bound: NaiveDateTime, upper_bound: NaiveDateTime) -> TimetableResult<VehicleJourney> {
        let url = format!("{}/vehicle_journeys/{base_trip_id}", self.base_url.trim_end_matches('/'));
        let mut request = self.http.get(&url).query(&[("from", lower_bound.to_string()), ("to", upper_bound.to_string())]);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|why| TimetableError::Transport(Box::new(why)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(TimetableError::NotFound);
        }

        let response = response.error_for_status().map_err(|why| TimetableError::Transport(Box::new(why)))?;

        response.json().await.map_err(|why| TimetableError::Transport(Box::new(why)))
    }
}
