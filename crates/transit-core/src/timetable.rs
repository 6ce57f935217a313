use std::error;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use model::vehicle_journey::VehicleJourney;

#[derive(Debug)]
pub enum TimetableError {
    NotFound,
    Transport(Box<dyn error::Error + Send + Sync>),
}

pub type TimetableResult<T> = Result<T, TimetableError>;

/// The timetable lookup client that returns base-schedule trips, invoked by
/// the handler pipeline when it needs a [`VehicleJourney`] that is not yet
/// cached in storage. Authoring the concrete HTTP client against a specific
/// timetable service is out of scope; this crate only pins the interface.
#[async_trait]
pub trait TimetableClient: Send + Sync {
    async fn resolve_vehicle_journey(
        &self,
        base_trip_id: &str,
        lower_bound: NaiveDateTime,
        upper_bound: NaiveDateTime,
    ) -> TimetableResult<VehicleJourney>;
}
