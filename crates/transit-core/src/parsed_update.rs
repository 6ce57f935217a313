use chrono::NaiveDateTime;
use model::effect::Effect;
use model::trip_update::{StopTimeUpdate, TripStatus, TripUpdate};
use model::vehicle_journey::VehicleJourneyId;
use serde::Deserialize;

/// The wire shape a connector (vendor parser or the generic JSON endpoint)
/// produces once it has parsed a raw payload into the internal model. This
/// is deliberately NOT a vendor format: authoring vendor parsers is out of
/// scope, so every connector's job ends at producing one of these.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTripUpdate {
    pub base_trip_id: String,
    pub start_timestamp: NaiveDateTime,
    pub contributor_id: String,

    pub status: TripStatus,
    #[serde(default)]
    pub effect: Effect,
    pub message: Option<String>,
    pub company_id: Option<String>,
    pub physical_mode_id: Option<String>,
    pub headsign: Option<String>,

    pub stop_time_updates: Vec<StopTimeUpdate>,
}

impl ParsedTripUpdate {
    pub fn vehicle_journey_id(&self) -> VehicleJourneyId {
        VehicleJourneyId::new(self.base_trip_id.clone(), self.start_timestamp)
    }

    /// Splits this wire DTO into the `(identity, TripUpdate)` pair the
    /// handler pipeline consumes, discarding nothing: every field here has
    /// a home on [`TripUpdate`]. Whether the surrounding batch is complete
    /// or incremental is a property of the feed as a whole, not of one
    /// trip, so it travels alongside the batch rather than on this type.
    pub fn into_trip_update(self) -> (VehicleJourneyId, TripUpdate) {
        let vehicle_journey_id = self.vehicle_journey_id();
        let trip_update = TripUpdate {
            vehicle_journey_id: vehicle_journey_id.clone(),
            contributor_id: self.contributor_id,
            status: self.status,
            effect: self.effect,
            message: self.message,
            company_id: self.company_id,
            physical_mode_id: self.physical_mode_id,
            headsign: self.headsign,
            stop_time_updates: self.stop_time_updates,
        };
        (vehicle_journey_id, trip_update)
    }
}
