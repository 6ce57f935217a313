use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::HasId;
use utility::serde::signed_duration;

use crate::effect::Effect;
use crate::vehicle_journey::VehicleJourneyId;

/// Trip-level status, matching the four values the merge engine and
/// consistency adjuster reason about in the specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum TripStatus {
    None,
    Update,
    Delete,
    Add,
}

impl Default for TripStatus {
    fn default() -> Self {
        TripStatus::None
    }
}

/// Status of one stop event (arrival or departure) within a stop-time update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum StopEventStatus {
    None,
    Update,
    Delete,
    DeletedForDetour,
    Add,
    AddedForDetour,
}

impl Default for StopEventStatus {
    fn default() -> Self {
        StopEventStatus::None
    }
}

impl StopEventStatus {
    pub fn is_deleted(self) -> bool {
        matches!(self, StopEventStatus::Delete | StopEventStatus::DeletedForDetour)
    }

    pub fn is_added(self) -> bool {
        matches!(self, StopEventStatus::Add | StopEventStatus::AddedForDetour)
    }
}

/// Realtime state of one stop event within a trip update.
///
/// Invariants enforced by the [consistency adjuster](../merge_engine) rather
/// than at construction: within a single adjusted stop, `arrival <=
/// departure`; across adjacent adjusted stops, `departure[i] <=
/// arrival[i+1]`; delays at a status other than `Update` are zero.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StopTimeUpdate {
    /// Zero-based position of this stop within the trip update's sequence.
    pub order: i32,
    pub stop_id: String,

    pub arrival_time: Option<DateTime<Utc>>,
    #[serde(serialize_with = "signed_duration::serialize", deserialize_with = "signed_duration::deserialize")]
    #[schemars(schema_with = "signed_duration::schema")]
    pub arrival_delay: Duration,
    pub arrival_status: StopEventStatus,

    pub departure_time: Option<DateTime<Utc>>,
    #[serde(serialize_with = "signed_duration::serialize", deserialize_with = "signed_duration::deserialize")]
    #[schemars(schema_with = "signed_duration::schema")]
    pub departure_delay: Duration,
    pub departure_status: StopEventStatus,

    pub message: Option<String>,
}

impl StopTimeUpdate {
    /// Field-wise comparison used by the merge engine's idempotence check in
    /// place of a runtime-reflection equality — exactly the fields named in
    /// the specification's invariant for a stop-time update.
    pub fn is_equal(&self, other: &Self) -> bool {
        self.stop_id == other.stop_id
            && self.order == other.order
            && self.message == other.message
            && self.arrival_time == other.arrival_time
            && self.arrival_delay == other.arrival_delay
            && self.arrival_status == other.arrival_status
            && self.departure_time == other.departure_time
            && self.departure_delay == other.departure_delay
            && self.departure_status == other.departure_status
    }
}

/// Cumulative real-time state for one [`VehicleJourney`](crate::vehicle_journey::VehicleJourney).
///
/// Identity is the vehicle journey it describes. Contributor id is
/// immutable after first write; the merge engine is the only writer and it
/// always copies it from the incoming update, which in practice never
/// changes contributor across successive merges of the same trip.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripUpdate {
    pub vehicle_journey_id: VehicleJourneyId,
    pub contributor_id: String,

    pub status: TripStatus,
    pub effect: Effect,
    pub message: Option<String>,
    pub company_id: Option<String>,
    pub physical_mode_id: Option<String>,
    pub headsign: Option<String>,

    pub stop_time_updates: Vec<StopTimeUpdate>,
}

impl HasId for TripUpdate {
    type IdType = VehicleJourneyId;
}

impl TripUpdate {
    pub fn new(vehicle_journey_id: VehicleJourneyId, contributor_id: String) -> Self {
        Self {
            vehicle_journey_id,
            contributor_id,
            status: TripStatus::None,
            effect: Effect::UnknownEffect,
            message: None,
            company_id: None,
            physical_mode_id: None,
            headsign: None,
            stop_time_updates: Vec::new(),
        }
    }

    /// (a) when status is `Delete` the stop-time sequence is empty.
    pub fn check_delete_invariant(&self) -> bool {
        self.status != TripStatus::Delete || self.stop_time_updates.is_empty()
    }

    /// (b) stop-time order indices are dense and zero-based.
    pub fn check_order_density(&self) -> bool {
        self.stop_time_updates
            .iter()
            .enumerate()
            .all(|(index, stop)| stop.order as usize == index)
    }

    /// Stop-finder used by the merge engine: prefer the unique stop whose
    /// `(stop_id, order)` matches, fall back to the first stop whose
    /// `stop_id` matches, so lollipop lines (a stop visited twice) still
    /// resolve correctly when the feed omits order.
    pub fn find_stop(&self, stop_id: &str, order: Option<i32>) -> Option<&StopTimeUpdate> {
        if let Some(order) = order {
            if let Some(stop) = self
                .stop_time_updates
                .iter()
                .find(|stop| stop.stop_id == stop_id && stop.order == order)
            {
                return Some(stop);
            }
        }
        self.stop_time_updates.iter().find(|stop| stop.stop_id == stop_id)
    }
}
