use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::HasId;
use uuid::Uuid;

use crate::vehicle_journey::VehicleJourneyId;

/// Processing outcome of one raw inbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProcessingStatus {
    Ok,
    Ko,
    Pending,
}

/// An immutable record of one inbound payload plus its processing outcome.
///
/// Outlives the [`TripUpdate`](crate::trip_update::TripUpdate) rows it
/// produced so that debugging information survives a trip purge; the
/// many-to-many link is the `trip_update_ids` field, materialized in
/// storage as the `real_time_update_trip_update` association table.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeUpdate {
    pub connector_type: String,
    pub contributor_id: String,

    #[serde(skip_serializing)]
    #[schemars(skip)]
    pub raw_payload: Vec<u8>,

    pub status: ProcessingStatus,
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub trip_update_ids: Vec<VehicleJourneyId>,
}

impl HasId for RealTimeUpdate {
    type IdType = Uuid;
}

impl RealTimeUpdate {
    pub fn new_pending(connector_type: String, contributor_id: String, raw_payload: Vec<u8>, now: DateTime<Utc>) -> Self {
        Self {
            connector_type,
            contributor_id,
            raw_payload,
            status: ProcessingStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
            trip_update_ids: Vec::new(),
        }
    }

    pub fn mark_ok(&mut self, now: DateTime<Utc>) {
        self.status = ProcessingStatus::Ok;
        self.error = None;
        self.updated_at = now;
    }

    /// At-most-one KO row is kept per (contributor, payload, error) triple:
    /// a repeat call on the same logical failure pokes `updated_at` rather
    /// than inserting a second row — the caller is responsible for looking
    /// up the existing row first.
    pub fn mark_ko(&mut self, error: String, now: DateTime<Utc>) {
        self.status = ProcessingStatus::Ko;
        self.error = Some(error);
        self.updated_at = now;
    }

    pub fn link_trip_update(&mut self, vehicle_journey_id: VehicleJourneyId) {
        if !self.trip_update_ids.contains(&vehicle_journey_id) {
            self.trip_update_ids.push(vehicle_journey_id);
        }
    }
}
