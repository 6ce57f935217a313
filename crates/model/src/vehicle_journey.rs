use chrono::{Duration, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::HasId;
use utility::serde::duration;

/// One stop of the base (non-realtime) timetable, cached onto a
/// [`VehicleJourney`] so the merge engine never needs a live round-trip to
/// the timetable service while reconciling a batch.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BaseStopTime {
    pub stop_id: String,

    /// Time of day since midnight of the vehicle journey's circulation date.
    /// `None` only for a stop synthesized from an incoming "added" stop that
    /// has no counterpart in the base timetable.
    #[serde(serialize_with = "duration::serialize_option", deserialize_with = "duration::deserialize_option")]
    #[schemars(schema_with = "duration::schema_option")]
    pub arrival_time: Option<Duration>,

    #[serde(serialize_with = "duration::serialize_option", deserialize_with = "duration::deserialize_option")]
    #[schemars(schema_with = "duration::schema_option")]
    pub departure_time: Option<Duration>,

    pub stop_timezone: String,
}

impl BaseStopTime {
    pub fn synthesized(stop_id: String, arrival_time: Option<Duration>, departure_time: Option<Duration>) -> Self {
        Self {
            stop_id,
            arrival_time,
            departure_time,
            stop_timezone: "UTC".to_owned(),
        }
    }
}

/// Identity of a [`VehicleJourney`]: one scheduled circulation of a base trip
/// on a specific calendar day, pinned to the naive-UTC instant it starts.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Hash, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleJourneyId {
    pub base_trip_id: String,
    pub start_timestamp: NaiveDateTime,
}

impl VehicleJourneyId {
    pub fn new(base_trip_id: String, start_timestamp: NaiveDateTime) -> Self {
        Self {
            base_trip_id,
            start_timestamp,
        }
    }
}

/// One scheduled circulation of a trip on a specific calendar day.
///
/// `start_timestamp` is always naive UTC; a caller handing in timezone-aware
/// values has already violated the contract upstream and `new`/`added` treat
/// that as a fatal construction error rather than attempting to guess an
/// offset.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VehicleJourney {
    pub base_trip_id: String,
    pub start_timestamp: NaiveDateTime,
    pub stops: Vec<BaseStopTime>,
}

impl HasId for VehicleJourney {
    type IdType = VehicleJourneyId;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VehicleJourneyError {
    CirculationDateUnresolvable {
        base_trip_id: String,
        lower_bound: NaiveDateTime,
        upper_bound: NaiveDateTime,
    },
    EmptyStopSequence(String),
}

impl std::fmt::Display for VehicleJourneyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CirculationDateUnresolvable {
                base_trip_id,
                lower_bound,
                upper_bound,
            } => write!(
                f,
                "circulation date unresolvable for trip {base_trip_id} in window [{lower_bound}, {upper_bound}]"
            ),
            Self::EmptyStopSequence(trip_id) => {
                write!(f, "base timetable stop sequence for trip {trip_id} is empty")
            }
        }
    }
}

impl std::error::Error for VehicleJourneyError {}

impl VehicleJourney {
    /// Resolves the circulation date of a trip that exists in the base
    /// timetable: the start timestamp is the earliest time-of-day of the
    /// first stop combined with the lower bound's date; if that candidate
    /// falls before the lower bound it is rolled forward by one day, and if
    /// it still exceeds the upper bound the window cannot place this trip.
    pub fn from_base_schedule(
        base_trip_id: String,
        stops: Vec<BaseStopTime>,
        lower_bound: NaiveDateTime,
        upper_bound: NaiveDateTime,
    ) -> Result<Self, VehicleJourneyError> {
        let first_stop_time = stops
            .first()
            .and_then(|stop| stop.arrival_time.or(stop.departure_time))
            .ok_or_else(|| VehicleJourneyError::EmptyStopSequence(base_trip_id.clone()))?;

        let mut start_timestamp = lower_bound.date().and_time(chrono::NaiveTime::MIN) + first_stop_time;
        if start_timestamp < lower_bound {
            start_timestamp += Duration::days(1);
        }
        if start_timestamp > upper_bound {
            return Err(VehicleJourneyError::CirculationDateUnresolvable {
                base_trip_id,
                lower_bound,
                upper_bound,
            });
        }

        Ok(Self {
            base_trip_id,
            start_timestamp,
            stops,
        })
    }

    /// A trip that exists only in realtime (an "added" trip): the base
    /// timetable stops list is empty and the explicit start is used
    /// verbatim, with no window resolution.
    pub fn added(base_trip_id: String, start_timestamp: NaiveDateTime) -> Self {
        Self {
            base_trip_id,
            start_timestamp,
            stops: Vec::new(),
        }
    }

    pub fn id(&self) -> VehicleJourneyId {
        VehicleJourneyId::new(self.base_trip_id.clone(), self.start_timestamp)
    }

    pub fn find_base_stop(&self, stop_id: &str) -> Option<&BaseStopTime> {
        self.stops.iter().find(|stop| stop.stop_id == stop_id)
    }
}
