//! Serializes merged, persisted [`TripUpdate`]s into the outbound
//! transit-realtime feed described in the external interfaces: one
//! `FeedEntity` per trip, `SCHEDULED`/`CANCELED` schedule-relationship,
//! `ADDITIONAL_SERVICE` effect on added trips, and per-stop arrival/departure
//! carrying time, delay and a schedule-status extension field.

use model::effect::Effect;
use model::trip_update::{StopEventStatus, StopTimeUpdate, TripStatus, TripUpdate};

use crate::pb;
use crate::pb::feed_header::Incrementality;
use crate::pb::trip_update::trip_descriptor::ScheduleRelationship;
use crate::pb::trip_update::stop_time_update::ScheduleStatus;
use crate::pb::trip_update::{Effect as PbEffect, StopTimeEvent};

/// Whether the feed carries only the trips that changed since the last
/// publish (the steady-state case) or a complete snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedIncrementality {
    Differential,
    FullDataset,
}

pub fn encode_feed(trips: &[TripUpdate], incrementality: FeedIncrementality, timestamp_unix: u64) -> Vec<u8> {
    let message = pb::FeedMessage {
        header: Some(pb::FeedHeader {
            gtfs_realtime_version: "2.0".to_owned(),
            incrementality: Some(match incrementality {
                FeedIncrementality::Differential => Incrementality::Differential as i32,
                FeedIncrementality::FullDataset => Incrementality::FullDataset as i32,
            }),
            timestamp: Some(timestamp_unix),
        }),
        entity: trips.iter().map(entity_for_trip).collect(),
    };

    prost::Message::encode_to_vec(&message)
}

fn entity_for_trip(trip: &TripUpdate) -> pb::FeedEntity {
    let is_delete = trip.status == TripStatus::Delete;

    pb::FeedEntity {
        id: format!("{}-{}", trip.vehicle_journey_id.base_trip_id, trip.vehicle_journey_id.start_timestamp),
        is_deleted: Some(is_delete),
        trip_update: Some(pb::TripUpdate {
            trip: Some(pb::trip_update::TripDescriptor {
                trip_id: Some(trip.vehicle_journey_id.base_trip_id.clone()),
                start_date: Some(trip.vehicle_journey_id.start_timestamp.format("%Y%m%d").to_string()),
                schedule_relationship: Some(if is_delete {
                    ScheduleRelationship::Canceled as i32
                } else {
                    ScheduleRelationship::Scheduled as i32
                }),
            }),
            stop_time_update: trip.stop_time_updates.iter().map(stop_time_update_entity).collect(),
            timestamp: None,
            kirin_message: trip.message.clone(),
            kirin_contributor_id: Some(trip.contributor_id.clone()),
            kirin_company_id: trip.company_id.clone(),
            kirin_effect: Some(effect_for_wire(trip.effect) as i32),
            kirin_physical_mode_id: trip.physical_mode_id.clone(),
        }),
    }
}

fn stop_time_update_entity(stop: &StopTimeUpdate) -> pb::trip_update::StopTimeUpdate {
    pb::trip_update::StopTimeUpdate {
        stop_sequence: Some(stop.order as u32),
        stop_id: Some(stop.stop_id.clone()),
        arrival: Some(StopTimeEvent {
            delay: Some(stop.arrival_delay.num_seconds() as i32),
            time: stop.arrival_time.map(|time| time.timestamp()),
        }),
        departure: Some(StopTimeEvent {
            delay: Some(stop.departure_delay.num_seconds() as i32),
            time: stop.departure_time.map(|time| time.timestamp()),
        }),
        arrival_status: Some(schedule_status_for_wire(stop.arrival_status) as i32),
        departure_status: Some(schedule_status_for_wire(stop.departure_status) as i32),
        kirin_stop_message: stop.message.clone(),
    }
}

fn schedule_status_for_wire(status: StopEventStatus) -> ScheduleStatus {
    match status {
        StopEventStatus::None | StopEventStatus::Update => ScheduleStatus::StatusScheduled,
        StopEventStatus::Delete => ScheduleStatus::StatusDeleted,
        StopEventStatus::DeletedForDetour => ScheduleStatus::StatusDeletedForDetour,
        StopEventStatus::Add => ScheduleStatus::StatusAdded,
        StopEventStatus::AddedForDetour => ScheduleStatus::StatusAddedForDetour,
    }
}

fn effect_for_wire(effect: Effect) -> PbEffect {
    match effect {
        Effect::NoService => PbEffect::NoService,
        Effect::ReducedService => PbEffect::ReducedService,
        Effect::SignificantDelays => PbEffect::SignificantDelays,
        Effect::Detour => PbEffect::Detour,
        Effect::AdditionalService => PbEffect::AdditionalService,
        Effect::ModifiedService => PbEffect::ModifiedService,
        Effect::UnknownEffect => PbEffect::UnknownEffect,
    }
}
