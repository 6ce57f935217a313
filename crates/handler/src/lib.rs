//! The handler pipeline: batches a lookup for persisted trip updates, runs
//! each incoming update through the merge engine and consistency adjuster,
//! commits the result alongside its real-time-update audit row, then
//! serializes and publishes the changed trips as one outbound feed.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use feed_codec::encode::FeedIncrementality;
use merge_engine::{adjust_consistency, merge_trip_update};
use model::real_time_update::RealTimeUpdate;
use model::trip_update::{TripStatus, TripUpdate};
use model::vehicle_journey::VehicleJourney;
use model::WithId;
use transit_core::database::{RealTimeUpdateRepo, TripUpdateRepo, VehicleJourneyRepo};
use transit_core::parsed_update::ParsedTripUpdate;
use transit_core::{MessageNotPublished, Publisher, Store, StoreError, TimetableClient, TimetableError};
use utility::id::Id;

#[derive(Debug)]
pub enum HandleError {
    Storage(StoreError),
    Publish(MessageNotPublished),
    Timetable(TimetableError),
}

impl From<StoreError> for HandleError {
    fn from(why: StoreError) -> Self {
        HandleError::Storage(why)
    }
}

pub type HandleResult<T> = Result<T, HandleError>;

/// One incoming trip update paired with the base vehicle journey the
/// parser resolved it against, per the stop-finder contract the merge
/// engine relies on.
pub struct IncomingTrip {
    pub vehicle_journey: VehicleJourney,
    pub trip_update: TripUpdate,
}

/// Runs the full handler pipeline for one real-time-update record against
/// `incoming`, persists the result transactionally and publishes the
/// changed trips downstream. Returns the persisted real-time-update row.
///
/// `new_is_complete` is forwarded to the merge engine: `true` for feeds
/// that carry a trip's full stop sequence, `false` for incremental ones.
pub async fn handle<S: Store>(
    store: &S,
    publisher: &dyn Publisher,
    mut real_time_update: RealTimeUpdate,
    incoming: Vec<IncomingTrip>,
    new_is_complete: bool,
    now: DateTime<Utc>,
) -> HandleResult<WithId<RealTimeUpdate>> {
    let ids: Vec<_> = incoming.iter().map(|trip| trip.trip_update.vehicle_journey_id.clone()).collect();

    let (persisted_row, changed) = store
        .perform_transaction(move |tx| async move {
            let mut persisted: HashMap<_, _> = tx.get_batch(&ids).await?;
            let mut changed = Vec::new();

            for trip in incoming {
                let old = persisted.remove(&trip.trip_update.vehicle_journey_id);

                let Some(mut merged) = merge_trip_update(&trip.vehicle_journey, old, trip.trip_update, new_is_complete) else {
                    continue;
                };

                if !adjust_consistency(&mut merged) {
                    log::warn!(
                        "dropping trip update for {:?}: consistency adjustment rejected it",
                        merged.vehicle_journey_id
                    );
                    continue;
                }

                real_time_update.link_trip_update(merged.vehicle_journey_id.clone());
                changed.push(merged);
            }

            if !changed.is_empty() {
                tx.put_many(changed.clone()).await?;
            }

            real_time_update.mark_ok(now);
            let persisted_row = tx.insert(real_time_update).await?;

            Ok((persisted_row, changed))
        })
        .await?;

    if !changed.is_empty() {
        let feed = feed_codec::encode_feed(&changed, FeedIncrementality::Differential, now.timestamp().max(0) as u64);
        publisher.publish(feed).await.map_err(HandleError::Publish)?;
    }

    Ok(persisted_row)
}

/// Resolves the batch's vehicle journeys (cached first, then the timetable
/// service) and hands the result to [`handle`]. This is the entry point
/// both `broker-worker` and `ingest-web` drive: every connector's job ends
/// at producing [`ParsedTripUpdate`]s, everything past that is shared.
///
/// `new_is_complete` is a property of the whole batch: broker-style feeds
/// carry each trip's full stop sequence, vendor/HTTP feeds are incremental.
pub async fn ingest<S: Store>(
    store: &S,
    publisher: &dyn Publisher,
    timetable: &dyn TimetableClient,
    real_time_update: RealTimeUpdate,
    parsed: Vec<ParsedTripUpdate>,
    new_is_complete: bool,
    now: DateTime<Utc>,
) -> HandleResult<WithId<RealTimeUpdate>> {
    let mut auto = store.auto();
    let mut incoming = Vec::with_capacity(parsed.len());

    for update in parsed {
        let (vehicle_journey_id, trip_update) = update.into_trip_update();

        let vehicle_journey = match VehicleJourneyRepo::get(&mut auto, &vehicle_journey_id).await? {
            Some(vehicle_journey) => vehicle_journey,
            None => {
                let lower_bound = vehicle_journey_id.start_timestamp - Duration::days(1);
                let upper_bound = vehicle_journey_id.start_timestamp + Duration::days(1);
                match timetable
                    .resolve_vehicle_journey(&vehicle_journey_id.base_trip_id, lower_bound, upper_bound)
                    .await
                {
                    Ok(vehicle_journey) => vehicle_journey,
                    // An "added" trip has no base-timetable counterpart by
                    // definition, so a miss here is expected, not an error.
                    // Every other status with no resolvable target is the
                    // "unknown target" case (spec open question, resolved
                    // uniformly across ingestion paths): the caller marks
                    // the real-time-update row KO rather than inventing a
                    // vehicle journey for a trip that was never added.
                    Err(TimetableError::NotFound) if trip_update.status == TripStatus::Add => {
                        VehicleJourney::added(vehicle_journey_id.base_trip_id.clone(), vehicle_journey_id.start_timestamp)
                    }
                    Err(why) => return Err(HandleError::Timetable(why)),
                }
            }
        };

        incoming.push(IncomingTrip { vehicle_journey, trip_update });
    }

    handle(store, publisher, real_time_update, incoming, new_is_complete, now).await
}

/// Top-level ingestion entry point for every connector (broker worker and
/// the HTTP endpoint alike): records a KO real-time-update row on invalid
/// input or an unresolvable target, otherwise delegates to [`ingest`]. A
/// publish failure is NOT recorded as KO here — by the time `ingest` can
/// fail on publish the batch already committed with status OK, per the
/// error taxonomy distinguishing "invalid input"/"unknown target" (both
/// KO) from "transient publish failure" (already persisted, reported to
/// the caller as-is).
pub async fn ingest_and_record<S: Store>(
    store: &S,
    publisher: &dyn Publisher,
    timetable: &dyn TimetableClient,
    connector_type: String,
    contributor_id: String,
    raw_payload: Vec<u8>,
    parsed: Result<Vec<ParsedTripUpdate>, String>,
    new_is_complete: bool,
    now: DateTime<Utc>,
) -> HandleResult<WithId<RealTimeUpdate>> {
    let parsed = match parsed {
        Ok(parsed) => parsed,
        Err(parse_error) => {
            return record_ko(store, &connector_type, &contributor_id, &raw_payload, parse_error, now).await;
        }
    };

    let real_time_update = RealTimeUpdate::new_pending(connector_type.clone(), contributor_id.clone(), raw_payload.clone(), now);

    match ingest(store, publisher, timetable, real_time_update, parsed, new_is_complete, now).await {
        Ok(row) => Ok(row),
        Err(HandleError::Publish(why)) => Err(HandleError::Publish(why)),
        Err(HandleError::Storage(why)) => {
            record_ko(store, &connector_type, &contributor_id, &raw_payload, format!("storage error: {why:?}"), now).await
        }
        Err(HandleError::Timetable(why)) => {
            record_ko(store, &connector_type, &contributor_id, &raw_payload, format!("unresolvable target: {why:?}"), now).await
        }
    }
}

/// At-most-one KO row per (contributor, payload, error) triple: a repeat of
/// the same logical failure pokes `updated_at` on the existing row rather
/// than inserting a duplicate.
async fn record_ko<S: Store>(
    store: &S,
    connector_type: &str,
    contributor_id: &str,
    raw_payload: &[u8],
    error: String,
    now: DateTime<Utc>,
) -> HandleResult<WithId<RealTimeUpdate>> {
    let mut auto = store.auto();
    let mut row = RealTimeUpdate::new_pending(connector_type.to_owned(), contributor_id.to_owned(), raw_payload.to_vec(), now);
    row.mark_ko(error.clone(), now);

    if let Some(id) = auto.find_existing_ko(contributor_id, raw_payload, &error).await? {
        auto.update(id, row.clone()).await?;
        return Ok(WithId::new(Id::new(id), row));
    }

    let inserted = auto.insert(row).await?;
    Ok(inserted)
}

#[cfg(test)]
mod tests;
