//! Integration tests for the handler pipeline against a hand-rolled
//! in-memory [`Store`], exercising the reactivation (S3), idempotence (P4)
//! and publish-failure scenarios from the external interfaces.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use model::contributor::Contributor;
use model::real_time_update::RealTimeUpdate;
use model::trip_update::{StopEventStatus, StopTimeUpdate, TripStatus, TripUpdate};
use model::vehicle_journey::{BaseStopTime, VehicleJourney, VehicleJourneyId};
use model::WithId;
use transit_core::database::{ContributorRepo, RealTimeUpdateRepo, StoreAutocommit, StoreOperations, StoreTransaction, TripUpdateRepo, VehicleJourneyRepo};
use transit_core::parsed_update::ParsedTripUpdate;
use transit_core::{MessageNotPublished, Publisher, Store, StoreResult, TimetableClient, TimetableError, TimetableResult};
use uuid::Uuid;

use crate::{handle, ingest_and_record, IncomingTrip};

#[derive(Default)]
struct Inner {
    vehicle_journeys: HashMap<VehicleJourneyId, VehicleJourney>,
    trip_updates: HashMap<VehicleJourneyId, TripUpdate>,
    real_time_updates: HashMap<Uuid, RealTimeUpdate>,
    contributors: HashMap<String, Contributor>,
}

#[derive(Clone, Default)]
struct MemoryStore(Arc<Mutex<Inner>>);

struct MemoryTransaction(Arc<Mutex<Inner>>);

#[async_trait]
impl VehicleJourneyRepo for MemoryTransaction {
    async fn get(&mut self, id: &VehicleJourneyId) -> StoreResult<Option<VehicleJourney>> {
        Ok(self.0.lock().unwrap().vehicle_journeys.get(id).cloned())
    }

    async fn put(&mut self, vehicle_journey: VehicleJourney) -> StoreResult<VehicleJourney> {
        let mut inner = self.0.lock().unwrap();
        inner.vehicle_journeys.insert(vehicle_journey.id(), vehicle_journey.clone());
        Ok(vehicle_journey)
    }
}

#[async_trait]
impl TripUpdateRepo for MemoryTransaction {
    async fn get_batch(&mut self, ids: &[VehicleJourneyId]) -> StoreResult<HashMap<VehicleJourneyId, TripUpdate>> {
        let inner = self.0.lock().unwrap();
        Ok(ids.iter().filter_map(|id| inner.trip_updates.get(id).map(|trip| (id.clone(), trip.clone()))).collect())
    }

    async fn put_many(&mut self, updates: Vec<TripUpdate>) -> StoreResult<()> {
        let mut inner = self.0.lock().unwrap();
        for update in updates {
            inner.trip_updates.insert(update.vehicle_journey_id.clone(), update);
        }
        Ok(())
    }

    async fn purge_older_than(&mut self, _contributor_id: &str, _cutoff: DateTime<Utc>) -> StoreResult<u64> {
        Ok(0)
    }
}

#[async_trait]
impl RealTimeUpdateRepo for MemoryTransaction {
    async fn insert(&mut self, update: RealTimeUpdate) -> StoreResult<WithId<RealTimeUpdate>> {
        let mut inner = self.0.lock().unwrap();
        let id = Uuid::from_u128(inner.real_time_updates.len() as u128 + 1);
        inner.real_time_updates.insert(id, update.clone());
        Ok(WithId::new(utility::id::Id::new(id), update))
    }

    async fn update(&mut self, id: Uuid, update: RealTimeUpdate) -> StoreResult<()> {
        self.0.lock().unwrap().real_time_updates.insert(id, update);
        Ok(())
    }

    async fn find_existing_ko(&mut self, _contributor_id: &str, _payload: &[u8], _error: &str) -> StoreResult<Option<Uuid>> {
        Ok(None)
    }

    async fn purge_older_than(&mut self, _contributor_id: &str, _cutoff: DateTime<Utc>) -> StoreResult<u64> {
        Ok(0)
    }
}

#[async_trait]
impl ContributorRepo for MemoryTransaction {
    async fn get(&mut self, id: &str) -> StoreResult<Option<Contributor>> {
        Ok(self.0.lock().unwrap().contributors.get(id).cloned())
    }

    async fn list_active_by_connector_type(&mut self, connector_type: &str) -> StoreResult<Vec<(String, Contributor)>> {
        let inner = self.0.lock().unwrap();
        Ok(inner
            .contributors
            .iter()
            .filter(|(_, contributor)| contributor.is_active && contributor.connector_type == connector_type)
            .map(|(id, contributor)| (id.clone(), contributor.clone()))
            .collect())
    }

    async fn list_active(&mut self) -> StoreResult<Vec<(String, Contributor)>> {
        let inner = self.0.lock().unwrap();
        Ok(inner
            .contributors
            .iter()
            .filter(|(_, contributor)| contributor.is_active)
            .map(|(id, contributor)| (id.clone(), contributor.clone()))
            .collect())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(self) -> StoreResult<()> {
        Ok(())
    }
}

impl StoreAutocommit for MemoryTransaction {}

#[async_trait]
impl Store for MemoryStore {
    type Transaction = MemoryTransaction;
    type Autocommit = MemoryTransaction;

    const BULK_INSERT_MAX: usize = 1000;

    async fn transaction(&self) -> StoreResult<Self::Transaction> {
        Ok(MemoryTransaction(Arc::clone(&self.0)))
    }

    fn auto(&self) -> Self::Autocommit {
        MemoryTransaction(Arc::clone(&self.0))
    }

    async fn perform_transaction<'s, T, F, Fut>(&'s self, action: F) -> StoreResult<T>
    where
        T: Send,
        F: Send + FnOnce(&'s mut Self::Transaction) -> Fut + Send,
        Fut: std::future::Future<Output = StoreResult<T>> + Send + 's,
    {
        let mut tx = self.transaction().await?;
        let result = action(&mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }
}

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<Vec<u8>>>,
    fail: bool,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, feed: Vec<u8>) -> Result<(), MessageNotPublished> {
        if self.fail {
            return Err(MessageNotPublished(Box::new(StoreErrorLike)));
        }
        self.published.lock().unwrap().push(feed);
        Ok(())
    }
}

#[derive(Debug)]
struct StoreErrorLike;
impl std::fmt::Display for StoreErrorLike {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "publish transport failure")
    }
}
impl std::error::Error for StoreErrorLike {}

fn now() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(7, 0, 0).unwrap().and_utc()
}

fn three_stop_journey() -> VehicleJourney {
    let lower_bound = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let upper_bound = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
    VehicleJourney::from_base_schedule(
        "trip-1".to_owned(),
        vec![
            BaseStopTime::synthesized("a".to_owned(), Some(chrono::Duration::hours(8) + chrono::Duration::minutes(10)), Some(chrono::Duration::hours(8) + chrono::Duration::minutes(10))),
            BaseStopTime::synthesized("b".to_owned(), Some(chrono::Duration::hours(9) + chrono::Duration::minutes(5)), Some(chrono::Duration::hours(9) + chrono::Duration::minutes(10))),
            BaseStopTime::synthesized("c".to_owned(), Some(chrono::Duration::hours(10) + chrono::Duration::minutes(5)), Some(chrono::Duration::hours(10) + chrono::Duration::minutes(5))),
        ],
        lower_bound,
        upper_bound,
    )
    .unwrap()
}

fn journey_with_trip_id(base_trip_id: &str) -> VehicleJourney {
    let lower_bound = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let upper_bound = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
    VehicleJourney::from_base_schedule(
        base_trip_id.to_owned(),
        vec![
            BaseStopTime::synthesized("a".to_owned(), Some(chrono::Duration::hours(8) + chrono::Duration::minutes(10)), Some(chrono::Duration::hours(8) + chrono::Duration::minutes(10))),
            BaseStopTime::synthesized("b".to_owned(), Some(chrono::Duration::hours(9) + chrono::Duration::minutes(5)), Some(chrono::Duration::hours(9) + chrono::Duration::minutes(10))),
            BaseStopTime::synthesized("c".to_owned(), Some(chrono::Duration::hours(10) + chrono::Duration::minutes(5)), Some(chrono::Duration::hours(10) + chrono::Duration::minutes(5))),
        ],
        lower_bound,
        upper_bound,
    )
    .unwrap()
}

/// Base has a first stop D just before midnight and a later stop E just
/// after it on the following calendar day, matching the past-midnight
/// circulation described by P6.
fn midnight_crossing_journey() -> VehicleJourney {
    let lower_bound = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let upper_bound = NaiveDate::from_ymd_opt(2026, 1, 3).unwrap().and_hms_opt(0, 0, 0).unwrap();
    VehicleJourney::from_base_schedule(
        "trip-midnight".to_owned(),
        vec![
            BaseStopTime::synthesized("d".to_owned(), Some(chrono::Duration::hours(22) + chrono::Duration::minutes(9)), Some(chrono::Duration::hours(22) + chrono::Duration::minutes(10))),
            BaseStopTime::synthesized("e".to_owned(), Some(chrono::Duration::hours(26) + chrono::Duration::minutes(15)), Some(chrono::Duration::hours(26) + chrono::Duration::minutes(15))),
        ],
        lower_bound,
        upper_bound,
    )
    .unwrap()
}

/// Base has D(23:44/23:45, day N) and E(00:34/00:35, day N+1): the detour
/// insertion point for S4 sits between them, past midnight.
fn detour_journey() -> VehicleJourney {
    let lower_bound = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let upper_bound = NaiveDate::from_ymd_opt(2026, 1, 3).unwrap().and_hms_opt(0, 0, 0).unwrap();
    VehicleJourney::from_base_schedule(
        "trip-detour".to_owned(),
        vec![
            BaseStopTime::synthesized("d".to_owned(), Some(chrono::Duration::hours(23) + chrono::Duration::minutes(44)), Some(chrono::Duration::hours(23) + chrono::Duration::minutes(45))),
            BaseStopTime::synthesized("e".to_owned(), Some(chrono::Duration::hours(24) + chrono::Duration::minutes(34)), Some(chrono::Duration::hours(24) + chrono::Duration::minutes(35))),
        ],
        lower_bound,
        upper_bound,
    )
    .unwrap()
}

fn incoming_delay_update(vj: &VehicleJourney) -> TripUpdate {
    let mut trip = TripUpdate::new(vj.id(), "piv".to_owned());
    trip.status = TripStatus::Update;
    trip.stop_time_updates = vec![model::trip_update::StopTimeUpdate {
        order: 1,
        stop_id: "b".to_owned(),
        arrival_time: None,
        arrival_delay: chrono::Duration::minutes(10),
        arrival_status: model::trip_update::StopEventStatus::Update,
        departure_time: None,
        departure_delay: chrono::Duration::minutes(10),
        departure_status: model::trip_update::StopEventStatus::Update,
        message: None,
    }];
    trip
}

#[tokio::test]
async fn handle_persists_merged_trip_and_publishes_feed() {
    let store = MemoryStore::default();
    let publisher = RecordingPublisher::default();
    let vj = three_stop_journey();
    let real_time_update = RealTimeUpdate::new_pending("piv".to_owned(), "piv".to_owned(), b"{}".to_vec(), now());

    let result = handle(
        &store,
        &publisher,
        real_time_update,
        vec![IncomingTrip {
            vehicle_journey: vj.clone(),
            trip_update: incoming_delay_update(&vj),
        }],
        false,
        now(),
    )
    .await
    .unwrap();

    assert_eq!(result.content.trip_update_ids.len(), 1);
    assert_eq!(publisher.published.lock().unwrap().len(), 1);

    let persisted = store.0.lock().unwrap().trip_updates.get(&vj.id()).cloned().unwrap();
    assert_eq!(persisted.stop_time_updates.len(), 3);
    assert_eq!(persisted.stop_time_updates[1].arrival_delay, chrono::Duration::minutes(10));
}

#[tokio::test]
async fn resending_the_same_complete_feed_is_idempotent() {
    let store = MemoryStore::default();
    let publisher = RecordingPublisher::default();
    let vj = three_stop_journey();

    for _ in 0..2 {
        let real_time_update = RealTimeUpdate::new_pending("piv".to_owned(), "piv".to_owned(), b"{}".to_vec(), now());
        handle(
            &store,
            &publisher,
            real_time_update,
            vec![IncomingTrip {
                vehicle_journey: vj.clone(),
                trip_update: incoming_delay_update(&vj),
            }],
            false,
            now(),
        )
        .await
        .unwrap();
    }

    // The second handle observes no field-level change, so the merge
    // engine returns `None` and nothing new is published.
    assert_eq!(publisher.published.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn publish_failure_surfaces_as_handle_error() {
    let store = MemoryStore::default();
    let publisher = RecordingPublisher { fail: true, ..Default::default() };
    let vj = three_stop_journey();
    let real_time_update = RealTimeUpdate::new_pending("piv".to_owned(), "piv".to_owned(), b"{}".to_vec(), now());

    let result = handle(
        &store,
        &publisher,
        real_time_update,
        vec![IncomingTrip {
            vehicle_journey: vj.clone(),
            trip_update: incoming_delay_update(&vj),
        }],
        false,
        now(),
    )
    .await;

    assert!(matches!(result, Err(crate::HandleError::Publish(_))));
    // The merge+adjust+persist steps already committed before publish ran.
    let persisted = store.0.lock().unwrap().trip_updates.contains_key(&vj.id());
    assert!(persisted);
}

/// A fake timetable client that resolves exactly one pre-registered trip
/// and reports every other lookup as unresolvable.
struct FakeTimetable {
    known: Option<VehicleJourney>,
}

#[async_trait]
impl TimetableClient for FakeTimetable {
    async fn resolve_vehicle_journey(
        &self,
        base_trip_id: &str,
        _lower_bound: chrono::NaiveDateTime,
        _upper_bound: chrono::NaiveDateTime,
    ) -> TimetableResult<VehicleJourney> {
        match &self.known {
            Some(vj) if vj.base_trip_id == base_trip_id => Ok(vj.clone()),
            _ => Err(TimetableError::NotFound),
        }
    }
}

fn parsed_delay_update(vj: &VehicleJourney) -> ParsedTripUpdate {
    ParsedTripUpdate {
        base_trip_id: vj.base_trip_id.clone(),
        start_timestamp: vj.start_timestamp,
        contributor_id: "piv".to_owned(),
        status: TripStatus::Update,
        effect: model::effect::Effect::SignificantDelays,
        message: None,
        company_id: None,
        physical_mode_id: None,
        headsign: None,
        stop_time_updates: incoming_delay_update(vj).stop_time_updates,
    }
}

#[tokio::test]
async fn ingest_resolves_vehicle_journey_from_timetable_when_uncached() {
    let store = MemoryStore::default();
    let publisher = RecordingPublisher::default();
    let vj = three_stop_journey();
    let timetable = FakeTimetable { known: Some(vj.clone()) };

    let result = ingest_and_record(
        &store,
        &publisher,
        &timetable,
        "piv".to_owned(),
        "piv".to_owned(),
        b"{}".to_vec(),
        Ok(vec![parsed_delay_update(&vj)]),
        false,
        now(),
    )
    .await
    .unwrap();

    assert_eq!(result.content.trip_update_ids.len(), 1);
    assert_eq!(publisher.published.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn ingest_records_ko_for_unresolvable_target() {
    let store = MemoryStore::default();
    let publisher = RecordingPublisher::default();
    let vj = three_stop_journey();
    let timetable = FakeTimetable { known: None };

    let result = ingest_and_record(
        &store,
        &publisher,
        &timetable,
        "piv".to_owned(),
        "piv".to_owned(),
        b"{}".to_vec(),
        Ok(vec![parsed_delay_update(&vj)]),
        false,
        now(),
    )
    .await
    .unwrap();

    assert_eq!(result.content.status, model::real_time_update::ProcessingStatus::Ko);
    assert!(result.content.trip_update_ids.is_empty());
}

#[tokio::test]
async fn ingest_records_ko_for_invalid_payload() {
    let store = MemoryStore::default();
    let publisher = RecordingPublisher::default();
    let timetable = FakeTimetable { known: None };

    let result = ingest_and_record(
        &store,
        &publisher,
        &timetable,
        "piv".to_owned(),
        "piv".to_owned(),
        b"not json".to_vec(),
        Err("malformed JSON body".to_owned()),
        false,
        now(),
    )
    .await
    .unwrap();

    assert_eq!(result.content.error.as_deref(), Some("malformed JSON body"));
    assert_eq!(result.content.status, model::real_time_update::ProcessingStatus::Ko);
}

/// P1 (order density) and P2/P3 (monotonicity) as end-to-end properties of
/// a handled trip update, not just of the adjuster's unit-level mechanics.
#[tokio::test]
async fn handled_trip_satisfies_order_density_and_monotonicity() {
    let store = MemoryStore::default();
    let publisher = RecordingPublisher::default();
    let vj = three_stop_journey();
    let real_time_update = RealTimeUpdate::new_pending("piv".to_owned(), "piv".to_owned(), b"{}".to_vec(), now());

    handle(
        &store,
        &publisher,
        real_time_update,
        vec![IncomingTrip {
            vehicle_journey: vj.clone(),
            trip_update: incoming_delay_update(&vj),
        }],
        false,
        now(),
    )
    .await
    .unwrap();

    let persisted = store.0.lock().unwrap().trip_updates.get(&vj.id()).cloned().unwrap();
    assert!(persisted.check_order_density());

    for stop in &persisted.stop_time_updates {
        let (arrival, departure) = (stop.arrival_time.unwrap(), stop.departure_time.unwrap());
        assert!(arrival <= departure, "stop {} violates intra-stop monotonicity", stop.stop_id);
    }

    for pair in persisted.stop_time_updates.windows(2) {
        let departure = pair[0].departure_time.unwrap();
        let next_arrival = pair[1].arrival_time.unwrap();
        assert!(departure <= next_arrival, "stops {}/{} violate inter-stop monotonicity", pair[0].stop_id, pair[1].stop_id);
    }
}

/// P6 (past-midnight): a trip whose first stop sits just before midnight
/// and whose next stop sits just after it rolls the circulation date
/// forward, and the delay applied to the later stop survives the rollover.
#[tokio::test]
async fn past_midnight_circulation_preserves_delay_across_the_day_boundary() {
    let store = MemoryStore::default();
    let publisher = RecordingPublisher::default();
    let vj = midnight_crossing_journey();
    let real_time_update = RealTimeUpdate::new_pending("piv".to_owned(), "piv".to_owned(), b"{}".to_vec(), now());

    let mut trip = TripUpdate::new(vj.id(), "piv".to_owned());
    trip.status = TripStatus::Update;
    trip.stop_time_updates = vec![StopTimeUpdate {
        order: 1,
        stop_id: "e".to_owned(),
        arrival_time: None,
        arrival_delay: chrono::Duration::minutes(20),
        arrival_status: StopEventStatus::Update,
        departure_time: None,
        departure_delay: chrono::Duration::minutes(20),
        departure_status: StopEventStatus::Update,
        message: None,
    }];

    handle(&store, &publisher, real_time_update, vec![IncomingTrip { vehicle_journey: vj.clone(), trip_update: trip }], false, now())
        .await
        .unwrap();

    let persisted = store.0.lock().unwrap().trip_updates.get(&vj.id()).cloned().unwrap();
    let first = &persisted.stop_time_updates[0];
    let second = &persisted.stop_time_updates[1];

    assert_ne!(first.arrival_time.unwrap().date_naive(), second.arrival_time.unwrap().date_naive());
    assert_eq!(second.arrival_delay, chrono::Duration::minutes(20));
    assert_eq!(second.departure_delay, chrono::Duration::minutes(20));
}

/// S4 (past-midnight circulation + detour): a detour insertion between two
/// base stops spanning midnight skips the first stop's departure, adds the
/// detour stop past midnight, and leaves the following stop untouched.
#[tokio::test]
async fn detour_across_midnight_inserts_stop_and_skips_departure() {
    let store = MemoryStore::default();
    let publisher = RecordingPublisher::default();
    let vj = detour_journey();
    let real_time_update = RealTimeUpdate::new_pending("piv".to_owned(), "piv".to_owned(), b"{}".to_vec(), now());

    let day_after = vj.start_timestamp.date() + chrono::Duration::days(1);
    let detour_time = day_after.and_hms_opt(0, 15, 0).unwrap().and_utc();

    let mut trip = TripUpdate::new(vj.id(), "piv".to_owned());
    trip.status = TripStatus::Update;
    trip.effect = model::effect::Effect::Detour;
    trip.stop_time_updates = vec![
        StopTimeUpdate {
            order: 0,
            stop_id: "d".to_owned(),
            arrival_time: None,
            arrival_delay: chrono::Duration::zero(),
            arrival_status: StopEventStatus::None,
            departure_time: None,
            departure_delay: chrono::Duration::zero(),
            departure_status: StopEventStatus::DeletedForDetour,
            message: None,
        },
        StopTimeUpdate {
            order: 1,
            stop_id: "x".to_owned(),
            arrival_time: Some(detour_time),
            arrival_delay: chrono::Duration::zero(),
            arrival_status: StopEventStatus::AddedForDetour,
            departure_time: Some(detour_time),
            departure_delay: chrono::Duration::zero(),
            departure_status: StopEventStatus::AddedForDetour,
            message: None,
        },
        StopTimeUpdate {
            order: 2,
            stop_id: "e".to_owned(),
            arrival_time: None,
            arrival_delay: chrono::Duration::zero(),
            arrival_status: StopEventStatus::None,
            departure_time: None,
            departure_delay: chrono::Duration::zero(),
            departure_status: StopEventStatus::None,
            message: None,
        },
    ];

    let result = handle(&store, &publisher, real_time_update, vec![IncomingTrip { vehicle_journey: vj.clone(), trip_update: trip }], true, now())
        .await
        .unwrap();

    assert_eq!(result.content.trip_update_ids.len(), 1);

    let persisted = store.0.lock().unwrap().trip_updates.get(&vj.id()).cloned().unwrap();
    assert!(persisted.check_order_density());
    assert_eq!(persisted.effect, model::effect::Effect::Detour);
    assert_eq!(persisted.stop_time_updates.len(), 3);

    let (d, x, e) = (&persisted.stop_time_updates[0], &persisted.stop_time_updates[1], &persisted.stop_time_updates[2]);

    assert_eq!(d.departure_status, StopEventStatus::DeletedForDetour);
    assert_eq!(d.departure_time, d.arrival_time);

    assert_eq!(x.arrival_status, StopEventStatus::AddedForDetour);
    assert_eq!(x.departure_status, StopEventStatus::AddedForDetour);
    assert_eq!(x.arrival_time, Some(detour_time));

    assert_eq!(e.arrival_status, StopEventStatus::None);
    assert_ne!(d.arrival_time.unwrap().date_naive(), e.arrival_time.unwrap().date_naive());

    for pair in persisted.stop_time_updates.windows(2) {
        let departure = pair[0].departure_time.unwrap();
        let next_arrival = pair[1].arrival_time.unwrap();
        assert!(departure <= next_arrival, "stops {}/{} violate inter-stop monotonicity", pair[0].stop_id, pair[1].stop_id);
    }
}

/// S5 (message-only-change idempotence): in a batch of two trips, resending
/// one unchanged and one with only its message field changed commits
/// exactly the one that actually changed.
#[tokio::test]
async fn message_only_change_commits_only_the_changed_trip() {
    let store = MemoryStore::default();
    let publisher = RecordingPublisher::default();
    let vj_a = journey_with_trip_id("trip-a");
    let vj_b = journey_with_trip_id("trip-b");

    for vj in [&vj_a, &vj_b] {
        let real_time_update = RealTimeUpdate::new_pending("piv".to_owned(), "piv".to_owned(), b"{}".to_vec(), now());
        handle(
            &store,
            &publisher,
            real_time_update,
            vec![IncomingTrip {
                vehicle_journey: vj.clone(),
                trip_update: incoming_delay_update(vj),
            }],
            false,
            now(),
        )
        .await
        .unwrap();
    }

    let mut unchanged_b = incoming_delay_update(&vj_b);
    unchanged_b.message = None;
    let mut changed_a = incoming_delay_update(&vj_a);
    changed_a.message = Some("delayed due to signal failure".to_owned());

    let real_time_update = RealTimeUpdate::new_pending("piv".to_owned(), "piv".to_owned(), b"{}".to_vec(), now());
    let result = handle(
        &store,
        &publisher,
        real_time_update,
        vec![
            IncomingTrip { vehicle_journey: vj_a.clone(), trip_update: changed_a },
            IncomingTrip { vehicle_journey: vj_b.clone(), trip_update: unchanged_b },
        ],
        false,
        now(),
    )
    .await
    .unwrap();

    assert_eq!(result.content.trip_update_ids, vec![vj_a.id()]);

    let persisted_a = store.0.lock().unwrap().trip_updates.get(&vj_a.id()).cloned().unwrap();
    assert_eq!(persisted_a.message.as_deref(), Some("delayed due to signal failure"));
}
