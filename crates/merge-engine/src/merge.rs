use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use model::trip_update::{StopEventStatus, StopTimeUpdate, TripStatus, TripUpdate};
use model::vehicle_journey::VehicleJourney;

/// Combines a base timetable vehicle journey, an optional persisted trip
/// update and an incoming trip update into the new authoritative trip
/// state, or `None` when the incoming update introduces no observable
/// change — the caller then skips persistence and publication entirely.
///
/// `new_is_complete` declares whether `new` carries the full stop
/// sequence (broker-style feeds) rather than an incremental one (vendor
/// feeds), which decides whether the stop driver sequence is `new`'s own
/// stops or the base timetable's.
pub fn merge_trip_update(
    vehicle_journey: &VehicleJourney,
    old: Option<TripUpdate>,
    new: TripUpdate,
    new_is_complete: bool,
) -> Option<TripUpdate> {
    let old_snapshot = old.clone();
    let mut result = old.unwrap_or_else(|| new.clone());
    let mut has_changes = old_snapshot.is_none();

    mark_and_set(&mut has_changes, &mut result.status, new.status);
    mark_and_set(&mut has_changes, &mut result.contributor_id, new.contributor_id.clone());
    mark_and_set(&mut has_changes, &mut result.effect, new.effect);
    mark_and_set(&mut has_changes, &mut result.company_id, new.company_id.clone());
    mark_and_set(&mut has_changes, &mut result.physical_mode_id, new.physical_mode_id.clone());
    mark_and_set(&mut has_changes, &mut result.headsign, new.headsign.clone());

    if new.message.is_some() || new_is_complete {
        mark_and_set(&mut has_changes, &mut result.message, new.message.clone());
    }

    if result.status == TripStatus::Delete {
        if !result.stop_time_updates.is_empty() {
            has_changes = true;
        }
        result.stop_time_updates.clear();
        return if has_changes { Some(result) } else { None };
    }

    let mut built_stops = Vec::new();
    let mut circulation_date = vehicle_journey.start_timestamp.date();
    let mut last_base_departure_tod: Option<Duration> = None;
    let mut last_adjusted_departure: Option<DateTime<Utc>> = None;

    if new_is_complete {
        for (index, entry) in new.stop_time_updates.iter().enumerate() {
            let order = index as i32;
            let (base_arrival, base_departure) = match vehicle_journey.find_base_stop(&entry.stop_id) {
                Some(base) => compute_base_datetimes(
                    &mut circulation_date,
                    &mut last_base_departure_tod,
                    base.arrival_time,
                    base.departure_time,
                ),
                None => (None, None),
            };
            let db_st = old_snapshot
                .as_ref()
                .and_then(|trip| trip.find_stop(&entry.stop_id, Some(order)));

            let candidate = build_candidate(order, &entry.stop_id, entry, base_arrival, base_departure, last_adjusted_departure);
            let decided = match db_st {
                Some(db) if candidate.is_equal(db) => {
                    let mut kept = db.clone();
                    kept.order = order;
                    kept
                }
                _ => {
                    has_changes = true;
                    candidate
                }
            };

            last_adjusted_departure = advance_reference(&decided, last_adjusted_departure);
            built_stops.push(decided);
        }
    } else {
        for (index, base) in vehicle_journey.stops.iter().enumerate() {
            let order = index as i32;
            let (base_arrival, base_departure) =
                compute_base_datetimes(&mut circulation_date, &mut last_base_departure_tod, base.arrival_time, base.departure_time);

            let new_st = new.find_stop(&base.stop_id, Some(order));
            let db_st = old_snapshot.as_ref().and_then(|trip| trip.find_stop(&base.stop_id, Some(order)));

            let decided = match (db_st, new_st) {
                (Some(db), Some(new_entry)) => {
                    let candidate = build_candidate(order, &base.stop_id, new_entry, base_arrival, base_departure, last_adjusted_departure);
                    if candidate.is_equal(db) {
                        let mut kept = db.clone();
                        kept.order = order;
                        kept
                    } else {
                        has_changes = true;
                        candidate
                    }
                }
                (None, Some(new_entry)) => {
                    has_changes = true;
                    build_candidate(order, &base.stop_id, new_entry, base_arrival, base_departure, last_adjusted_departure)
                }
                (Some(db), None) => {
                    let mut kept = db.clone();
                    kept.order = order;
                    kept
                }
                (None, None) => {
                    has_changes = true;
                    fresh_base_only_stop(order, &base.stop_id, base_arrival, base_departure)
                }
            };

            last_adjusted_departure = advance_reference(&decided, last_adjusted_departure);
            built_stops.push(decided);
        }
    }

    result.stop_time_updates = built_stops;

    if has_changes {
        Some(result)
    } else {
        None
    }
}

fn mark_and_set<T: PartialEq>(has_changes: &mut bool, slot: &mut T, value: T) {
    if *slot != value {
        *has_changes = true;
    }
    *slot = value;
}

/// Builds a candidate adjusted stop from an incoming stop-time entry and the
/// base timetable's arrival/departure, then runs it through the same
/// intra/inter-stop monotonicity rules as the consistency adjuster, using
/// the tracked last adjusted departure rather than the previous raw base.
fn build_candidate(
    order: i32,
    stop_id: &str,
    input: &StopTimeUpdate,
    base_arrival: Option<DateTime<Utc>>,
    base_departure: Option<DateTime<Utc>>,
    last_departure: Option<DateTime<Utc>>,
) -> StopTimeUpdate {
    let (mut arrival_time, mut arrival_delay) =
        resolve_stop_event(base_arrival, input.arrival_status, input.arrival_time, input.arrival_delay);
    let (mut departure_time, mut departure_delay) =
        resolve_stop_event(base_departure, input.departure_status, input.departure_time, input.departure_delay);

    if let (Some(last_dep), Some(arrival)) = (last_departure, arrival_time) {
        if last_dep > arrival {
            let shift = last_dep - arrival;
            arrival_time = Some(arrival + shift);
            arrival_delay += shift;
        }
    }

    if let (Some(arrival), Some(departure)) = (arrival_time, departure_time) {
        if arrival > departure {
            let shift = arrival - departure;
            departure_time = Some(departure + shift);
            departure_delay += shift;
        }
    }

    StopTimeUpdate {
        order,
        stop_id: stop_id.to_owned(),
        arrival_time,
        arrival_delay,
        arrival_status: input.arrival_status,
        departure_time,
        departure_delay,
        departure_status: input.departure_status,
        message: input.message.clone(),
    }
}

/// Maps one stop event's status onto (new_time, delay), the per-status table
/// from the specification's merge engine section.
fn resolve_stop_event(
    base_time: Option<DateTime<Utc>>,
    status: StopEventStatus,
    incoming_time: Option<DateTime<Utc>>,
    incoming_delay: Duration,
) -> (Option<DateTime<Utc>>, Duration) {
    match status {
        StopEventStatus::Update => match base_time {
            Some(base) => (Some(base + incoming_delay), incoming_delay),
            None => (None, incoming_delay),
        },
        StopEventStatus::Delete | StopEventStatus::DeletedForDetour => (None, Duration::zero()),
        StopEventStatus::Add | StopEventStatus::AddedForDetour => (incoming_time, Duration::zero()),
        StopEventStatus::None => (base_time, Duration::zero()),
    }
}

fn fresh_base_only_stop(order: i32, stop_id: &str, base_arrival: Option<DateTime<Utc>>, base_departure: Option<DateTime<Utc>>) -> StopTimeUpdate {
    StopTimeUpdate {
        order,
        stop_id: stop_id.to_owned(),
        arrival_time: base_arrival,
        arrival_delay: Duration::zero(),
        arrival_status: StopEventStatus::None,
        departure_time: base_departure,
        departure_delay: Duration::zero(),
        departure_status: StopEventStatus::None,
        message: None,
    }
}

/// A stop whose arrival is deleted/deleted-for-detour does not advance the
/// monotonicity reference used by subsequent stops.
fn advance_reference(stop: &StopTimeUpdate, previous: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    if stop.arrival_status.is_deleted() {
        previous
    } else {
        stop.departure_time.or(previous)
    }
}

/// Composes base arrival/departure datetimes from time-of-day offsets,
/// advancing `circulation_date` past midnight using the rolling reference
/// described in the specification: once when the previous base departure
/// exceeds the current base arrival, and again between this stop's own
/// arrival and departure.
fn compute_base_datetimes(
    circulation_date: &mut NaiveDate,
    last_base_departure_tod: &mut Option<Duration>,
    arrival_tod: Option<Duration>,
    departure_tod: Option<Duration>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    if let (Some(previous_departure), Some(arrival)) = (*last_base_departure_tod, arrival_tod) {
        if previous_departure > arrival {
            *circulation_date += Duration::days(1);
        }
    }
    let arrival_dt = arrival_tod.map(|tod| to_datetime(*circulation_date, tod));

    if let (Some(arrival), Some(departure)) = (arrival_tod, departure_tod) {
        if arrival > departure {
            *circulation_date += Duration::days(1);
        }
    }
    let departure_dt = departure_tod.map(|tod| to_datetime(*circulation_date, tod));

    if departure_tod.is_some() {
        *last_base_departure_tod = departure_tod;
    } else if arrival_tod.is_some() {
        *last_base_departure_tod = arrival_tod;
    }

    (arrival_dt, departure_dt)
}

fn to_datetime(date: NaiveDate, time_of_day: Duration) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(date.and_time(NaiveTime::MIN) + time_of_day))
}
