use model::trip_update::{StopTimeUpdate, TripUpdate};

/// Post-merge pass that fills in missing times, enforces monotonic
/// arrival/departure ordering per stop, and propagates delays forward
/// through a trip. Mutates `trip` in place and returns whether it stayed
/// consistent; a `false` result means the caller must reject this trip
/// update outright — no partial state is kept.
///
/// Rejection is local to one trip update: a caller processing a batch
/// should move on to the next trip update rather than aborting the batch.
pub fn adjust_consistency(trip: &mut TripUpdate) -> bool {
    let mut previous: Option<StopTimeUpdate> = None;

    for (index, stop) in trip.stop_time_updates.iter_mut().enumerate() {
        // 1. Order check.
        if stop.order as usize != index {
            log::warn!(
                "rejecting trip update for {:?}: stop at position {} carries order {}",
                trip.vehicle_journey_id,
                index,
                stop.order
            );
            return false;
        }

        // 2. Missing arrival: borrow from this stop's departure, then the
        // prior stop's departure, otherwise reject.
        if stop.arrival_time.is_none() {
            if let Some(departure) = stop.departure_time {
                stop.arrival_time = Some(departure);
                stop.arrival_delay = stop.departure_delay;
            } else if let Some(previous_departure) = previous.as_ref().and_then(|p| p.departure_time) {
                stop.arrival_time = Some(previous_departure);
                stop.arrival_delay = previous.as_ref().map(|p| p.departure_delay).unwrap_or_default();
            } else {
                log::warn!(
                    "rejecting trip update for {:?}: stop {} has no resolvable arrival",
                    trip.vehicle_journey_id,
                    stop.stop_id
                );
                return false;
            }
        }

        // 3. Missing departure: copy from arrival, delay copied symmetrically.
        if stop.departure_time.is_none() {
            stop.departure_time = stop.arrival_time;
            stop.departure_delay = stop.arrival_delay;
        }

        // 5. Inter-stop monotonicity.
        if let Some(previous) = &previous {
            if let (Some(previous_departure), Some(arrival)) = (previous.departure_time, stop.arrival_time) {
                if previous_departure > arrival {
                    let shift = previous_departure - arrival;
                    stop.arrival_time = Some(arrival + shift);
                    stop.arrival_delay += shift;
                }
            }
        }

        // 6. Intra-stop monotonicity.
        if let (Some(arrival), Some(departure)) = (stop.arrival_time, stop.departure_time) {
            if arrival > departure {
                let shift = arrival - departure;
                stop.departure_time = Some(departure + shift);
                stop.departure_delay += shift;
            }
        }

        // A deleted stop does not advance the monotonicity reference, the
        // same rule the merge engine applies while driving the stop sequence.
        if !stop.arrival_status.is_deleted() {
            previous = Some(stop.clone());
        }
    }

    true
}
