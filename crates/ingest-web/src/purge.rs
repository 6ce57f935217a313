use std::time::Duration;

use chrono::{Days, Utc};
use transit_core::database::{ContributorRepo, RealTimeUpdateRepo, TripUpdateRepo};
use transit_core::Store;

/// Periodic retention sweep: for every active contributor, drops trip-update
/// rows and raw real-time-update rows older than its configured (or the
/// process-wide default) retention window. Runs forever; the caller spawns
/// it alongside the web server and the broker supervisors.
pub async fn run_purge_loop<S: Store>(store: S, interval: Duration, default_trip_update_retention_days: i32, default_rt_update_retention_days: i32) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        let mut auto = store.auto();
        let contributors = match auto.list_active().await {
            Ok(contributors) => contributors,
            Err(why) => {
                log::error!("purge: failed to list contributors: {why:?}");
                continue;
            }
        };

        for (contributor_id, contributor) in contributors {
            let trip_update_days = if contributor.trip_update_retention_days > 0 {
                contributor.trip_update_retention_days
            } else {
                default_trip_update_retention_days
            };
            let rt_update_days = if contributor.rt_update_retention_days > 0 {
                contributor.rt_update_retention_days
            } else {
                default_rt_update_retention_days
            };

            let Some(trip_update_cutoff) = Utc::now().checked_sub_days(Days::new(trip_update_days.max(0) as u64)) else { continue };
            let Some(rt_update_cutoff) = Utc::now().checked_sub_days(Days::new(rt_update_days.max(0) as u64)) else { continue };

            match TripUpdateRepo::purge_older_than(&mut auto, &contributor_id, trip_update_cutoff).await {
                Ok(purged) if purged > 0 => log::info!("purge[{contributor_id}]: removed {purged} stale trip updates"),
                Ok(_) => {}
                Err(why) => log::error!("purge[{contributor_id}]: trip update sweep failed: {why:?}"),
            }

            match RealTimeUpdateRepo::purge_older_than(&mut auto, &contributor_id, rt_update_cutoff).await {
                Ok(purged) if purged > 0 => log::info!("purge[{contributor_id}]: removed {purged} stale real-time updates"),
                Ok(_) => {}
                Err(why) => log::error!("purge[{contributor_id}]: real-time update sweep failed: {why:?}"),
            }
        }
    }
}
