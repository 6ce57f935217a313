use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use transit_core::database::ContributorRepo;
use transit_core::{Publisher, Store, TimetableClient};

use crate::worker::{run_worker, WorkerExit};

/// Handle to a running supervisor. Dropping it does not stop the
/// supervised task — mirrors the teacher repo's `CollectorRef`, a token
/// the caller holds without needing to act on it.
pub struct SupervisorRef;

/// Runs one supervisor per connector type: polls the active contributors
/// configured for it at `config_reload_interval`, spawns one worker per
/// contributor, and restarts a worker's task whenever it returns —
/// whether because its configuration changed, the broker connection
/// dropped, or it was deactivated.
pub async fn run_supervisor<S>(
    store: S,
    publisher: Arc<dyn Publisher>,
    timetable: Arc<dyn TimetableClient>,
    connector_type: String,
    config_reload_interval: Duration,
) -> SupervisorRef
where
    S: Store + 'static,
{
    tokio::spawn(async move {
        let mut handles: HashMap<String, JoinHandle<()>> = HashMap::new();

        loop {
            handles.retain(|_, handle| !handle.is_finished());

            let mut auto = store.auto();
            let active = match auto.list_active_by_connector_type(&connector_type).await {
                Ok(active) => active,
                Err(why) => {
                    log::error!("broker-worker supervisor[{connector_type}]: failed to list contributors: {why:?}");
                    tokio::time::sleep(config_reload_interval).await;
                    continue;
                }
            };

            for (contributor_id, contributor) in active {
                if handles.contains_key(&contributor_id) {
                    continue;
                }

                let store = store.clone();
                let publisher = Arc::clone(&publisher);
                let timetable = Arc::clone(&timetable);
                let connector_type = connector_type.clone();
                let id = contributor_id.clone();

                let handle = tokio::spawn(async move {
                    loop {
                        let outcome =
                            run_worker(&store, publisher.as_ref(), timetable.as_ref(), connector_type.clone(), id.clone(), contributor.clone(), config_reload_interval).await;

                        match outcome {
                            Ok(WorkerExit::Deactivated) => {
                                log::info!("broker-worker[{id}]: deactivated, stopping");
                                return;
                            }
                            Ok(WorkerExit::Restart) => {
                                log::info!("broker-worker[{id}]: broker connection parameters changed, restarting");
                                return;
                            }
                            Ok(WorkerExit::ConnectionLost) => {
                                log::warn!("broker-worker[{id}]: broker connection lost, reconnecting");
                            }
                            Err(why) => {
                                log::error!("broker-worker[{id}]: fatal configuration error: {why:?}");
                                return;
                            }
                        }
                    }
                });

                handles.insert(contributor_id, handle);
            }

            tokio::time::sleep(config_reload_interval).await;
        }
    });

    SupervisorRef
}
