use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use lapin::options::BasicAckOptions;
use model::contributor::Contributor;
use transit_core::database::ContributorRepo;
use transit_core::parsed_update::ParsedTripUpdate;
use transit_core::{Publisher, Store, TimetableClient};

use crate::consumer::{BrokerConsumer, ConnectError};
use crate::reconfigure::{reconfigure_action, ReconfigureAction};

/// Why a worker's consume loop returned. The supervisor decides what to do
/// next from this, never from an error: a worker exiting cleanly to
/// restart is the expected steady-state behavior, not a failure. An
/// exchange/queue-only change never produces an exit: it is rebound in
/// place inside the loop below.
#[derive(Debug)]
pub enum WorkerExit {
    Restart,
    Deactivated,
    ConnectionLost,
}

/// Runs one contributor's consume loop until its configuration changes,
/// it is deactivated, or the broker connection drops. Every delivery is
/// decoded, handed to [`handler::ingest_and_record`] and acknowledged
/// unconditionally once processing completes, win or lose.
pub async fn run_worker<S>(
    store: &S,
    publisher: &dyn Publisher,
    timetable: &dyn TimetableClient,
    connector_type: String,
    contributor_id: String,
    contributor: Contributor,
    config_reload_interval: Duration,
) -> Result<WorkerExit, ConnectError>
where
    S: Store,
{
    let mut contributor = contributor;
    let (broker_url, exchange_name, queue_name) = contributor.broker_fields().ok_or(ConnectError::MissingBrokerFields)?;
    let mut broker = BrokerConsumer::connect(broker_url, exchange_name, queue_name, &contributor_id).await?;

    let mut reload_ticker = tokio::time::interval(config_reload_interval);
    reload_ticker.tick().await; // first tick fires immediately; the real probe starts on the second.

    loop {
        tokio::select! {
            delivery = broker.consumer.next() => {
                let Some(delivery) = delivery else {
                    return Ok(WorkerExit::ConnectionLost);
                };
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(why) => {
                        log::error!("broker-worker[{contributor_id}]: delivery error: {why}");
                        continue;
                    }
                };

                let parsed = parse_payload(&delivery.data);
                let now = Utc::now();

                if let Err(why) = handler::ingest_and_record(
                    store,
                    publisher,
                    timetable,
                    connector_type.clone(),
                    contributor_id.clone(),
                    delivery.data.clone(),
                    parsed,
                    true,
                    now,
                )
                .await
                {
                    log::error!("broker-worker[{contributor_id}]: ingest failed: {why:?}");
                }

                // Acknowledged unconditionally after processing, success or
                // failure alike. kirin's own piv_worker.py carries a TODO
                // questioning this for transient failures; the TODO is
                // preserved rather than resolved since nothing in the
                // source picks a different behavior.
                // TODO: should a transient ingest failure nack-and-requeue
                // instead of acking? kirin never answers this either.
                if let Err(why) = delivery.ack(BasicAckOptions::default()).await {
                    log::error!("broker-worker[{contributor_id}]: ack failed: {why}");
                }
            }
            _ = reload_ticker.tick() => {
                let mut auto = store.auto();
                match ContributorRepo::get(&mut auto, &contributor_id).await {
                    Ok(Some(latest)) if !latest.is_active => return Ok(WorkerExit::Deactivated),
                    Ok(Some(latest)) => match reconfigure_action(&contributor, &latest) {
                        ReconfigureAction::Restart => return Ok(WorkerExit::Restart),
                        ReconfigureAction::Rebind => {
                            let Some((exchange_name, queue_name)) = latest.binding_fields() else {
                                return Ok(WorkerExit::Restart);
                            };
                            match broker.rebind(exchange_name, queue_name).await {
                                Ok(()) => {
                                    log::info!("broker-worker[{contributor_id}]: rebound to exchange={exchange_name} queue={queue_name}");
                                    contributor = latest;
                                }
                                Err(why) => {
                                    log::error!("broker-worker[{contributor_id}]: rebind failed: {why:?}");
                                }
                            }
                        }
                        ReconfigureAction::None => {}
                    },
                    Ok(None) => return Ok(WorkerExit::Deactivated),
                    Err(why) => log::warn!("broker-worker[{contributor_id}]: reconfiguration probe failed: {why:?}"),
                }
            }
        }
    }
}

/// Decodes one AMQP delivery body into the internal wire shape. Authoring
/// a vendor-specific parser (PIV's actual XML/JSON envelope) is out of
/// scope, so the broker worker expects its payload already in the same
/// `ParsedTripUpdate` shape the generic HTTP connector accepts.
fn parse_payload(bytes: &[u8]) -> Result<Vec<ParsedTripUpdate>, String> {
    serde_json::from_slice(bytes).map_err(|why| format!("malformed broker payload: {why}"))
}
