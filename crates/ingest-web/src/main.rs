use std::collections::HashSet;
use std::sync::Arc;

use broker_worker::{run_supervisor, AmqpPublisher, RetryingPublisher};
use ingest_web::config::Config;
use ingest_web::timetable_client::HttpTimetableClient;
use ingest_web::{purge, start_web_server, WebState};
use store_postgres::PgStore;
use transit_core::database::ContributorRepo;
use transit_core::{Publisher, Store, TimetableClient};

#[tokio::main]
async fn main() {
    env_logger::init();
    tracing_subscriber::fmt::init();

    let config = Config::from_env().expect("expected TRANSIT_MERGE_ configuration in env.");

    let store = PgStore::connect(config.database)
        .await
        .expect("could not connect to database.");

    let timetable: Arc<dyn TimetableClient> =
        Arc::new(HttpTimetableClient::new(config.timetable_url, config.timetable_token, config.timetable_timeout).expect("could not build timetable client."));

    let publisher: Arc<dyn Publisher> = match &config.broker_url {
        Some(broker_url) => {
            let amqp = AmqpPublisher::connect(broker_url, &config.publish_exchange_name).await.expect("could not connect publisher to broker.");
            Arc::new(RetryingPublisher::new(amqp, config.max_publish_retries))
        }
        None => {
            log::warn!("TRANSIT_MERGE_BROKER_URL unset; outbound feed publishing is disabled.");
            Arc::new(NullPublisher)
        }
    };

    // One supervisor per connector type configured among active contributors.
    // "generic" is excluded: it is HTTP-only (see `ingest_route`), it never
    // has a broker queue to supervise.
    let connector_types: HashSet<String> = store
        .auto()
        .list_active()
        .await
        .expect("could not list contributors.")
        .into_iter()
        .map(|(_, contributor)| contributor.connector_type)
        .filter(|connector_type| connector_type != "generic")
        .collect();

    for connector_type in connector_types {
        run_supervisor(store.clone(), Arc::clone(&publisher), Arc::clone(&timetable), connector_type, config.config_reload_interval).await;
    }

    tokio::spawn(purge::run_purge_loop(
        store.clone(),
        config.config_reload_interval,
        config.default_trip_update_retention_days,
        config.default_rt_update_retention_days,
    ));

    let web_future = start_web_server(WebState { store, publisher, timetable });

    let _ = web_future.await;
}

struct NullPublisher;

#[async_trait::async_trait]
impl Publisher for NullPublisher {
    async fn publish(&self, _feed: Vec<u8>) -> Result<(), transit_core::MessageNotPublished> {
        Ok(())
    }
}
