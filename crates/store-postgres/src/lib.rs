//! Postgres-backed implementation of the [`transit_core::Store`] family.
//! Every pooled connection pins its session time zone to UTC on checkout so
//! naive timestamps read back bit-for-bit identical to what was written,
//! per the shared-resources contract.

use std::collections::HashMap;
use std::env;
use std::error::Error;
use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::contributor::Contributor;
use model::real_time_update::RealTimeUpdate;
use model::trip_update::TripUpdate;
use model::vehicle_journey::{VehicleJourney, VehicleJourneyId};
use model::WithId;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, Postgres, Transaction};
use transit_core::database::{ContributorRepo, RealTimeUpdateRepo, Store, StoreAutocommit, StoreResult, StoreTransaction, TripUpdateRepo, VehicleJourneyRepo};
use uuid::Uuid;

mod queries;

pub struct DatabaseConnectionInfo {
    pub url: String,
}

impl DatabaseConnectionInfo {
    pub fn from_env() -> Option<Self> {
        env::var("DATABASE_URL").ok().map(|url| Self { url })
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub async fn connect(info: DatabaseConnectionInfo) -> Result<Self, Box<dyn Error>> {
        let pool = PgPoolOptions::new()
            .after_connect(|connection, _meta| {
                Box::pin(async move {
                    connection.execute("SET TIME ZONE 'UTC'").await?;
                    Ok(())
                })
            })
            .connect(&info.url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

pub struct PgStoreTransaction<'a> {
    tx: Transaction<'a, Postgres>,
}

pub struct PgStoreAutocommit {
    pool: sqlx::PgPool,
}

impl StoreAutocommit for PgStoreAutocommit {}

#[async_trait]
impl StoreTransaction for PgStoreTransaction<'static> {
    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await.map_err(queries::convert_error)
    }
}

#[async_trait]
impl VehicleJourneyRepo for PgStoreAutocommit {
    async fn get(&mut self, id: &VehicleJourneyId) -> StoreResult<Option<VehicleJourney>> {
        queries::get_vehicle_journey(&self.pool, id).await
    }

    async fn put(&mut self, vehicle_journey: VehicleJourney) -> StoreResult<VehicleJourney> {
        queries::put_vehicle_journey(&self.pool, vehicle_journey).await
    }
}

#[async_trait]
impl TripUpdateRepo for PgStoreAutocommit {
    async fn get_batch(&mut self, ids: &[VehicleJourneyId]) -> StoreResult<HashMap<VehicleJourneyId, TripUpdate>> {
        let updates = queries::get_trip_updates(&self.pool, ids).await?;
        Ok(updates.into_iter().map(|update| (update.vehicle_journey_id.clone(), update)).collect())
    }

    async fn put_many(&mut self, updates: Vec<TripUpdate>) -> StoreResult<()> {
        queries::put_trip_updates(&self.pool, updates, Utc::now()).await
    }

    async fn purge_older_than(&mut self, contributor_id: &str, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        queries::purge_trip_updates_older_than(&self.pool, contributor_id, cutoff).await
    }
}

#[async_trait]
impl RealTimeUpdateRepo for PgStoreAutocommit {
    async fn insert(&mut self, update: RealTimeUpdate) -> StoreResult<WithId<RealTimeUpdate>> {
        queries::insert_real_time_update(&self.pool, update).await
    }

    async fn update(&mut self, id: Uuid, update: RealTimeUpdate) -> StoreResult<()> {
        queries::update_real_time_update(&self.pool, id, update).await
    }

    async fn find_existing_ko(&mut self, contributor_id: &str, payload: &[u8], error: &str) -> StoreResult<Option<Uuid>> {
        queries::find_existing_ko(&self.pool, contributor_id, payload, error).await
    }

    async fn purge_older_than(&mut self, contributor_id: &str, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        queries::purge_real_time_updates_older_than(&self.pool, contributor_id, cutoff).await
    }
}

#[async_trait]
impl ContributorRepo for PgStoreAutocommit {
    async fn get(&mut self, id: &str) -> StoreResult<Option<Contributor>> {
        queries::get_contributor(&self.pool, id).await
    }

    async fn list_active_by_connector_type(&mut self, connector_type: &str) -> StoreResult<Vec<(String, Contributor)>> {
        queries::list_active_contributors_by_connector_type(&self.pool, connector_type).await
    }

    async fn list_active(&mut self) -> StoreResult<Vec<(String, Contributor)>> {
        queries::list_active_contributors(&self.pool).await
    }
}

#[async_trait]
impl VehicleJourneyRepo for PgStoreTransaction<'static> {
    async fn get(&mut self, id: &VehicleJourneyId) -> StoreResult<Option<VehicleJourney>> {
        queries::get_vehicle_journey(&mut *self.tx, id).await
    }

    async fn put(&mut self, vehicle_journey: VehicleJourney) -> StoreResult<VehicleJourney> {
        queries::put_vehicle_journey(&mut *self.tx, vehicle_journey).await
    }
}

#[async_trait]
impl TripUpdateRepo for PgStoreTransaction<'static> {
    async fn get_batch(&mut self, ids: &[VehicleJourneyId]) -> StoreResult<HashMap<VehicleJourneyId, TripUpdate>> {
        let updates = queries::get_trip_updates(&mut *self.tx, ids).await?;
        Ok(updates.into_iter().map(|update| (update.vehicle_journey_id.clone(), update)).collect())
    }

    async fn put_many(&mut self, updates: Vec<TripUpdate>) -> StoreResult<()> {
        queries::put_trip_updates(&mut *self.tx, updates, Utc::now()).await
    }

    async fn purge_older_than(&mut self, contributor_id: &str, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        queries::purge_trip_updates_older_than(&mut *self.tx, contributor_id, cutoff).await
    }
}

#[async_trait]
impl RealTimeUpdateRepo for PgStoreTransaction<'static> {
    async fn insert(&mut self, update: RealTimeUpdate) -> StoreResult<WithId<RealTimeUpdate>> {
        queries::insert_real_time_update(&mut *self.tx, update).await
    }

    async fn update(&mut self, id: Uuid, update: RealTimeUpdate) -> StoreResult<()> {
        queries::update_real_time_update(&mut *self.tx, id, update).await
    }

    async fn find_existing_ko(&mut self, contributor_id: &str, payload: &[u8], error: &str) -> StoreResult<Option<Uuid>> {
        queries::find_existing_ko(&mut *self.tx, contributor_id, payload, error).await
    }

    async fn purge_older_than(&mut self, contributor_id: &str, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        queries::purge_real_time_updates_older_than(&mut *self.tx, contributor_id, cutoff).await
    }
}

#[async_trait]
impl ContributorRepo for PgStoreTransaction<'static> {
    async fn get(&mut self, id: &str) -> StoreResult<Option<Contributor>> {
        queries::get_contributor(&mut *self.tx, id).await
    }

    async fn list_active_by_connector_type(&mut self, connector_type: &str) -> StoreResult<Vec<(String, Contributor)>> {
        queries::list_active_contributors_by_connector_type(&mut *self.tx, connector_type).await
    }

    async fn list_active(&mut self) -> StoreResult<Vec<(String, Contributor)>> {
        queries::list_active_contributors(&mut *self.tx).await
    }
}

#[async_trait]
impl Store for PgStore {
    type Transaction = PgStoreTransaction<'static>;
    type Autocommit = PgStoreAutocommit;

    const BULK_INSERT_MAX: usize = 999;

    fn auto(&self) -> Self::Autocommit {
        PgStoreAutocommit { pool: self.pool.clone() }
    }

    async fn transaction(&self) -> StoreResult<Self::Transaction> {
        let tx = self.pool.begin().await.map_err(queries::convert_error)?;
        Ok(PgStoreTransaction { tx })
    }

    async fn perform_transaction<'s, T, F, Fut>(&'s self, action: F) -> StoreResult<T>
    where
        T: Send,
        F: Send + FnOnce(&'s mut Self::Transaction) -> Fut + Send,
        Fut: Future<Output = StoreResult<T>> + Send + 's,
    {
        let mut tx = self.transaction().await?;
        let result = action(&mut tx).await;

        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(why) => {
                let _ = tx.tx.rollback().await;
                Err(why)
            }
        }
    }
}
