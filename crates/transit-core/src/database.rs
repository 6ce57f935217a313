use std::collections::HashMap;
use std::error;
use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::contributor::Contributor;
use model::real_time_update::RealTimeUpdate;
use model::trip_update::TripUpdate;
use model::vehicle_journey::{VehicleJourney, VehicleJourneyId};
use model::WithId;
use uuid::Uuid;

#[derive(Debug)]
pub enum StoreError {
    NotFound,
    Other(Box<dyn error::Error + Send + Sync>),
}

impl StoreError {
    pub fn other<T: error::Error + Send + Sync + 'static>(why: T) -> Self {
        Self::Other(Box::new(why))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait VehicleJourneyRepo {
    async fn get(&mut self, id: &VehicleJourneyId) -> StoreResult<Option<VehicleJourney>>;

    async fn put(&mut self, vehicle_journey: VehicleJourney) -> StoreResult<VehicleJourney>;
}

#[async_trait]
pub trait TripUpdateRepo {
    /// Batches a lookup for persisted trip updates matching the given
    /// vehicle journey identities, as the handler pipeline does once per
    /// incoming batch rather than once per trip.
    async fn get_batch(&mut self, ids: &[VehicleJourneyId]) -> StoreResult<HashMap<VehicleJourneyId, TripUpdate>>;

    async fn put_many(&mut self, updates: Vec<TripUpdate>) -> StoreResult<()>;

    async fn purge_older_than(&mut self, contributor_id: &str, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait RealTimeUpdateRepo {
    async fn insert(&mut self, update: RealTimeUpdate) -> StoreResult<WithId<RealTimeUpdate>>;

    async fn update(&mut self, id: Uuid, update: RealTimeUpdate) -> StoreResult<()>;

    /// Looks up the existing KO row for the same (contributor, payload,
    /// error) triple so that a repeat failure pokes `updated_at` instead of
    /// inserting a second audit row.
    async fn find_existing_ko(&mut self, contributor_id: &str, payload: &[u8], error: &str) -> StoreResult<Option<Uuid>>;

    async fn purge_older_than(&mut self, contributor_id: &str, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait ContributorRepo {
    async fn get(&mut self, id: &str) -> StoreResult<Option<Contributor>>;

    /// The set of active contributors configured for one connector type,
    /// queried fresh (no per-process cache) so a broker worker's
    /// reconfiguration probe observes writes immediately.
    async fn list_active_by_connector_type(&mut self, connector_type: &str) -> StoreResult<Vec<(String, Contributor)>>;

    /// Every active contributor, regardless of connector type.
    async fn list_active(&mut self) -> StoreResult<Vec<(String, Contributor)>>;
}

#[async_trait]
pub trait StoreOperations: VehicleJourneyRepo + TripUpdateRepo + RealTimeUpdateRepo + ContributorRepo + Send {}

impl<T> StoreOperations for T where T: VehicleJourneyRepo + TripUpdateRepo + RealTimeUpdateRepo + ContributorRepo + Send {}

#[async_trait]
pub trait StoreTransaction: StoreOperations {
    async fn commit(self) -> StoreResult<()>;
}

pub trait StoreAutocommit: StoreOperations {}

/// Storage abstraction implemented by [`store-postgres`](../store_postgres).
/// Multiple concurrent accesses are possible by cloning the store, the way
/// a connection pool is shared across workers.
#[async_trait]
pub trait Store: Clone + Send + Sync + Sized {
    type Transaction: StoreTransaction + Send;
    type Autocommit: StoreAutocommit + Send;

    /// Maximum number of rows `put_many`/`put_trip_updates`-style calls push
    /// in one statement; implementations page beyond this.
    const BULK_INSERT_MAX: usize;

    async fn transaction(&self) -> StoreResult<Self::Transaction>;

    fn auto(&self) -> Self::Autocommit;

    async fn perform_transaction<'s, T, F, Fut>(&'s self, action: F) -> StoreResult<T>
    where
        T: Send,
        F: Send + FnOnce(&'s mut Self::Transaction) -> Fut + Send,
        Fut: Future<Output = StoreResult<T>> + Send + 's;
}
