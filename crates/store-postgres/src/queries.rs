use chrono::{DateTime, NaiveDateTime, Utc};
use model::contributor::Contributor;
use model::effect::Effect;
use model::real_time_update::{ProcessingStatus, RealTimeUpdate};
use model::trip_update::{TripStatus, TripUpdate};
use model::vehicle_journey::{BaseStopTime, VehicleJourney, VehicleJourneyId};
use model::WithId;
use sqlx::types::Json;
use sqlx::{Executor, FromRow, Postgres};
use transit_core::database::StoreError;
use uuid::Uuid;
use utility::id::Id;

pub(crate) fn convert_error(why: sqlx::Error) -> StoreError {
    match why {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        _ => StoreError::other(why),
    }
}

#[derive(FromRow)]
struct VehicleJourneyRow {
    base_trip_id: String,
    start_timestamp: NaiveDateTime,
    stops: Json<Vec<BaseStopTime>>,
}

impl From<VehicleJourneyRow> for VehicleJourney {
    fn from(row: VehicleJourneyRow) -> Self {
        VehicleJourney {
            base_trip_id: row.base_trip_id,
            start_timestamp: row.start_timestamp,
            stops: row.stops.0,
        }
    }
}

pub async fn get_vehicle_journey<'c, E>(executor: E, id: &VehicleJourneyId) -> Result<Option<VehicleJourney>, StoreError>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, VehicleJourneyRow>(
        "SELECT base_trip_id, start_timestamp, stops FROM vehicle_journey WHERE base_trip_id = $1 AND start_timestamp = $2",
    )
    .bind(&id.base_trip_id)
    .bind(id.start_timestamp)
    .fetch_optional(executor)
    .await
    .map(|row| row.map(VehicleJourney::from))
    .map_err(convert_error)
}

pub async fn put_vehicle_journey<'c, E>(executor: E, vehicle_journey: VehicleJourney) -> Result<VehicleJourney, StoreError>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO vehicle_journey (base_trip_id, start_timestamp, stops) VALUES ($1, $2, $3)
         ON CONFLICT (base_trip_id, start_timestamp) DO UPDATE SET stops = EXCLUDED.stops",
    )
    .bind(&vehicle_journey.base_trip_id)
    .bind(vehicle_journey.start_timestamp)
    .bind(Json(&vehicle_journey.stops))
    .execute(executor)
    .await
    .map_err(convert_error)?;

    Ok(vehicle_journey)
}

#[derive(FromRow)]
struct TripUpdateRow {
    base_trip_id: String,
    start_timestamp: NaiveDateTime,
    contributor_id: String,
    status: String,
    effect: String,
    message: Option<String>,
    company_id: Option<String>,
    physical_mode_id: Option<String>,
    headsign: Option<String>,
    stop_time_updates: Json<Vec<model::trip_update::StopTimeUpdate>>,
}

impl From<TripUpdateRow> for TripUpdate {
    fn from(row: TripUpdateRow) -> Self {
        TripUpdate {
            vehicle_journey_id: VehicleJourneyId::new(row.base_trip_id, row.start_timestamp),
            contributor_id: row.contributor_id,
            status: status_from_db(&row.status),
            effect: effect_from_db(&row.effect),
            message: row.message,
            company_id: row.company_id,
            physical_mode_id: row.physical_mode_id,
            headsign: row.headsign,
            stop_time_updates: row.stop_time_updates.0,
        }
    }
}

fn status_to_db(status: TripStatus) -> &'static str {
    match status {
        TripStatus::None => "NONE",
        TripStatus::Update => "UPDATE",
        TripStatus::Delete => "DELETE",
        TripStatus::Add => "ADD",
    }
}

fn status_from_db(status: &str) -> TripStatus {
    match status {
        "UPDATE" => TripStatus::Update,
        "DELETE" => TripStatus::Delete,
        "ADD" => TripStatus::Add,
        _ => TripStatus::None,
    }
}

fn effect_to_db(effect: Effect) -> &'static str {
    match effect {
        Effect::NoService => "NO_SERVICE",
        Effect::ReducedService => "REDUCED_SERVICE",
        Effect::SignificantDelays => "SIGNIFICANT_DELAYS",
        Effect::Detour => "DETOUR",
        Effect::AdditionalService => "ADDITIONAL_SERVICE",
        Effect::ModifiedService => "MODIFIED_SERVICE",
        Effect::UnknownEffect => "UNKNOWN_EFFECT",
    }
}

fn effect_from_db(effect: &str) -> Effect {
    match effect {
        "NO_SERVICE" => Effect::NoService,
        "REDUCED_SERVICE" => Effect::ReducedService,
        "SIGNIFICANT_DELAYS" => Effect::SignificantDelays,
        "DETOUR" => Effect::Detour,
        "ADDITIONAL_SERVICE" => Effect::AdditionalService,
        "MODIFIED_SERVICE" => Effect::ModifiedService,
        _ => Effect::UnknownEffect,
    }
}

pub async fn get_trip_updates<'c, E>(executor: E, ids: &[VehicleJourneyId]) -> Result<Vec<TripUpdate>, StoreError>
where
    E: Executor<'c, Database = Postgres>,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let base_trip_ids: Vec<&str> = ids.iter().map(|id| id.base_trip_id.as_str()).collect();
    let start_timestamps: Vec<NaiveDateTime> = ids.iter().map(|id| id.start_timestamp).collect();

    sqlx::query_as::<_, TripUpdateRow>(
        "SELECT base_trip_id, start_timestamp, contributor_id, status, effect, message, company_id, physical_mode_id, headsign, stop_time_updates
         FROM trip_update
         WHERE (base_trip_id, start_timestamp) IN (SELECT * FROM UNNEST($1::text[], $2::timestamp[]))",
    )
    .bind(&base_trip_ids)
    .bind(&start_timestamps)
    .fetch_all(executor)
    .await
    .map(|rows| rows.into_iter().map(TripUpdate::from).collect())
    .map_err(convert_error)
}

pub async fn put_trip_updates<'c, E>(executor: E, updates: Vec<TripUpdate>, now: DateTime<Utc>) -> Result<(), StoreError>
where
    E: Executor<'c, Database = Postgres> + Copy,
{
    for update in updates {
        sqlx::query(
            "INSERT INTO trip_update (base_trip_id, start_timestamp, contributor_id, status, effect, message, company_id, physical_mode_id, headsign, stop_time_updates, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (base_trip_id, start_timestamp) DO UPDATE SET
               contributor_id = EXCLUDED.contributor_id,
               status = EXCLUDED.status,
               effect = EXCLUDED.effect,
               message = EXCLUDED.message,
               company_id = EXCLUDED.company_id,
               physical_mode_id = EXCLUDED.physical_mode_id,
               headsign = EXCLUDED.headsign,
               stop_time_updates = EXCLUDED.stop_time_updates,
               updated_at = EXCLUDED.updated_at",
        )
        .bind(&update.vehicle_journey_id.base_trip_id)
        .bind(update.vehicle_journey_id.start_timestamp)
        .bind(&update.contributor_id)
        .bind(status_to_db(update.status))
        .bind(effect_to_db(update.effect))
        .bind(&update.message)
        .bind(&update.company_id)
        .bind(&update.physical_mode_id)
        .bind(&update.headsign)
        .bind(Json(&update.stop_time_updates))
        .bind(now)
        .execute(executor)
        .await
        .map_err(convert_error)?;
    }

    Ok(())
}

pub async fn purge_trip_updates_older_than<'c, E>(executor: E, contributor_id: &str, cutoff: DateTime<Utc>) -> Result<u64, StoreError>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query("DELETE FROM trip_update WHERE contributor_id = $1 AND updated_at < $2")
        .bind(contributor_id)
        .bind(cutoff)
        .execute(executor)
        .await
        .map(|result| result.rows_affected())
        .map_err(convert_error)
}

#[derive(FromRow)]
struct RealTimeUpdateRow {
    id: Uuid,
    connector_type: String,
    contributor_id: String,
    raw_payload: Vec<u8>,
    status: String,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn processing_status_to_db(status: ProcessingStatus) -> &'static str {
    match status {
        ProcessingStatus::Ok => "OK",
        ProcessingStatus::Ko => "KO",
        ProcessingStatus::Pending => "PENDING",
    }
}

fn processing_status_from_db(status: &str) -> ProcessingStatus {
    match status {
        "OK" => ProcessingStatus::Ok,
        "KO" => ProcessingStatus::Ko,
        _ => ProcessingStatus::Pending,
    }
}

pub async fn insert_real_time_update<'c, E>(executor: E, update: RealTimeUpdate) -> Result<WithId<RealTimeUpdate>, StoreError>
where
    E: Executor<'c, Database = Postgres> + Copy,
{
    let id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO real_time_update (id, connector_type, contributor_id, raw_payload, status, error, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(id)
    .bind(&update.connector_type)
    .bind(&update.contributor_id)
    .bind(&update.raw_payload)
    .bind(processing_status_to_db(update.status))
    .bind(&update.error)
    .bind(update.created_at)
    .bind(update.updated_at)
    .execute(executor)
    .await
    .map_err(convert_error)?;

    for trip_update_id in &update.trip_update_ids {
        link_trip_update(executor, id, trip_update_id).await?;
    }

    Ok(WithId::new(Id::new(id), update))
}

pub async fn update_real_time_update<'c, E>(executor: E, id: Uuid, update: RealTimeUpdate) -> Result<(), StoreError>
where
    E: Executor<'c, Database = Postgres> + Copy,
{
    sqlx::query("UPDATE real_time_update SET status = $2, error = $3, updated_at = $4 WHERE id = $1")
        .bind(id)
        .bind(processing_status_to_db(update.status))
        .bind(&update.error)
        .bind(update.updated_at)
        .execute(executor)
        .await
        .map_err(convert_error)?;

    for trip_update_id in &update.trip_update_ids {
        link_trip_update(executor, id, trip_update_id).await?;
    }

    Ok(())
}

async fn link_trip_update<'c, E>(executor: E, real_time_update_id: Uuid, trip_update_id: &VehicleJourneyId) -> Result<(), StoreError>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO real_time_update_trip_update (real_time_update_id, base_trip_id, start_timestamp) VALUES ($1, $2, $3)
         ON CONFLICT DO NOTHING",
    )
    .bind(real_time_update_id)
    .bind(&trip_update_id.base_trip_id)
    .bind(trip_update_id.start_timestamp)
    .execute(executor)
    .await
    .map_err(convert_error)?;

    Ok(())
}

pub async fn find_existing_ko<'c, E>(executor: E, contributor_id: &str, payload: &[u8], error: &str) -> Result<Option<Uuid>, StoreError>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM real_time_update WHERE contributor_id = $1 AND raw_payload = $2 AND status = 'KO' AND error = $3
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(contributor_id)
    .bind(payload)
    .bind(error)
    .fetch_optional(executor)
    .await
    .map_err(convert_error)
}

pub async fn purge_real_time_updates_older_than<'c, E>(executor: E, contributor_id: &str, cutoff: DateTime<Utc>) -> Result<u64, StoreError>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query("DELETE FROM real_time_update WHERE contributor_id = $1 AND created_at < $2")
        .bind(contributor_id)
        .bind(cutoff)
        .execute(executor)
        .await
        .map(|result| result.rows_affected())
        .map_err(convert_error)
}

#[derive(FromRow)]
struct ContributorRow {
    id: String,
    connector_type: String,
    is_active: bool,
    broker_url: Option<String>,
    exchange_name: Option<String>,
    queue_name: Option<String>,
    coverage: Option<String>,
    token: Option<String>,
    trip_update_retention_days: i32,
    rt_update_retention_days: i32,
}

impl From<ContributorRow> for (String, Contributor) {
    fn from(row: ContributorRow) -> Self {
        (
            row.id,
            Contributor {
                connector_type: row.connector_type,
                is_active: row.is_active,
                broker_url: row.broker_url,
                exchange_name: row.exchange_name,
                queue_name: row.queue_name,
                coverage: row.coverage,
                token: row.token,
                trip_update_retention_days: row.trip_update_retention_days,
                rt_update_retention_days: row.rt_update_retention_days,
            },
        )
    }
}

pub async fn get_contributor<'c, E>(executor: E, id: &str) -> Result<Option<Contributor>, StoreError>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, ContributorRow>(
        "SELECT id, connector_type, is_active, broker_url, exchange_name, queue_name, coverage, token, trip_update_retention_days, rt_update_retention_days
         FROM contributor WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
    .map(|row| row.map(|row| <(String, Contributor)>::from(row).1))
    .map_err(convert_error)
}

/// Queried fresh on every call (no per-process cache) so a broker worker's
/// reconfiguration probe observes a row mutated by an operator immediately.
pub async fn list_active_contributors_by_connector_type<'c, E>(executor: E, connector_type: &str) -> Result<Vec<(String, Contributor)>, StoreError>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, ContributorRow>(
        "SELECT id, connector_type, is_active, broker_url, exchange_name, queue_name, coverage, token, trip_update_retention_days, rt_update_retention_days
         FROM contributor WHERE connector_type = $1 AND is_active",
    )
    .bind(connector_type)
    .fetch_all(executor)
    .await
    .map(|rows| rows.into_iter().map(Into::into).collect())
    .map_err(convert_error)
}

/// Every active contributor regardless of connector type, for the
/// retention purge sweep which runs once per process rather than once per
/// connector type.
pub async fn list_active_contributors<'c, E>(executor: E) -> Result<Vec<(String, Contributor)>, StoreError>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, ContributorRow>(
        "SELECT id, connector_type, is_active, broker_url, exchange_name, queue_name, coverage, token, trip_update_retention_days, rt_update_retention_days
         FROM contributor WHERE is_active",
    )
    .fetch_all(executor)
    .await
    .map(|rows| rows.into_iter().map(Into::into).collect())
    .map_err(convert_error)
}
