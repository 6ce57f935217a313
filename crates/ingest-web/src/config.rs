use std::env;
use std::time::Duration;

use store_postgres::DatabaseConnectionInfo;

/// Process-wide configuration, `TRANSIT_MERGE_`-prefixed except for the
/// `DATABASE_*` variables kept unprefixed for continuity with
/// [`DatabaseConnectionInfo::from_env`].
pub struct Config {
    pub database: DatabaseConnectionInfo,
    pub timetable_url: String,
    pub timetable_token: Option<String>,
    pub timetable_timeout: Duration,
    pub broker_url: Option<String>,
    pub publish_exchange_name: String,
    pub config_reload_interval: Duration,
    pub max_publish_retries: u32,
    pub default_trip_update_retention_days: i32,
    pub default_rt_update_retention_days: i32,
}

#[derive(Debug)]
pub struct MissingConfig(pub &'static str);

impl Config {
    pub fn from_env() -> Result<Self, MissingConfig> {
        let database = DatabaseConnectionInfo::from_env().ok_or(MissingConfig("DATABASE_URL"))?;
        let timetable_url = env::var("TRANSIT_MERGE_TIMETABLE_URL").map_err(|_| MissingConfig("TRANSIT_MERGE_TIMETABLE_URL"))?;

        Ok(Self {
            database,
            timetable_url,
            timetable_token: env::var("TRANSIT_MERGE_TIMETABLE_TOKEN").ok(),
            timetable_timeout: Duration::from_secs(env_u64("TRANSIT_MERGE_TIMETABLE_TIMEOUT_SECS", 10)),
            broker_url: env::var("TRANSIT_MERGE_BROKER_URL").ok(),
            publish_exchange_name: env::var("TRANSIT_MERGE_PUBLISH_EXCHANGE").unwrap_or_else(|_| "transit-merge-feed".to_owned()),
            config_reload_interval: Duration::from_secs(env_u64("TRANSIT_MERGE_CONFIG_RELOAD_INTERVAL_SECS", 60)),
            max_publish_retries: env_u64("TRANSIT_MERGE_MAX_PUBLISH_RETRIES", 10) as u32,
            default_trip_update_retention_days: env_u64("TRANSIT_MERGE_DEFAULT_TRIP_UPDATE_RETENTION_DAYS", model::contributor::DEFAULT_TRIP_UPDATE_RETENTION_DAYS as u64) as i32,
            default_rt_update_retention_days: env_u64("TRANSIT_MERGE_DEFAULT_RT_UPDATE_RETENTION_DAYS", model::contributor::DEFAULT_RT_UPDATE_RETENTION_DAYS as u64) as i32,
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|value| value.parse().ok()).unwrap_or(default)
}
