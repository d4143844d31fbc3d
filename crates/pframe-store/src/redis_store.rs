//! Redis-backed job store.
//!
//! Records are stored as JSON strings under `{prefix}{job_id}`. Creation uses
//! `SET NX EX`; updates run a Lua script that checks the stored revision and
//! rewrites the value with `KEEPTTL`, so read-modify-write races cannot lose
//! an update and the expiry stays anchored to creation.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use tracing::{debug, warn};

use pframe_models::{JobId, JobRecord};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::{JobStore, Revision, SwapOutcome};

const COMPARE_AND_SWAP_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
    return -1
end
local stored = cjson.decode(raw)
if stored['status'] ~= ARGV[1]
    or tonumber(stored['progress']) ~= tonumber(ARGV[2])
    or stored['updated_at'] ~= ARGV[3] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[4], 'KEEPTTL')
return 1
"#;

/// Job store client.
pub struct RedisJobStore {
    client: redis::Client,
    key_prefix: String,
    swap_script: Script,
}

impl RedisJobStore {
    /// Create a new store. Does not connect until first use.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            key_prefix: config.key_prefix.clone(),
            swap_script: Script::new(COMPARE_AND_SWAP_SCRIPT),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(&StoreConfig::from_env())
    }

    /// Redis key for a job.
    pub fn key(&self, id: &JobId) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::unavailable(format!("Redis connection failed: {}", e)))
    }
}

/// Revision fields rendered exactly as they appear in the stored JSON.
fn revision_args(record: &JobRecord) -> StoreResult<(String, u8, String)> {
    let revision = Revision::of(record);
    let updated_at = match serde_json::to_value(revision.updated_at)? {
        serde_json::Value::String(s) => s,
        other => {
            return Err(StoreError::Serialization(format!(
                "unexpected timestamp encoding: {}",
                other
            )))
        }
    };
    Ok((revision.status.as_str().to_string(), revision.progress, updated_at))
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn create(&self, record: &JobRecord, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.connection().await?;
        let key = self.key(&record.id);
        let payload = serde_json::to_string(record)?;

        // SET key value NX EX ttl
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&payload)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        if result.is_none() {
            warn!(job_id = %record.id, "Job key already exists, refusing to overwrite");
            return Ok(false);
        }

        debug!(job_id = %record.id, ttl_secs = ttl.as_secs(), "Created job record");
        Ok(true)
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<JobRecord>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(self.key(id)).await?;

        match payload {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn compare_and_swap(&self, current: &JobRecord, next: &JobRecord) -> StoreResult<SwapOutcome> {
        if current.id != next.id {
            return Err(StoreError::Serialization(format!(
                "cannot swap record {} with record {}",
                current.id, next.id
            )));
        }

        let mut conn = self.connection().await?;
        let (status, progress, updated_at) = revision_args(current)?;
        let payload = serde_json::to_string(next)?;

        let outcome: i32 = self
            .swap_script
            .key(self.key(&current.id))
            .arg(status)
            .arg(progress)
            .arg(updated_at)
            .arg(payload)
            .invoke_async(&mut conn)
            .await?;

        let outcome = match outcome {
            1 => SwapOutcome::Swapped,
            0 => SwapOutcome::Conflict,
            _ => SwapOutcome::Missing,
        };
        debug!(job_id = %current.id, ?outcome, "Compare-and-swap finished");
        Ok(outcome)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}
