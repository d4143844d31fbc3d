//! Redis job store integration tests.

use std::time::Duration;

use chrono::Utc;
use pframe_models::{transition, JobEvent, JobId, JobKind, JobRecord, JobStatus};
use pframe_store::{JobStore, RedisJobStore, StoreConfig, SwapOutcome};

fn store() -> RedisJobStore {
    dotenvy::dotenv().ok();
    let config = StoreConfig {
        key_prefix: format!("pframe:test:{}:", JobId::new()),
        ..StoreConfig::from_env()
    };
    RedisJobStore::new(&config).expect("Failed to create store")
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_create_get_roundtrip() {
    let store = store();
    store.ping().await.expect("Redis not reachable");

    let record = JobRecord::new(JobId::new(), JobKind::Embed, Utc::now());
    assert!(store.create(&record, Duration::from_secs(60)).await.unwrap());
    assert!(!store.create(&record, Duration::from_secs(60)).await.unwrap());

    let loaded = store.get(&record.id).await.unwrap().expect("record missing");
    assert_eq!(loaded, record);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_compare_and_swap_rejects_stale_writer() {
    let store = store();
    let record = JobRecord::new(JobId::new(), JobKind::Detect, Utc::now());
    store.create(&record, Duration::from_secs(60)).await.unwrap();

    let running = transition(&record, JobEvent::Start, Utc::now()).unwrap();
    assert_eq!(
        store.compare_and_swap(&record, &running).await.unwrap(),
        SwapOutcome::Swapped
    );

    let competing = transition(&record, JobEvent::Start, Utc::now()).unwrap();
    assert_eq!(
        store.compare_and_swap(&record, &competing).await.unwrap(),
        SwapOutcome::Conflict
    );

    let loaded = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, JobStatus::Running);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_record_expires_and_swap_reports_missing() {
    let store = store();
    let record = JobRecord::new(JobId::new(), JobKind::Embed, Utc::now());
    store.create(&record, Duration::from_secs(1)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(store.get(&record.id).await.unwrap().is_none());
    let next = transition(&record, JobEvent::Start, Utc::now()).unwrap();
    assert_eq!(
        store.compare_and_swap(&record, &next).await.unwrap(),
        SwapOutcome::Missing
    );
}
