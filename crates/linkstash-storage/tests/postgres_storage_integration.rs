use std::time::Duration;

use linkstash_core::{compute_handle, Handle};
use linkstash_storage::{DeletionEntry, PgStorage, Stats, Storage, StorageError, UrlRecord};
use linkstash_test_infra::{PostgresConfig, PostgresServer};

struct Fixture {
    _postgres: PostgresServer,
    storage: PgStorage,
}

impl Fixture {
    async fn start() -> Self {
        let postgres = PostgresServer::new(PostgresConfig::builder().build())
            .await
            .expect("start postgres");
        let url = postgres.database_url().await.expect("postgres url");
        let storage = connect_with_retry(&url).await;

        Self {
            _postgres: postgres,
            storage,
        }
    }
}

async fn connect_with_retry(url: &str) -> PgStorage {
    let mut last_error = None;

    for _ in 0..20 {
        match PgStorage::connect(url).await {
            Ok(storage) => return storage,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect postgres: {last_error:?}");
}

fn handle(value: &str) -> Handle {
    Handle::new_unchecked(value)
}

fn record(owner: &str, h: &str, url: &str) -> UrlRecord {
    UrlRecord::new(owner, handle(h), url)
}

#[tokio::test]
async fn save_and_get_round_trip() {
    let fixture = Fixture::start().await;
    let h = compute_handle("https://youtube.com");

    fixture
        .storage
        .save_url("https://youtube.com", "user1", &h)
        .await
        .unwrap();

    let got = fixture.storage.get_url(&h).await.unwrap();
    assert_eq!(got.original_url, "https://youtube.com");
    assert_eq!(got.owner, "user1");
    assert!(!got.deleted);
}

#[tokio::test]
async fn get_unknown_handle_is_not_found() {
    let fixture = Fixture::start().await;

    let err = fixture.storage.get_url(&handle("xyzyxyzy")).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[tokio::test]
async fn save_conflicts_when_handle_already_exists() {
    let fixture = Fixture::start().await;

    fixture
        .storage
        .save_url("https://one.example", "user1", &handle("abc123"))
        .await
        .unwrap();

    let err = fixture
        .storage
        .save_url("https://two.example", "user2", &handle("abc123"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(_)));

    let got = fixture.storage.get_url(&handle("abc123")).await.unwrap();
    assert_eq!(got.original_url, "https://one.example");
}

#[tokio::test]
async fn batch_save_then_list_by_owner() {
    let fixture = Fixture::start().await;

    fixture
        .storage
        .batch_save_urls(vec![
            record("1", "xxx", "https://ya.ru"),
            record("1", "yyy", "https://ya2.ru"),
            record("1", "zzz", "https://ya3.ru"),
        ])
        .await
        .unwrap();

    assert_eq!(fixture.storage.get_urls_by_owner("1").await.unwrap().len(), 3);
}

#[tokio::test]
async fn batch_with_collision_is_rolled_back() {
    let fixture = Fixture::start().await;

    fixture
        .storage
        .save_url("https://ya.ru", "1", &handle("xxx"))
        .await
        .unwrap();

    let err = fixture
        .storage
        .batch_save_urls(vec![
            record("2", "aaa", "https://a.ru"),
            record("2", "xxx", "https://clash.ru"),
            record("2", "bbb", "https://b.ru"),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(_)));

    assert!(fixture.storage.get_urls_by_owner("2").await.unwrap().is_empty());
    assert!(matches!(
        fixture.storage.get_url(&handle("aaa")).await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

#[tokio::test]
async fn delete_marks_matching_records_only() {
    let fixture = Fixture::start().await;

    fixture
        .storage
        .batch_save_urls(vec![
            record("1", "xxx", "https://ya.ru"),
            record("1", "yyy", "https://ya2.ru"),
            record("1", "zzz", "https://ya3.ru"),
        ])
        .await
        .unwrap();

    fixture
        .storage
        .delete_urls(vec![
            DeletionEntry::new("1", handle("xxx")),
            DeletionEntry::new("1", handle("yyy")),
            DeletionEntry::new("2", handle("zzz")),
            DeletionEntry::new("1", handle("missing")),
        ])
        .await
        .unwrap();

    let remaining = fixture.storage.get_urls_by_owner("1").await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].handle.as_str(), "zzz");

    let deleted = fixture.storage.get_url(&handle("xxx")).await.unwrap();
    assert!(deleted.deleted);
}

#[tokio::test]
async fn stats_alive_and_close() {
    let fixture = Fixture::start().await;

    fixture
        .storage
        .batch_save_urls(vec![
            record("1", "xxx", "https://ya.ru"),
            record("1", "yyy", "https://ya2.ru"),
            record("2", "zzz", "https://ya3.ru"),
        ])
        .await
        .unwrap();
    fixture
        .storage
        .delete_urls(vec![DeletionEntry::new("2", handle("zzz"))])
        .await
        .unwrap();

    assert_eq!(
        fixture.storage.stats().await.unwrap(),
        Stats { owners: 2, urls: 3 }
    );
    assert!(fixture.storage.is_alive().await.unwrap());

    fixture.storage.close().await.unwrap();
    fixture.storage.close().await.unwrap();
    assert!(fixture.storage.is_alive().await.is_err());
}

#[tokio::test]
async fn migrate_is_idempotent() {
    let fixture = Fixture::start().await;

    fixture.storage.migrate().await.unwrap();
    fixture.storage.migrate().await.unwrap();
}
