//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and truncate the log between
//! tests, so they are marked `#[serial]`. Run with:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration
//! ```

use std::sync::Arc;

use event_store::{
    AggregateId, AppendOptions, AppendRequest, EventEnvelope, EventQuery, EventStore,
    EventStoreError, EventStoreExt, PostgresEventStore, Tag, TagGuard, Version,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_events_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresEventStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE events")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventStore::new(pool)
}

fn create_test_event(
    aggregate_id: AggregateId,
    version: Version,
    event_type: &str,
) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Booking")
        .event_type(event_type)
        .version(version)
        .payload_raw(serde_json::json!({"test": true}))
        .build()
        .unwrap()
}

fn tagged_event(aggregate_id: AggregateId, tags: &[&str]) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Booking")
        .event_type("BookingCreated")
        .version(Version::first())
        .payload_raw(serde_json::json!({}))
        .tags(tags.iter().map(|t| Tag::from_raw(*t)))
        .build()
        .unwrap()
}

#[tokio::test]
#[serial]
async fn append_and_retrieve_events() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    let event = create_test_event(aggregate_id, Version::first(), "BookingCreated");
    let version = store
        .append(vec![event], AppendOptions::expect_new())
        .await
        .unwrap();
    assert_eq!(version, Version::first());

    let events = store.get_events_for_aggregate(aggregate_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "BookingCreated");
}

#[tokio::test]
#[serial]
async fn optimistic_concurrency_conflict() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    store
        .append(
            vec![create_test_event(aggregate_id, Version::first(), "BookingCreated")],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    let result = store
        .append(
            vec![create_test_event(aggregate_id, Version::first(), "BookingCreated")],
            AppendOptions::expect_new(),
        )
        .await;

    assert!(matches!(
        result,
        Err(EventStoreError::ConcurrencyConflict { .. })
    ));
}

#[tokio::test]
#[serial]
async fn unique_constraint_catches_unchecked_duplicates() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    store
        .append(
            vec![create_test_event(aggregate_id, Version::first(), "E1")],
            AppendOptions::new(),
        )
        .await
        .unwrap();

    let result = store
        .append(
            vec![create_test_event(aggregate_id, Version::first(), "E1")],
            AppendOptions::new(),
        )
        .await;

    assert!(matches!(
        result,
        Err(EventStoreError::ConcurrencyConflict { .. })
    ));
}

#[tokio::test]
#[serial]
async fn failed_batch_leaves_no_trace() {
    let store = get_test_store().await;
    let cart_item = AggregateId::new();
    store
        .append(
            vec![create_test_event(cart_item, Version::first(), "CartItemAdded")],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    let booking = AggregateId::new();
    let result = store
        .append_batch(vec![
            AppendRequest::new(
                vec![create_test_event(booking, Version::first(), "BookingCreated")],
                AppendOptions::expect_new(),
            ),
            AppendRequest::new(
                vec![create_test_event(cart_item, Version::first(), "CartItemCheckedOut")],
                AppendOptions::expect_new(),
            ),
        ])
        .await;

    assert!(result.is_err());
    assert!(!store.aggregate_exists(booking).await.unwrap());
}

#[tokio::test]
#[serial]
async fn tags_round_trip_and_filter() {
    let store = get_test_store().await;
    let first = AggregateId::new();
    let second = AggregateId::new();

    store
        .append(
            vec![tagged_event(first, &["service:a", "party:x"])],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();
    store
        .append(
            vec![tagged_event(second, &["service:b", "party:x"])],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    let by_party = store
        .query_events(EventQuery::tagged("Booking", Tag::from_raw("party:x")))
        .await
        .unwrap();
    let ids: Vec<_> = by_party.iter().map(|e| e.aggregate_id).collect();
    assert_eq!(ids, vec![first, second]);

    let by_service = store
        .query_events(EventQuery::new().tag(Tag::from_raw("service:a")))
        .await
        .unwrap();
    assert_eq!(by_service.len(), 1);
    assert!(by_service[0].has_tag(&Tag::from_raw("party:x")));

    assert_eq!(
        store.count_tagged(&Tag::from_raw("party:x")).await.unwrap(),
        2
    );
}

#[tokio::test]
#[serial]
async fn guard_rejects_after_new_reference() {
    let store = get_test_store().await;
    let tag = Tag::from_raw("service:guarded");

    let seen = store.count_tagged(&tag).await.unwrap();
    assert_eq!(seen, 0);

    store
        .append(
            vec![tagged_event(AggregateId::new(), &["service:guarded"])],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    let result = store
        .append(
            vec![create_test_event(AggregateId::new(), Version::first(), "Deleted")],
            AppendOptions::expect_new().with_guard(TagGuard::new(tag, seen)),
        )
        .await;

    assert!(matches!(result, Err(EventStoreError::GuardViolated { .. })));
}

#[tokio::test]
#[serial]
async fn concurrent_first_writes_admit_one() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    let a = store.append(
        vec![create_test_event(aggregate_id, Version::first(), "A")],
        AppendOptions::expect_new(),
    );
    let b = store.append(
        vec![create_test_event(aggregate_id, Version::first(), "B")],
        AppendOptions::expect_new(),
    );
    let (a, b) = tokio::join!(a, b);

    assert!(a.is_ok() ^ b.is_ok());
    assert_eq!(
        store.get_events_for_aggregate(aggregate_id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
#[serial]
async fn stream_all_events_in_commit_order() {
    use futures_util::StreamExt;

    let store = get_test_store().await;
    let ids = [AggregateId::new(), AggregateId::new(), AggregateId::new()];
    for id in ids {
        store
            .append(
                vec![create_test_event(id, Version::first(), "E")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();
    }

    let stream = store.stream_all_events().await.unwrap();
    let events: Vec<_> = stream.collect().await;
    let streamed: Vec<_> = events
        .into_iter()
        .map(|e| e.unwrap().aggregate_id)
        .collect();
    assert_eq!(streamed, ids.to_vec());
}

#[tokio::test]
#[serial]
async fn event_metadata_preserved() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    let event = EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Booking")
        .event_type("StatusChanged")
        .version(Version::first())
        .payload_raw(serde_json::json!({}))
        .metadata("actor_role", serde_json::json!("provider"))
        .build()
        .unwrap();

    store
        .append(vec![event], AppendOptions::expect_new())
        .await
        .unwrap();

    let events = store.get_events_for_aggregate(aggregate_id).await.unwrap();
    assert_eq!(
        events[0].metadata.get("actor_role"),
        Some(&serde_json::json!("provider"))
    );
}
