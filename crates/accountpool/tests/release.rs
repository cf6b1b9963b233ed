// tests/release.rs
mod common;

use common::{fast_coordinator, insert_account, requirements, setup_db};

use serial_test::serial;
use sqlx::PgPool;

async fn execution_status(pool: &PgPool, id: &str) -> (String, bool) {
    sqlx::query_as::<_, (String, bool)>(
        "SELECT status, completed_at IS NOT NULL FROM executions WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
#[serial]
async fn release_returns_lease_count_then_zero() {
    let pool = setup_db().await;
    let coordinator = fast_coordinator(&pool);

    for i in 0..2 {
        insert_account(&pool, &format!("client{i}@t"), "client", true).await;
    }
    insert_account(&pool, "vendor0@t", "vendor", true).await;

    coordinator
        .acquire("r1", &requirements(&[("client", 2), ("vendor", 1)]), Some(10))
        .await
        .unwrap();

    assert_eq!(coordinator.release("r1").await.unwrap(), 3);
    assert_eq!(coordinator.release("r1").await.unwrap(), 0);

    let (status, completed_at_set) = execution_status(&pool, "r1").await;
    assert_eq!(status, "completed");
    assert!(completed_at_set);
}

#[tokio::test]
#[serial]
async fn release_of_unknown_execution_returns_zero() {
    let pool = setup_db().await;
    let coordinator = fast_coordinator(&pool);

    assert_eq!(coordinator.release("never-created").await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn release_does_not_resurrect_a_failed_execution() {
    let pool = setup_db().await;
    let coordinator = fast_coordinator(&pool);

    insert_account(&pool, "client0@t", "client", true).await;

    coordinator
        .acquire("r2", &requirements(&[("client", 2)]), Some(1))
        .await
        .expect_err("pool is too small, acquisition must fail");

    let (status, _) = execution_status(&pool, "r2").await;
    assert_eq!(status, "failed");

    assert_eq!(coordinator.release("r2").await.unwrap(), 0);

    // FAILED is terminal.
    let (status, _) = execution_status(&pool, "r2").await;
    assert_eq!(status, "failed");
}

#[tokio::test]
#[serial]
async fn releases_of_distinct_executions_are_independent() {
    let pool = setup_db().await;
    let coordinator = fast_coordinator(&pool);

    for i in 0..4 {
        insert_account(&pool, &format!("client{i}@t"), "client", true).await;
    }

    coordinator
        .acquire("a", &requirements(&[("client", 2)]), Some(10))
        .await
        .unwrap();
    coordinator
        .acquire("b", &requirements(&[("client", 2)]), Some(10))
        .await
        .unwrap();

    assert_eq!(coordinator.release("a").await.unwrap(), 2);

    // b's lease survives a's release.
    let still_leased: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pool_accounts WHERE leased_by = 'b'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(still_leased, 2);

    assert_eq!(coordinator.release("b").await.unwrap(), 2);
    assert_eq!(coordinator.release("a").await.unwrap(), 0);
}
