// tests/fairness.rs
mod common;

use common::{fast_coordinator, insert_account, requirements, setup_db};

use serial_test::serial;
use std::collections::HashSet;

#[tokio::test]
#[serial]
async fn never_leased_accounts_are_handed_out_before_recycled_ones() {
    let pool = setup_db().await;
    let coordinator = fast_coordinator(&pool);

    for i in 0..3 {
        insert_account(&pool, &format!("client{i}@t"), "client", true).await;
    }

    let first = coordinator
        .acquire("warmup", &requirements(&[("client", 1)]), Some(10))
        .await
        .unwrap();
    let recycled_id = first[0].id;
    coordinator.release("warmup").await.unwrap();

    // Two fresh accounts remain; the recycled one now has a leased_at and
    // must sort after them.
    let second = coordinator
        .acquire("fresh", &requirements(&[("client", 2)]), Some(10))
        .await
        .unwrap();

    let ids: HashSet<i64> = second.iter().map(|a| a.id).collect();
    assert!(
        !ids.contains(&recycled_id),
        "recycled account was preferred over never-leased ones"
    );
}

#[tokio::test]
#[serial]
async fn least_recently_leased_account_is_preferred() {
    let pool = setup_db().await;
    let coordinator = fast_coordinator(&pool);

    let old = insert_account(&pool, "old@t", "client", true).await;
    let recent = insert_account(&pool, "recent@t", "client", true).await;

    // Both unleased, with distinct lease history.
    sqlx::query("UPDATE pool_accounts SET leased_at = now() - interval '3 hours' WHERE id = $1")
        .bind(old)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE pool_accounts SET leased_at = now() - interval '1 hour' WHERE id = $1")
        .bind(recent)
        .execute(&pool)
        .await
        .unwrap();

    let got = coordinator
        .acquire("lru", &requirements(&[("client", 1)]), Some(10))
        .await
        .unwrap();

    assert_eq!(got[0].id, old, "expected the least-recently-leased account");
}

#[tokio::test]
#[serial]
async fn rotation_covers_the_whole_pool_when_releases_occur() {
    let pool = setup_db().await;
    let coordinator = fast_coordinator(&pool);

    for i in 0..3 {
        insert_account(&pool, &format!("client{i}@t"), "client", true).await;
    }

    // Acquire/release single accounts repeatedly; over one full cycle every
    // account must be used before any repeats.
    let mut seen = HashSet::new();
    for round in 0..3 {
        let exec_id = format!("rotation-{round}");
        let got = coordinator
            .acquire(&exec_id, &requirements(&[("client", 1)]), Some(10))
            .await
            .unwrap();
        seen.insert(got[0].id);
        coordinator.release(&exec_id).await.unwrap();
    }

    assert_eq!(seen.len(), 3, "an account was starved within one rotation");
}
