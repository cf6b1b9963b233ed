// tests/accounts.rs
mod common;

use common::{fast_coordinator, insert_account, requirements, setup_db};

use accountpool::pool::{AccountUpdate, AccountsRepo, DeleteAccount, NewAccount};
use serial_test::serial;

fn new_account(email: &str, role: &str) -> NewAccount {
    NewAccount {
        email: email.to_string(),
        password: "changeme".to_string(),
        role: role.to_string(),
        tenant: Some("acme".to_string()),
        domain: None,
        tags: None,
    }
}

#[tokio::test]
#[serial]
async fn create_and_list_with_filters() {
    let pool = setup_db().await;
    let repo = AccountsRepo::new(pool.clone());

    repo.create(new_account("c1@t", "client")).await.unwrap();
    repo.create(new_account("c2@t", "client")).await.unwrap();
    repo.create(new_account("v1@t", "vendor")).await.unwrap();

    let clients = repo.list(Some("client"), None, None, 100, 0).await.unwrap();
    assert_eq!(clients.len(), 2);
    assert!(clients.iter().all(|a| a.role == "client"));

    let all = repo.list(None, None, None, 100, 0).await.unwrap();
    assert_eq!(all.len(), 3);

    let leased = repo.list(None, Some(true), None, 100, 0).await.unwrap();
    assert!(leased.is_empty());
}

#[tokio::test]
#[serial]
async fn duplicate_email_is_a_unique_violation() {
    let pool = setup_db().await;
    let repo = AccountsRepo::new(pool.clone());

    repo.create(new_account("dup@t", "client")).await.unwrap();

    let err = repo
        .create(new_account("dup@t", "vendor"))
        .await
        .expect_err("duplicate email must be rejected");

    let is_unique = matches!(
        err.as_database_error().map(|db| db.kind()),
        Some(sqlx::error::ErrorKind::UniqueViolation)
    );
    assert!(is_unique, "expected a unique violation, got {err:?}");
}

#[tokio::test]
#[serial]
async fn partial_update_touches_only_given_fields() {
    let pool = setup_db().await;
    let repo = AccountsRepo::new(pool.clone());

    let created = repo.create(new_account("u1@t", "client")).await.unwrap();

    let updated = repo
        .update(
            created.id,
            AccountUpdate {
                is_healthy: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .expect("account exists");

    assert!(!updated.is_healthy);
    assert_eq!(updated.email, "u1@t");
    assert_eq!(updated.role, "client");
    assert_eq!(updated.tenant.as_deref(), Some("acme"));
}

#[tokio::test]
#[serial]
async fn leased_account_cannot_be_deleted_until_released() {
    let pool = setup_db().await;
    let repo = AccountsRepo::new(pool.clone());
    let coordinator = fast_coordinator(&pool);

    let id = insert_account(&pool, "locked@t", "client", true).await;

    coordinator
        .acquire("holder", &requirements(&[("client", 1)]), Some(10))
        .await
        .unwrap();

    match repo.delete(id).await.unwrap() {
        DeleteAccount::StillLeased { leased_by } => assert_eq!(leased_by, "holder"),
        other => panic!("expected StillLeased, got {other:?}"),
    }

    coordinator.release("holder").await.unwrap();

    assert!(matches!(
        repo.delete(id).await.unwrap(),
        DeleteAccount::Deleted
    ));
    assert!(matches!(
        repo.delete(id).await.unwrap(),
        DeleteAccount::NotFound
    ));
}

#[tokio::test]
#[serial]
async fn detailed_availability_and_status_count_correctly() {
    let pool = setup_db().await;
    let repo = AccountsRepo::new(pool.clone());
    let coordinator = fast_coordinator(&pool);

    insert_account(&pool, "c1@t", "client", true).await;
    insert_account(&pool, "c2@t", "client", true).await;
    insert_account(&pool, "v1@t", "vendor", false).await;

    coordinator
        .acquire("holder", &requirements(&[("client", 1)]), Some(10))
        .await
        .unwrap();

    let detailed = repo.availability_detailed().await.unwrap();
    // Unhealthy vendor is excluded entirely.
    assert_eq!(detailed.len(), 1);
    assert_eq!(detailed[0].role, "client");
    assert_eq!(detailed[0].total_count, 2);
    assert_eq!(detailed[0].leased_count, 1);
    assert_eq!(detailed[0].available_count, 1);

    let status = repo.status().await.unwrap();
    assert_eq!(status.total_accounts, 3);
    assert_eq!(status.available_accounts, 1);
    assert_eq!(status.leased_accounts, 1);
    assert_eq!(status.unhealthy_accounts, 1);
    assert_eq!(status.active_executions, 1);

    let availability = coordinator.availability().await.unwrap();
    assert_eq!(availability.get("client"), Some(&1));
    assert_eq!(availability.get("vendor"), None);
}
