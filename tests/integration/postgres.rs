//! Tests against a live PostgreSQL database.
//!
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinSet;
use uuid::Uuid;

use lending_server::{repository::PgStore, services::Services, AppError};

use crate::common::{assert_consistent, seed_item, services_on};

async fn pg_services() -> Services {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    let store = PgStore::new(pool, Duration::from_secs(2));
    store.migrate().await.expect("Failed to run migrations");
    services_on(Arc::new(store))
}

fn unique_code() -> String {
    Uuid::new_v4().simple().to_string()[..20].to_string()
}

#[tokio::test]
#[ignore]
async fn test_pg_lifecycle() {
    let services = pg_services().await;
    let item = seed_item(&services, &unique_code(), 1).await;

    let loan = services.lending.borrow(item.id, 7).await.unwrap().loan;
    assert!(matches!(
        services.lending.borrow(item.id, 8).await,
        Err(AppError::OutOfStock { .. })
    ));
    assert!(matches!(
        services.lending.delete_item(item.id).await,
        Err(AppError::HasOutstandingLoans { open_loans: 1, .. })
    ));

    services.lending.return_loan(loan.id).await.unwrap();
    assert!(matches!(
        services.lending.return_loan(loan.id).await,
        Err(AppError::NoOpenLoanFound { already_returned: true, .. })
    ));
    assert_consistent(&services, item.id).await;

    let report = services.lending.delete_item(item.id).await.unwrap();
    assert_eq!(report.loans_removed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_pg_concurrent_borrows() {
    let services = Arc::new(pg_services().await);
    let item_id = seed_item(&services, &unique_code(), 3).await.id;

    let mut tasks = JoinSet::new();
    for borrower_id in 1..=12 {
        let services = services.clone();
        tasks.spawn(async move { services.lending.borrow(item_id, borrower_id).await });
    }

    let mut granted = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => granted += 1,
            Err(AppError::OutOfStock { .. }) => {}
            Err(e) => panic!("unexpected failure: {}", e),
        }
    }

    assert_eq!(granted, 3);
    assert_consistent(&services, item_id).await;
}
