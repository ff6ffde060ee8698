//! End-to-end lending scenarios on the in-memory store

use lending_server::{
    models::{LoanStatus, UpdateItem},
    AppError, ErrorKind,
};

use crate::common::{assert_consistent, memory_services, seed_item};

#[tokio::test]
async fn test_single_copy_lifecycle() {
    let services = memory_services();
    let item = seed_item(&services, "9787020002207", 1).await;

    let first = services.lending.borrow(item.id, 7).await.unwrap();
    assert_eq!(first.remaining_stock, 0);
    assert_eq!(first.loan.status, LoanStatus::Open);
    assert_eq!(services.catalog.get_item(item.id).await.unwrap().stock, 0);

    let refused = services.lending.borrow(item.id, 8).await.unwrap_err();
    assert!(matches!(refused, AppError::OutOfStock { item_id } if item_id == item.id));
    assert_eq!(refused.kind(), ErrorKind::BusinessRule);
    assert_eq!(services.catalog.get_item(item.id).await.unwrap().stock, 0);
    assert!(services.catalog.borrower_loans(8, false).await.unwrap().is_empty());

    let returned = services.lending.return_loan(first.loan.id).await.unwrap();
    assert_eq!(returned.stock, 1);
    assert_eq!(returned.loan.status, LoanStatus::Closed);
    assert!(returned.loan.closed_at.is_some());
    assert_consistent(&services, item.id).await;

    let report = services.lending.delete_item(item.id).await.unwrap();
    assert_eq!(report.loans_removed, 1);
    assert!(matches!(
        services.catalog.get_item(item.id).await,
        Err(AppError::ItemNotFound { .. })
    ));
}

#[tokio::test]
async fn test_delete_waits_for_outstanding_loans() {
    let services = memory_services();
    let item = seed_item(&services, "9787544253994", 2).await;

    let loan = services.lending.borrow(item.id, 3).await.unwrap().loan;

    let refused = services.lending.delete_item(item.id).await.unwrap_err();
    assert!(matches!(
        refused,
        AppError::HasOutstandingLoans { open_loans: 1, .. }
    ));
    let untouched = services.catalog.get_item(item.id).await.unwrap();
    assert_eq!(untouched.stock, 1);
    assert_eq!(services.catalog.borrower_loans(3, true).await.unwrap().len(), 1);

    services.lending.return_loan(loan.id).await.unwrap();
    let report = services.lending.delete_item(item.id).await.unwrap();
    assert_eq!(report.loans_removed, 1);
    assert!(services.catalog.borrower_loans(3, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_double_return_credits_stock_once() {
    let services = memory_services();
    let item = seed_item(&services, "9787532736928", 3).await;

    let loan = services.lending.borrow(item.id, 1).await.unwrap().loan;
    services.lending.return_loan(loan.id).await.unwrap();

    let again = services.lending.return_loan(loan.id).await.unwrap_err();
    assert!(matches!(
        again,
        AppError::NoOpenLoanFound { already_returned: true, .. }
    ));
    assert_eq!(again.kind(), ErrorKind::NotFound);
    assert_eq!(services.catalog.get_item(item.id).await.unwrap().stock, 3);
    assert_consistent(&services, item.id).await;
}

#[tokio::test]
async fn test_unknown_references() {
    let services = memory_services();

    assert!(matches!(
        services.lending.borrow(404, 1).await,
        Err(AppError::ItemNotFound { item_id: 404 })
    ));
    assert!(matches!(
        services.lending.return_loan(404).await,
        Err(AppError::NoOpenLoanFound { already_returned: false, .. })
    ));
    assert!(matches!(
        services.lending.delete_item(404).await,
        Err(AppError::ItemNotFound { item_id: 404 })
    ));
}

#[tokio::test]
async fn test_borrower_history_order_and_filter() {
    let services = memory_services();
    let a = seed_item(&services, "A-1", 1).await;
    let b = seed_item(&services, "B-1", 1).await;

    let first = services.lending.borrow(a.id, 5).await.unwrap().loan;
    let second = services.lending.borrow(b.id, 5).await.unwrap().loan;
    services.lending.return_loan(first.id).await.unwrap();

    let all = services.catalog.borrower_loans(5, false).await.unwrap();
    assert_eq!(
        all.iter().map(|l| l.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
    assert_eq!(all[0].item_code, "B-1");

    let open = services.catalog.borrower_loans(5, true).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, second.id);
}

#[tokio::test]
async fn test_catalog_edits_keep_stock() {
    let services = memory_services();
    let item = seed_item(&services, "C-1", 2).await;
    seed_item(&services, "C-2", 1).await;
    services.lending.borrow(item.id, 9).await.unwrap();

    let updated = services
        .catalog
        .update_item(
            item.id,
            UpdateItem {
                title: Some("Renamed".to_string()),
                author: Some("Octavia E. Butler".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.author, "Octavia E. Butler");
    assert_eq!(updated.category, "fiction");
    assert_eq!(updated.stock, 1);
    assert_eq!(updated.total_stock, 2);

    let clash = services
        .catalog
        .update_item(
            item.id,
            UpdateItem {
                code: Some("C-2".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(clash, Err(AppError::Conflict(_))));
    assert_consistent(&services, item.id).await;
}
