//! Property tests: arbitrary operation sequences keep the ledgers balanced

use proptest::prelude::*;

use lending_server::{models::Item, services::Services, AppError};

use crate::common::{memory_services, seed_item};

#[derive(Debug, Clone)]
enum Op {
    Borrow { item: usize, borrower_id: i32 },
    /// Return the n-th loan ever opened (may already be closed)
    Return { nth: usize },
    Delete { item: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..3usize, 1..5i32).prop_map(|(item, borrower_id)| Op::Borrow { item, borrower_id }),
        3 => (0..16usize).prop_map(|nth| Op::Return { nth }),
        1 => (0..3usize).prop_map(|item| Op::Delete { item }),
    ]
}

/// Apply `ops` and track the expected stock of each live item
async fn run(services: &Services, stocks: &[i32], ops: &[Op]) -> Result<(), TestCaseError> {
    let mut items: Vec<Item> = Vec::new();
    for (i, stock) in stocks.iter().enumerate() {
        items.push(seed_item(services, &format!("P-{}", i), *stock).await);
    }
    let mut expected: Vec<Option<i32>> = stocks.iter().copied().map(Some).collect();
    let mut loans: Vec<(i32, usize)> = Vec::new();
    let mut open: Vec<bool> = Vec::new();

    for op in ops {
        match *op {
            Op::Borrow { item, borrower_id } => {
                let result = services.lending.borrow(items[item].id, borrower_id).await;
                match (expected[item], result) {
                    (Some(stock), Ok(receipt)) => {
                        prop_assert!(stock > 0);
                        prop_assert_eq!(receipt.remaining_stock, stock - 1);
                        expected[item] = Some(stock - 1);
                        loans.push((receipt.loan.id, item));
                        open.push(true);
                    }
                    (Some(stock), Err(AppError::OutOfStock { .. })) => {
                        prop_assert_eq!(stock, 0);
                    }
                    (None, Err(AppError::ItemNotFound { .. })) => {}
                    (state, other) => {
                        return Err(TestCaseError::fail(format!(
                            "borrow on {:?} gave {:?}",
                            state, other
                        )))
                    }
                }
            }
            Op::Return { nth } => {
                let Some(&(loan_id, item)) = loans.get(nth) else {
                    continue;
                };
                let result = services.lending.return_loan(loan_id).await;
                match result {
                    Ok(receipt) => {
                        prop_assert!(open[nth]);
                        let stock = expected[item].unwrap_or_default() + 1;
                        prop_assert_eq!(receipt.stock, stock);
                        expected[item] = Some(stock);
                        open[nth] = false;
                    }
                    Err(AppError::NoOpenLoanFound { .. }) => {
                        prop_assert!(!open[nth]);
                    }
                    Err(e) => return Err(TestCaseError::fail(format!("return failed: {}", e))),
                }
            }
            Op::Delete { item } => {
                let result = services.lending.delete_item(items[item].id).await;
                let outstanding = loans
                    .iter()
                    .zip(&open)
                    .filter(|((_, i), is_open)| *i == item && **is_open)
                    .count();
                match result {
                    Ok(_) => {
                        prop_assert!(expected[item].is_some());
                        prop_assert_eq!(outstanding, 0);
                        expected[item] = None;
                    }
                    Err(AppError::HasOutstandingLoans { open_loans, .. }) => {
                        prop_assert_eq!(open_loans as usize, outstanding);
                    }
                    Err(AppError::ItemNotFound { .. }) => {
                        prop_assert!(expected[item].is_none());
                    }
                    Err(e) => return Err(TestCaseError::fail(format!("delete failed: {}", e))),
                }
            }
        }
    }

    for (item, stock) in items.iter().zip(&expected) {
        match (stock, services.catalog.audit_item(item.id).await) {
            (Some(stock), Ok(audit)) => {
                prop_assert!(audit.consistent);
                prop_assert_eq!(audit.stock, *stock);
            }
            (None, Err(AppError::ItemNotFound { .. })) => {}
            (stock, other) => {
                return Err(TestCaseError::fail(format!(
                    "final audit for {:?} gave {:?}",
                    stock, other
                )))
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    #[test]
    fn ledgers_stay_balanced(
        stocks in prop::collection::vec(0..4i32, 3),
        ops in prop::collection::vec(op_strategy(), 0..40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let services = memory_services();
            run(&services, &stocks, &ops).await
        })?;
    }
}
