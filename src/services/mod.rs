//! Business logic services

pub mod catalog;
pub mod clock;
pub mod guard;
pub mod lending;

use std::sync::Arc;

use crate::{config::LendingConfig, error::AppResult, repository::LedgerStore};

use clock::{Clock, SystemClock};
use lending::RetryPolicy;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub lending: lending::LendingService,
    store: Arc<dyn LedgerStore>,
}

impl Services {
    /// Create all services on top of one ledger store
    pub fn new(store: Arc<dyn LedgerStore>, lending_config: &LendingConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), RetryPolicy::from(lending_config))
    }

    pub fn with_clock(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            catalog: catalog::CatalogService::new(store.clone()),
            lending: lending::LendingService::new(store.clone(), clock, retry),
            store,
        }
    }

    /// Check that the ledger store answers
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
