//! Business logic services

pub mod catalog;
pub mod fees;
pub mod loans;
pub mod members;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::{config::LibraryConfig, repository::LibraryStore};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub loans: loans::LoansService,
    store: Arc<dyn LibraryStore>,
}

impl Services {
    /// Create all services over the given store
    pub fn new(store: Arc<dyn LibraryStore>, config: LibraryConfig) -> Self {
        let members = members::MembersService::new(store.clone());
        Self {
            catalog: catalog::CatalogService::new(store.clone(), config.clone()),
            loans: loans::LoansService::new(store.clone(), members.clone(), config),
            members,
            store,
        }
    }

    /// Verify the store answers
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        self.store.ping().await
    }
}

/// Current calendar day (UTC)
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Trimmed copy, `None` when blank
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
