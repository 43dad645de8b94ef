//! Library circulation server
//!
//! A REST JSON API over a small library: a book catalog with an approval gate
//! for visitor submissions, a member registry, and a borrow/return workflow
//! with a flat per-day late fee.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn repository::LibraryStore>) -> Self {
        let services = services::Services::new(store, config.library.clone());
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
