//! Dispatch server - delivery delay tracking and agent resolution queue

pub mod api;
pub mod config;
pub mod delay;
pub mod error;
pub mod eta;
pub mod models;
pub mod store;

use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState {
    pub store: store::Store,
    pub eta: Option<eta::EtaClient>,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Arc<Self> {
        Self::with_eta(pool, None)
    }

    pub fn with_eta(pool: SqlitePool, eta: Option<eta::EtaClient>) -> Arc<Self> {
        Arc::new(Self {
            store: store::Store::new(pool),
            eta,
        })
    }
}
