//! Server configuration from command line flags and environment

use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "dispatch")]
#[command(about = "Delivery delay tracking server", long_about = None)]
pub struct Config {
    /// Database connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:dispatch.db?mode=rwc")]
    pub database_url: String,

    /// Address to listen on
    #[arg(long, env = "DISPATCH_BIND", default_value = "0.0.0.0:3000")]
    pub bind: String,

    /// Size of the database connection pool
    #[arg(long, env = "DISPATCH_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Courier estimate endpoint called when an in-transit order is late
    #[arg(long, env = "ETA_URL")]
    pub eta_url: Option<String>,

    /// Upper bound on the estimate call, in milliseconds
    #[arg(long, env = "ETA_TIMEOUT_MS", default_value_t = 5000)]
    pub eta_timeout_ms: u64,
}

impl Config {
    pub fn eta_timeout(&self) -> Duration {
        Duration::from_millis(self.eta_timeout_ms)
    }
}
