//! Process configuration loaded from the environment.

use std::net::SocketAddr;

use tracing::{info, warn};

use crate::store::{AnyLedgerStore, InMemoryLedgerStore, PostgresLedgerStore, StoreError};

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Postgres connection string; the in-memory store is used when unset.
    pub database_url: Option<String>,
    /// Apply the embedded schema on boot.
    pub run_migrations: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            database_url: None,
            run_migrations: false,
        }
    }
}

impl ServiceConfig {
    /// Read `PROPLEDGER_BIND`, `JWT_SECRET`, `DATABASE_URL` and `PROPLEDGER_MIGRATE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let bind = lookup("PROPLEDGER_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind.parse().unwrap_or_else(|_| {
            warn!(value = %bind, "PROPLEDGER_BIND is not a socket address; using {DEFAULT_BIND}");
            defaults.bind_addr
        });

        let jwt_secret = lookup("JWT_SECRET").filter(|s| !s.is_empty()).unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            defaults.jwt_secret
        });

        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());

        let run_migrations = lookup("PROPLEDGER_MIGRATE")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            bind_addr,
            jwt_secret,
            database_url,
            run_migrations,
        }
    }

    /// Build the configured store backend.
    pub async fn connect_store(&self) -> Result<AnyLedgerStore, StoreError> {
        match &self.database_url {
            Some(url) => {
                let store = PostgresLedgerStore::connect(url).await?;
                if self.run_migrations {
                    store.migrate().await?;
                }
                info!("using postgres ledger store");
                Ok(AnyLedgerStore::Postgres(store))
            }
            None => {
                info!("DATABASE_URL not set; using in-memory ledger store");
                Ok(AnyLedgerStore::InMemory(InMemoryLedgerStore::new()))
            }
        }
    }
}
