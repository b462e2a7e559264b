use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use propledger_core::{EntityKind, TenantId};
use propledger_ledger::{AppSettings, AuditEntry, AuditFilter};

use super::{LedgerStore, StoreError, StoredRow, UnitOfWork};

/// Everything one tenant owns.
#[derive(Debug, Clone, Default)]
struct TenantTables {
    rows: HashMap<EntityKind, BTreeMap<Uuid, StoredRow>>,
    audit: Vec<AuditEntry>,
    settings: Option<AppSettings>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Units for the same tenant are serialized by a
/// per-tenant async mutex; each unit works on a private copy of the tenant's
/// tables that replaces the shared state only on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    tenants: Arc<RwLock<HashMap<TenantId, Arc<Mutex<TenantTables>>>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tenant(&self, tenant_id: TenantId) -> Result<Arc<Mutex<TenantTables>>, StoreError> {
        let poisoned = || StoreError::Backend {
            operation: "begin",
            message: "lock poisoned".to_string(),
        };

        if let Some(existing) = self.tenants.read().map_err(|_| poisoned())?.get(&tenant_id) {
            return Ok(existing.clone());
        }
        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;
        Ok(tenants.entry(tenant_id).or_default().clone())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Tx = InMemoryUnit;

    async fn begin(&self, tenant_id: TenantId) -> Result<InMemoryUnit, StoreError> {
        let guard = self.tenant(tenant_id)?.lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryUnit {
            tenant_id,
            guard,
            working,
        })
    }
}

/// An open in-memory unit. Dropping it without `commit` discards its writes.
pub struct InMemoryUnit {
    tenant_id: TenantId,
    guard: OwnedMutexGuard<TenantTables>,
    working: TenantTables,
}

impl InMemoryUnit {
    fn table(&mut self, kind: EntityKind) -> &mut BTreeMap<Uuid, StoredRow> {
        self.working.rows.entry(kind).or_default()
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnit {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    async fn fetch(&mut self, kind: EntityKind, id: Uuid) -> Result<Option<StoredRow>, StoreError> {
        Ok(self.table(kind).get(&id).cloned())
    }

    async fn fetch_all(&mut self, kind: EntityKind, include_deleted: bool) -> Result<Vec<StoredRow>, StoreError> {
        Ok(self
            .table(kind)
            .values()
            .filter(|row| include_deleted || row.is_active())
            .cloned()
            .collect())
    }

    async fn insert_row(&mut self, kind: EntityKind, id: Uuid, data: JsonValue) -> Result<(), StoreError> {
        let table = self.table(kind);
        if table.contains_key(&id) {
            return Err(StoreError::Duplicate { kind, id });
        }
        table.insert(
            id,
            StoredRow {
                id,
                data,
                deleted_at: None,
            },
        );
        Ok(())
    }

    async fn write_row(
        &mut self,
        kind: EntityKind,
        id: Uuid,
        data: JsonValue,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.table(kind).insert(id, StoredRow { id, data, deleted_at });
        Ok(())
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.working.audit.push(entry.clone());
        Ok(())
    }

    async fn audit_entries(&mut self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        Ok(filter.select(&self.working.audit))
    }

    async fn load_settings(&mut self) -> Result<Option<AppSettings>, StoreError> {
        Ok(self.working.settings.clone())
    }

    async fn store_settings(&mut self, settings: &AppSettings) -> Result<(), StoreError> {
        self.working.settings = Some(settings.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
