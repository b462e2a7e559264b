//! Tenant-scoped unit-of-work storage.
//!
//! Every ledger operation runs inside one unit: `begin` → reads and writes →
//! `commit`. Dropping a unit without committing discards all of its writes, so
//! a failure half-way through an operation never leaves a partial balance
//! change behind.
//!
//! Backends only deal in raw rows (`EntityKind`, id, JSON document, deletion
//! marker). The typed helpers on [`UnitOfWork`] translate to and from domain
//! records and enforce the soft-delete read rules:
//!
//! - `get` / `list` only ever return active records;
//! - `get_any` / `list_any` return the tagged [`Lifecycle`] for trash views;
//! - `update` and `soft_delete` refuse rows that are already deleted.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use propledger_core::{Entity, EntityKind, Lifecycle, TenantId};
use propledger_ledger::{AppSettings, AuditEntry, AuditFilter};

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryLedgerStore, InMemoryUnit};
pub use postgres::{PostgresLedgerStore, PostgresUnit};

/// One persisted row as backends see it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: Uuid,
    pub data: JsonValue,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StoredRow {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    fn decode<T: Entity>(self) -> Result<Lifecycle<T>, StoreError> {
        let record: T = serde_json::from_value(self.data).map_err(|e| {
            StoreError::Serialization(format!("{} {}: {e}", T::KIND, self.id))
        })?;
        Ok(match self.deleted_at {
            None => Lifecycle::active(record),
            Some(at) => Lifecycle::deleted(record, at),
        })
    }
}

fn encode<T: Entity>(record: &T) -> Result<JsonValue, StoreError> {
    serde_json::to_value(record)
        .map_err(|e| StoreError::Serialization(format!("{} {}: {e}", T::KIND, record.id())))
}

/// Storage failure.
///
/// These are infrastructure errors, as opposed to the domain's validation and
/// invariant errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} already exists")]
    Duplicate { kind: EntityKind, id: Uuid },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("concurrent write detected: {0}")]
    Concurrency(String),

    #[error("database error in {operation}: {message}")]
    Backend { operation: &'static str, message: String },
}

/// Opens units of work for a tenant.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: UnitOfWork;

    async fn begin(&self, tenant_id: TenantId) -> Result<Self::Tx, StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self, tenant_id: TenantId) -> Result<Self::Tx, StoreError> {
        (**self).begin(tenant_id).await
    }
}

/// A tenant-scoped transaction.
///
/// Backends implement the raw row methods; the typed methods are provided.
#[async_trait]
pub trait UnitOfWork: Send + Sized {
    fn tenant_id(&self) -> TenantId;

    /// Fetch one row, deleted or not.
    async fn fetch(&mut self, kind: EntityKind, id: Uuid) -> Result<Option<StoredRow>, StoreError>;

    /// Fetch every row of a kind in id order.
    async fn fetch_all(&mut self, kind: EntityKind, include_deleted: bool) -> Result<Vec<StoredRow>, StoreError>;

    /// Insert a new active row; `Duplicate` when the id is taken.
    async fn insert_row(&mut self, kind: EntityKind, id: Uuid, data: JsonValue) -> Result<(), StoreError>;

    /// Write a row unconditionally (insert or overwrite).
    async fn write_row(
        &mut self,
        kind: EntityKind,
        id: Uuid,
        data: JsonValue,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), StoreError>;

    /// Audit entries matching `filter`, newest first.
    async fn audit_entries(&mut self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError>;

    async fn load_settings(&mut self) -> Result<Option<AppSettings>, StoreError>;

    async fn store_settings(&mut self, settings: &AppSettings) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;

    // -------------------------
    // Typed access
    // -------------------------

    async fn get_any<T: Entity>(&mut self, id: T::Id) -> Result<Option<Lifecycle<T>>, StoreError> {
        match self.fetch(T::KIND, id.into()).await? {
            Some(row) => row.decode().map(Some),
            None => Ok(None),
        }
    }

    async fn get<T: Entity>(&mut self, id: T::Id) -> Result<Option<T>, StoreError> {
        Ok(self.get_any::<T>(id).await?.and_then(Lifecycle::into_active))
    }

    async fn list_any<T: Entity>(&mut self) -> Result<Vec<Lifecycle<T>>, StoreError> {
        self.fetch_all(T::KIND, true)
            .await?
            .into_iter()
            .map(StoredRow::decode)
            .collect()
    }

    async fn list<T: Entity>(&mut self) -> Result<Vec<T>, StoreError> {
        Ok(self
            .fetch_all(T::KIND, false)
            .await?
            .into_iter()
            .map(StoredRow::decode::<T>)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(Lifecycle::into_active)
            .collect())
    }

    async fn insert<T: Entity>(&mut self, record: &T) -> Result<(), StoreError> {
        let data = encode(record)?;
        self.insert_row(T::KIND, record.id().into(), data).await
    }

    /// Overwrite an active record; deleted rows are immutable.
    async fn update<T: Entity>(&mut self, record: &T) -> Result<(), StoreError> {
        let id: Uuid = record.id().into();
        match self.fetch(T::KIND, id).await? {
            Some(row) if row.is_active() => {
                let data = encode(record)?;
                self.write_row(T::KIND, id, data, None).await
            }
            _ => Err(StoreError::NotFound { kind: T::KIND, id }),
        }
    }

    /// Mark an active record deleted and return its last state.
    async fn soft_delete<T: Entity>(&mut self, id: T::Id, at: DateTime<Utc>) -> Result<T, StoreError> {
        let uuid: Uuid = id.into();
        let row = match self.fetch(T::KIND, uuid).await? {
            Some(row) if row.is_active() => row,
            _ => return Err(StoreError::NotFound { kind: T::KIND, id: uuid }),
        };
        let data = row.data.clone();
        let record = row.decode::<T>()?.into_active().ok_or(StoreError::NotFound { kind: T::KIND, id: uuid })?;
        self.write_row(T::KIND, uuid, data, Some(at)).await?;
        Ok(record)
    }

    /// Write a record as active whatever its current state (backup restore).
    async fn upsert<T: Entity>(&mut self, record: &T) -> Result<(), StoreError> {
        let data = encode(record)?;
        self.write_row(T::KIND, record.id().into(), data, None).await
    }

    /// Soft-delete every active row of a kind; returns how many were marked.
    async fn soft_delete_all(&mut self, kind: EntityKind, at: DateTime<Utc>) -> Result<usize, StoreError> {
        let rows = self.fetch_all(kind, false).await?;
        let count = rows.len();
        for row in rows {
            self.write_row(kind, row.id, row.data, Some(at)).await?;
        }
        Ok(count)
    }
}

/// Backend picked at startup from configuration.
#[derive(Debug, Clone)]
pub enum AnyLedgerStore {
    InMemory(InMemoryLedgerStore),
    Postgres(PostgresLedgerStore),
}

pub enum AnyUnit {
    InMemory(InMemoryUnit),
    Postgres(PostgresUnit),
}

#[async_trait]
impl LedgerStore for AnyLedgerStore {
    type Tx = AnyUnit;

    async fn begin(&self, tenant_id: TenantId) -> Result<AnyUnit, StoreError> {
        Ok(match self {
            AnyLedgerStore::InMemory(s) => AnyUnit::InMemory(s.begin(tenant_id).await?),
            AnyLedgerStore::Postgres(s) => AnyUnit::Postgres(s.begin(tenant_id).await?),
        })
    }
}

macro_rules! delegate {
    ($self:ident, $tx:ident => $call:expr) => {
        match $self {
            AnyUnit::InMemory($tx) => $call,
            AnyUnit::Postgres($tx) => $call,
        }
    };
}

#[async_trait]
impl UnitOfWork for AnyUnit {
    fn tenant_id(&self) -> TenantId {
        delegate!(self, tx => tx.tenant_id())
    }

    async fn fetch(&mut self, kind: EntityKind, id: Uuid) -> Result<Option<StoredRow>, StoreError> {
        delegate!(self, tx => tx.fetch(kind, id).await)
    }

    async fn fetch_all(&mut self, kind: EntityKind, include_deleted: bool) -> Result<Vec<StoredRow>, StoreError> {
        delegate!(self, tx => tx.fetch_all(kind, include_deleted).await)
    }

    async fn insert_row(&mut self, kind: EntityKind, id: Uuid, data: JsonValue) -> Result<(), StoreError> {
        delegate!(self, tx => tx.insert_row(kind, id, data).await)
    }

    async fn write_row(
        &mut self,
        kind: EntityKind,
        id: Uuid,
        data: JsonValue,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        delegate!(self, tx => tx.write_row(kind, id, data, deleted_at).await)
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), StoreError> {
        delegate!(self, tx => tx.append_audit(entry).await)
    }

    async fn audit_entries(&mut self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        delegate!(self, tx => tx.audit_entries(filter).await)
    }

    async fn load_settings(&mut self) -> Result<Option<AppSettings>, StoreError> {
        delegate!(self, tx => tx.load_settings().await)
    }

    async fn store_settings(&mut self, settings: &AppSettings) -> Result<(), StoreError> {
        delegate!(self, tx => tx.store_settings(settings).await)
    }

    async fn commit(self) -> Result<(), StoreError> {
        delegate!(self, tx => tx.commit().await)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        delegate!(self, tx => tx.rollback().await)
    }
}
