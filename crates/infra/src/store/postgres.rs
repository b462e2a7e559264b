//! Postgres-backed ledger store.
//!
//! One table per record kind (`tenant_id, id, data jsonb, deleted_at,
//! created_at, updated_at`), plus `audit_logs` and `settings`. The schema
//! lives in `migrations/0001_ledger.sql` and can be applied with
//! [`PostgresLedgerStore::migrate`].
//!
//! ## Concurrency
//!
//! A unit is one SQL transaction. `begin` takes a transaction-scoped advisory
//! lock keyed by tenant, so units of the same tenant run one after another
//! (the same guarantee the in-memory store gives), and single-row reads use
//! `FOR UPDATE`.
//!
//! ## Error mapping
//!
//! | Postgres code | StoreError |
//! |---|---|
//! | `23505` unique violation | `Duplicate` (insert) / `Concurrency` (elsewhere) |
//! | `40001` / `40P01` serialization failure, deadlock | `Concurrency` |
//! | anything else | `Backend` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use propledger_core::{AuditEntryId, EntityKind, TenantId, UserId};
use propledger_ledger::{AppSettings, AuditAction, AuditEntry, AuditFilter};

use super::{LedgerStore, StoreError, StoredRow, UnitOfWork};

const SCHEMA: &str = include_str!("../../migrations/0001_ledger.sql");

#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect with a small default pool.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    type Tx = PostgresUnit;

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn begin(&self, tenant_id: TenantId) -> Result<PostgresUnit, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(tenant_id.as_uuid().to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("tenant_lock", e))?;

        Ok(PostgresUnit { tenant_id, tx })
    }
}

pub struct PostgresUnit {
    tenant_id: TenantId,
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresUnit {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    async fn fetch(&mut self, kind: EntityKind, id: Uuid) -> Result<Option<StoredRow>, StoreError> {
        let sql = format!(
            "SELECT id, data, deleted_at FROM {} WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
            kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(self.tenant_id.as_uuid())
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("fetch", e))?;

        row.map(|r| stored_row(&r)).transpose()
    }

    async fn fetch_all(&mut self, kind: EntityKind, include_deleted: bool) -> Result<Vec<StoredRow>, StoreError> {
        let filter = if include_deleted { "" } else { " AND deleted_at IS NULL" };
        let sql = format!(
            "SELECT id, data, deleted_at FROM {} WHERE tenant_id = $1{} ORDER BY id ASC",
            kind.table(),
            filter
        );
        let rows = sqlx::query(&sql)
            .bind(self.tenant_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("fetch_all", e))?;

        rows.iter().map(stored_row).collect()
    }

    async fn insert_row(&mut self, kind: EntityKind, id: Uuid, data: JsonValue) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (tenant_id, id, data) VALUES ($1, $2, $3)",
            kind.table()
        );
        sqlx::query(&sql)
            .bind(self.tenant_id.as_uuid())
            .bind(id)
            .bind(&data)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate { kind, id }
                } else {
                    map_sqlx_error("insert_row", e)
                }
            })?;
        Ok(())
    }

    async fn write_row(
        &mut self,
        kind: EntityKind,
        id: Uuid,
        data: JsonValue,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let sql = format!(
            r#"
            INSERT INTO {} (tenant_id, id, data, deleted_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, id)
            DO UPDATE SET
                data = EXCLUDED.data,
                deleted_at = EXCLUDED.deleted_at,
                updated_at = NOW()
            "#,
            kind.table()
        );
        sqlx::query(&sql)
            .bind(self.tenant_id.as_uuid())
            .bind(id)
            .bind(&data)
            .bind(deleted_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("write_row", e))?;
        Ok(())
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id,
                tenant_id,
                action,
                entity_type,
                entity_id,
                old_values,
                new_values,
                user_id,
                ip_address,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(self.tenant_id.as_uuid())
        .bind(entry.action.as_str())
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.old_values)
        .bind(&entry.new_values)
        .bind(entry.user_id.as_uuid())
        .bind(&entry.ip_address)
        .bind(entry.timestamp)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_audit", e))?;
        Ok(())
    }

    async fn audit_entries(&mut self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                action,
                entity_type,
                entity_id,
                old_values,
                new_values,
                user_id,
                ip_address,
                created_at
            FROM audit_logs
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR entity_type = $2)
              AND ($3::uuid IS NULL OR entity_id = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(filter.entity_type.as_deref())
        .bind(filter.entity_id)
        .bind(filter.effective_limit() as i64)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("audit_entries", e))?;

        rows.iter().map(audit_entry).collect()
    }

    async fn load_settings(&mut self) -> Result<Option<AppSettings>, StoreError> {
        let row = sqlx::query("SELECT data FROM settings WHERE tenant_id = $1")
            .bind(self.tenant_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_settings", e))?;

        match row {
            Some(row) => {
                let data: JsonValue = row.try_get("data").map_err(|e| map_sqlx_error("load_settings", e))?;
                serde_json::from_value(data)
                    .map(Some)
                    .map_err(|e| StoreError::Serialization(format!("settings: {e}")))
            }
            None => Ok(None),
        }
    }

    async fn store_settings(&mut self, settings: &AppSettings) -> Result<(), StoreError> {
        let data = serde_json::to_value(settings).map_err(|e| StoreError::Serialization(format!("settings: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO settings (tenant_id, data)
            VALUES ($1, $2)
            ON CONFLICT (tenant_id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(&data)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("store_settings", e))?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn stored_row(row: &sqlx::postgres::PgRow) -> Result<StoredRow, StoreError> {
    Ok(StoredRow {
        id: row.try_get("id").map_err(|e| map_sqlx_error("decode_row", e))?,
        data: row.try_get("data").map_err(|e| map_sqlx_error("decode_row", e))?,
        deleted_at: row.try_get("deleted_at").map_err(|e| map_sqlx_error("decode_row", e))?,
    })
}

fn audit_entry(row: &sqlx::postgres::PgRow) -> Result<AuditEntry, StoreError> {
    let decode = |e| map_sqlx_error("decode_audit", e);
    let action: String = row.try_get("action").map_err(decode)?;
    let action = match action.as_str() {
        "create" => AuditAction::Create,
        "update" => AuditAction::Update,
        "delete" => AuditAction::Delete,
        "import" => AuditAction::Import,
        other => return Err(StoreError::Serialization(format!("unknown audit action '{other}'"))),
    };

    Ok(AuditEntry {
        id: AuditEntryId::from_uuid(row.try_get("id").map_err(decode)?),
        action,
        entity_type: row.try_get("entity_type").map_err(decode)?,
        entity_id: row.try_get("entity_id").map_err(decode)?,
        old_values: row.try_get("old_values").map_err(decode)?,
        new_values: row.try_get("new_values").map_err(decode)?,
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(decode)?),
        ip_address: row.try_get("ip_address").map_err(decode)?,
        timestamp: row.try_get("created_at").map_err(decode)?,
    })
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") | Some("40P01") => {
                    StoreError::Concurrency(format!("{operation}: {message}"))
                }
                _ => StoreError::Backend { operation, message },
            }
        }
        other => StoreError::Backend {
            operation,
            message: other.to_string(),
        },
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
