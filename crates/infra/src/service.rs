//! Ledger application service.
//!
//! Every public operation is one unit of work: it begins a tenant-scoped unit,
//! loads what it needs, asks the domain what must change, writes the result
//! together with its audit entries and commits. Returning early with an error
//! drops the unit, which discards every write made so far; callers never see a
//! voucher without its balance change or a balance change without its voucher.
//!
//! Flow:
//! ```text
//! LedgerService::record_voucher
//!   -> store.begin(tenant)
//!   -> validate + check references
//!   -> safe.apply(effect), insert voucher, append audit
//!   -> commit
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use propledger_core::{
    BrokerDueId, ContractId, DomainError, Entity, EntityKind, InstallmentId, Lifecycle, Money,
    Reference, SafeId, TenantId, TransferId, UnitId, VoucherId,
};
use propledger_ledger::installment::infer_statuses;
use propledger_ledger::policy::{contract_deletion, dependent_kinds, ensure_unreferenced, ContractCascade};
use propledger_ledger::reports::{self, DashboardSummary, PartnerShare, SafeReconciliation, UnitRemaining};
use propledger_ledger::voucher::update_adjustments;
use propledger_ledger::{
    validate, Actor, AppSettings, AuditAction, AuditEntry, AuditFilter, BalanceAdjustment, Broker,
    BrokerDue, BrokerDueDraft, BrokerDueStatus, Contract, ContractDraft, ContractRevision, Customer,
    InferredInstallment, Installment, Partner, PartnerDebt, PartnerGroup, Record, Safe, SafeDraft,
    SafeRevision, Snapshot, Transfer, TransferDraft, Unit, UnitPartner, Voucher, VoucherDraft,
    VoucherKind,
};

use crate::export::{self, Dataset};
use crate::store::{LedgerStore, StoreError, UnitOfWork};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Body of an installment payment.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallmentPayment {
    pub safe_id: SafeId,
    /// Defaults to the installment's outstanding amount.
    #[serde(default)]
    pub amount: Option<Money>,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of a broker due payment.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerDuePayment {
    pub safe_id: SafeId,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallmentReceipt {
    pub installment: Installment,
    pub voucher: Voucher,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrokerDueSettlement {
    pub broker_due: BrokerDue,
    pub voucher: Voucher,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractRemoval {
    pub contract: Contract,
    pub cascade: ContractCascade,
    pub unit: Option<Unit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreSummary {
    /// Active rows soft-deleted before the snapshot was written.
    pub rows_replaced: usize,
    pub rows_restored: usize,
}

#[derive(Debug, Clone)]
pub struct LedgerService<S> {
    store: S,
}

impl<S: LedgerStore> LedgerService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // -------------------------
    // Safes
    // -------------------------

    #[instrument(skip(self, actor, draft), fields(tenant_id = %tenant_id), err)]
    pub async fn create_safe(&self, tenant_id: TenantId, actor: &Actor, draft: SafeDraft) -> LedgerResult<Safe> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let safe = Safe::open(SafeId::new(), draft, now);
        validate(&safe)?;
        tx.insert(&safe).await?;
        tx.append_audit(&AuditEntry::created(&safe, actor, now)).await?;

        tx.commit().await?;
        info!(safe_id = %safe.id, balance = %safe.balance, "safe opened");
        Ok(safe)
    }

    #[instrument(skip(self, actor, revision), fields(tenant_id = %tenant_id), err)]
    pub async fn revise_safe(
        &self,
        tenant_id: TenantId,
        actor: &Actor,
        id: SafeId,
        revision: SafeRevision,
    ) -> LedgerResult<Safe> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let before: Safe = require(&mut tx, id).await?;
        let mut after = before.clone();
        after.revise(revision, now);
        validate(&after)?;
        tx.update(&after).await?;
        tx.append_audit(&AuditEntry::updated(&before, &after, actor, now)).await?;

        tx.commit().await?;
        Ok(after)
    }

    /// Refused while any active voucher or transfer points at the safe.
    #[instrument(skip(self, actor), fields(tenant_id = %tenant_id), err)]
    pub async fn delete_safe(&self, tenant_id: TenantId, actor: &Actor, id: SafeId) -> LedgerResult<Safe> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        require::<Safe, _>(&mut tx, id).await?;
        ensure_no_dependents::<Safe, _>(&mut tx, id).await?;
        let safe = tx.soft_delete::<Safe>(id, now).await?;
        tx.append_audit(&AuditEntry::deleted(&safe, actor, now)).await?;

        tx.commit().await?;
        Ok(safe)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn reconcile_safe(&self, tenant_id: TenantId, id: SafeId) -> LedgerResult<SafeReconciliation> {
        let mut tx = self.store.begin(tenant_id).await?;

        let safe: Safe = require(&mut tx, id).await?;
        let vouchers = tx.list::<Voucher>().await?;
        let transfers = tx.list::<Transfer>().await?;
        tx.rollback().await?;

        let check = reports::reconcile_safe(&safe, &vouchers, &transfers);
        if !check.consistent {
            warn!(safe_id = %id, drift = %check.drift, "safe balance drift detected");
        }
        Ok(check)
    }

    // -------------------------
    // Vouchers
    // -------------------------

    #[instrument(skip(self, actor, draft), fields(tenant_id = %tenant_id), err)]
    pub async fn record_voucher(&self, tenant_id: TenantId, actor: &Actor, draft: VoucherDraft) -> LedgerResult<Voucher> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let voucher = Voucher::record(VoucherId::new(), draft, now);
        validate(&voucher)?;
        ensure_references(&mut tx, &voucher.references()).await?;

        adjust(&mut tx, voucher.apply_adjustment(), now).await?;
        tx.insert(&voucher).await?;
        tx.append_audit(&AuditEntry::created(&voucher, actor, now)).await?;

        tx.commit().await?;
        info!(voucher_id = %voucher.id, kind = voucher.kind.as_str(), amount = %voucher.amount, "voucher recorded");
        Ok(voucher)
    }

    /// Revert the old effect on the old safe, then apply the new effect on the
    /// new safe, then persist. A missing target safe aborts the whole unit.
    #[instrument(skip(self, actor, draft), fields(tenant_id = %tenant_id), err)]
    pub async fn update_voucher(
        &self,
        tenant_id: TenantId,
        actor: &Actor,
        id: VoucherId,
        draft: VoucherDraft,
    ) -> LedgerResult<Voucher> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let before: Voucher = require(&mut tx, id).await?;
        let after = before.revised(draft, now)?;
        validate(&after)?;
        ensure_references(&mut tx, &after.references()).await?;

        for adjustment in update_adjustments(&before, &after) {
            adjust(&mut tx, adjustment, now).await?;
        }
        tx.update(&after).await?;
        tx.append_audit(&AuditEntry::updated(&before, &after, actor, now)).await?;

        tx.commit().await?;
        Ok(after)
    }

    /// Reverse the voucher's effect exactly once. Settlement vouchers also
    /// roll back the installment payment or reopen the broker due.
    #[instrument(skip(self, actor), fields(tenant_id = %tenant_id), err)]
    pub async fn delete_voucher(&self, tenant_id: TenantId, actor: &Actor, id: VoucherId) -> LedgerResult<Voucher> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        require::<Voucher, _>(&mut tx, id).await?;
        let voucher = tx.soft_delete::<Voucher>(id, now).await?;
        adjust(&mut tx, voucher.revert_adjustment(), now).await?;

        if let Some(installment_id) = voucher.installment_id {
            if let Some(before) = tx.get::<Installment>(installment_id).await? {
                let mut after = before.clone();
                after.revert_payment(voucher.amount, now);
                tx.update(&after).await?;
                tx.append_audit(&AuditEntry::updated(&before, &after, actor, now)).await?;
            }
        }
        if let Some(due_id) = voucher.broker_due_id {
            if let Some(before) = tx.get::<BrokerDue>(due_id).await? {
                let mut after = before.clone();
                after.reopen(now);
                tx.update(&after).await?;
                tx.append_audit(&AuditEntry::updated(&before, &after, actor, now)).await?;
            }
        }
        tx.append_audit(&AuditEntry::deleted(&voucher, actor, now)).await?;

        tx.commit().await?;
        info!(voucher_id = %voucher.id, "voucher deleted");
        Ok(voucher)
    }

    // -------------------------
    // Transfers
    // -------------------------

    #[instrument(skip(self, actor, draft), fields(tenant_id = %tenant_id), err)]
    pub async fn record_transfer(&self, tenant_id: TenantId, actor: &Actor, draft: TransferDraft) -> LedgerResult<Transfer> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let transfer = Transfer::record(TransferId::new(), draft, now);
        validate(&transfer)?;
        ensure_references(&mut tx, &transfer.references()).await?;

        for leg in transfer.legs() {
            adjust(&mut tx, leg, now).await?;
        }
        tx.insert(&transfer).await?;
        tx.append_audit(&AuditEntry::created(&transfer, actor, now)).await?;

        tx.commit().await?;
        info!(transfer_id = %transfer.id, amount = %transfer.amount, "transfer recorded");
        Ok(transfer)
    }

    #[instrument(skip(self, actor), fields(tenant_id = %tenant_id), err)]
    pub async fn delete_transfer(&self, tenant_id: TenantId, actor: &Actor, id: TransferId) -> LedgerResult<Transfer> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        require::<Transfer, _>(&mut tx, id).await?;
        let transfer = tx.soft_delete::<Transfer>(id, now).await?;
        for leg in transfer.reversal() {
            adjust(&mut tx, leg, now).await?;
        }
        tx.append_audit(&AuditEntry::deleted(&transfer, actor, now)).await?;

        tx.commit().await?;
        Ok(transfer)
    }

    // -------------------------
    // Contracts and units
    // -------------------------

    /// Sell a unit: the unit becomes `sold` and a positive broker amount opens
    /// a pending broker due.
    #[instrument(skip(self, actor, draft), fields(tenant_id = %tenant_id), err)]
    pub async fn create_contract(&self, tenant_id: TenantId, actor: &Actor, draft: ContractDraft) -> LedgerResult<Contract> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let contract = Contract::sign(ContractId::new(), draft, now);
        validate(&contract)?;
        ensure_references(&mut tx, &contract.references()).await?;

        let unit_before: Unit = require(&mut tx, contract.unit_id).await?;
        let mut unit = unit_before.clone();
        unit.sell(now)?;
        tx.update(&unit).await?;
        tx.insert(&contract).await?;
        tx.append_audit(&AuditEntry::created(&contract, actor, now)).await?;
        tx.append_audit(&AuditEntry::updated(&unit_before, &unit, actor, now)).await?;

        if let (true, Some(broker_id)) = (contract.broker_amount.is_positive(), contract.broker_id) {
            let due = BrokerDue::create(
                BrokerDueId::new(),
                BrokerDueDraft {
                    broker_id,
                    contract_id: Some(contract.id),
                    amount: contract.broker_amount,
                    due_date: contract.start_date,
                },
                now,
            );
            validate(&due)?;
            tx.insert(&due).await?;
            tx.append_audit(&AuditEntry::created(&due, actor, now)).await?;
            debug!(broker_due_id = %due.id, "broker due opened");
        }

        tx.commit().await?;
        info!(contract_id = %contract.id, unit_id = %contract.unit_id, "contract signed");
        Ok(contract)
    }

    #[instrument(skip(self, actor, revision), fields(tenant_id = %tenant_id), err)]
    pub async fn update_contract(
        &self,
        tenant_id: TenantId,
        actor: &Actor,
        id: ContractId,
        revision: ContractRevision,
    ) -> LedgerResult<Contract> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let before: Contract = require(&mut tx, id).await?;
        let mut after = before.clone();
        after.revise(revision, now);
        validate(&after)?;
        tx.update(&after).await?;
        tx.append_audit(&AuditEntry::updated(&before, &after, actor, now)).await?;

        tx.commit().await?;
        Ok(after)
    }

    /// Delete a contract together with its unpaid installments and pending
    /// broker dues, and put the unit back on the market.
    #[instrument(skip(self, actor), fields(tenant_id = %tenant_id), err)]
    pub async fn delete_contract(&self, tenant_id: TenantId, actor: &Actor, id: ContractId) -> LedgerResult<ContractRemoval> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let contract: Contract = require(&mut tx, id).await?;
        let vouchers = tx.list::<Voucher>().await?;
        let installments = tx.list::<Installment>().await?;
        let dues = tx.list::<BrokerDue>().await?;
        let cascade = contract_deletion(&contract, &vouchers, &installments, &dues)?;

        for installment_id in &cascade.installments {
            let removed = tx.soft_delete::<Installment>(*installment_id, now).await?;
            tx.append_audit(&AuditEntry::deleted(&removed, actor, now)).await?;
        }
        for due_id in &cascade.broker_dues {
            let removed = tx.soft_delete::<BrokerDue>(*due_id, now).await?;
            tx.append_audit(&AuditEntry::deleted(&removed, actor, now)).await?;
        }
        tx.soft_delete::<Contract>(id, now).await?;
        tx.append_audit(&AuditEntry::deleted(&contract, actor, now)).await?;

        let unit = match tx.get::<Unit>(contract.unit_id).await? {
            Some(before) => {
                let mut after = before.clone();
                after.make_available(now);
                tx.update(&after).await?;
                tx.append_audit(&AuditEntry::updated(&before, &after, actor, now)).await?;
                Some(after)
            }
            None => None,
        };

        tx.commit().await?;
        info!(
            contract_id = %contract.id,
            installments = cascade.installments.len(),
            broker_dues = cascade.broker_dues.len(),
            "contract deleted"
        );
        Ok(ContractRemoval { contract, cascade, unit })
    }

    #[instrument(skip(self, actor), fields(tenant_id = %tenant_id), err)]
    pub async fn reserve_unit(&self, tenant_id: TenantId, actor: &Actor, id: UnitId) -> LedgerResult<Unit> {
        self.transition_unit(tenant_id, actor, id, Unit::reserve).await
    }

    #[instrument(skip(self, actor), fields(tenant_id = %tenant_id), err)]
    pub async fn release_unit(&self, tenant_id: TenantId, actor: &Actor, id: UnitId) -> LedgerResult<Unit> {
        self.transition_unit(tenant_id, actor, id, Unit::release).await
    }

    async fn transition_unit(
        &self,
        tenant_id: TenantId,
        actor: &Actor,
        id: UnitId,
        step: fn(&mut Unit, chrono::DateTime<Utc>) -> Result<(), DomainError>,
    ) -> LedgerResult<Unit> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let before: Unit = require(&mut tx, id).await?;
        let mut after = before.clone();
        step(&mut after, now)?;
        tx.update(&after).await?;
        tx.append_audit(&AuditEntry::updated(&before, &after, actor, now)).await?;

        tx.commit().await?;
        Ok(after)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn unit_remaining(&self, tenant_id: TenantId, unit_id: UnitId) -> LedgerResult<UnitRemaining> {
        let mut tx = self.store.begin(tenant_id).await?;

        require::<Unit, _>(&mut tx, unit_id).await?;
        let contract = tx
            .list::<Contract>()
            .await?
            .into_iter()
            .find(|c| c.unit_id == unit_id)
            .ok_or_else(|| DomainError::not_found(format!("contract for unit {unit_id}")))?;
        let installments = tx.list::<Installment>().await?;
        tx.rollback().await?;

        Ok(reports::unit_remaining(&contract, &installments))
    }

    /// Installment statuses inferred from the unit's receipt vouchers.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn installment_statuses(&self, tenant_id: TenantId, unit_id: UnitId) -> LedgerResult<Vec<InferredInstallment>> {
        let mut tx = self.store.begin(tenant_id).await?;

        require::<Unit, _>(&mut tx, unit_id).await?;
        let installments: Vec<Installment> = tx
            .list::<Installment>()
            .await?
            .into_iter()
            .filter(|i| i.unit_id == unit_id)
            .collect();
        let receipts: Money = tx
            .list::<Voucher>()
            .await?
            .iter()
            .filter(|v| v.unit_id == Some(unit_id) && v.kind == VoucherKind::Receipt)
            .map(|v| v.amount)
            .sum();
        tx.rollback().await?;

        Ok(infer_statuses(&installments, receipts))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn partner_shares(&self, tenant_id: TenantId, unit_id: UnitId) -> LedgerResult<Vec<PartnerShare>> {
        let mut tx = self.store.begin(tenant_id).await?;

        require::<Unit, _>(&mut tx, unit_id).await?;
        let partners = tx.list::<UnitPartner>().await?;
        let vouchers = tx.list::<Voucher>().await?;
        tx.rollback().await?;

        Ok(reports::partner_shares(unit_id, &partners, &vouchers))
    }

    // -------------------------
    // Payments
    // -------------------------

    /// Record a receipt voucher against an installment and advance its paid
    /// amount, in one unit.
    #[instrument(skip(self, actor, payment), fields(tenant_id = %tenant_id), err)]
    pub async fn pay_installment(
        &self,
        tenant_id: TenantId,
        actor: &Actor,
        id: InstallmentId,
        payment: InstallmentPayment,
    ) -> LedgerResult<InstallmentReceipt> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let before: Installment = require(&mut tx, id).await?;
        let amount = payment.amount.unwrap_or_else(|| before.outstanding());
        let mut installment = before.clone();
        installment.apply_payment(amount, now)?;

        let mut voucher = Voucher::record(
            VoucherId::new(),
            VoucherDraft {
                kind: VoucherKind::Receipt,
                date: payment.date,
                amount,
                safe_id: payment.safe_id,
                description: payment
                    .description
                    .unwrap_or_else(|| format!("Installment due {}", installment.due_date)),
                party_name: None,
                unit_id: Some(installment.unit_id),
            },
            now,
        );
        voucher.installment_id = Some(installment.id);
        validate(&voucher)?;
        ensure_references(&mut tx, &voucher.references()).await?;

        adjust(&mut tx, voucher.apply_adjustment(), now).await?;
        tx.insert(&voucher).await?;
        tx.update(&installment).await?;
        tx.append_audit(&AuditEntry::created(&voucher, actor, now)).await?;
        tx.append_audit(&AuditEntry::updated(&before, &installment, actor, now)).await?;

        tx.commit().await?;
        info!(installment_id = %installment.id, amount = %amount, status = installment.status.as_str(), "installment paid");
        Ok(InstallmentReceipt { installment, voucher })
    }

    /// Record a payment voucher for a pending broker due and mark it paid.
    #[instrument(skip(self, actor, payment), fields(tenant_id = %tenant_id), err)]
    pub async fn pay_broker_due(
        &self,
        tenant_id: TenantId,
        actor: &Actor,
        id: BrokerDueId,
        payment: BrokerDuePayment,
    ) -> LedgerResult<BrokerDueSettlement> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let before: BrokerDue = require(&mut tx, id).await?;
        if before.status == BrokerDueStatus::Paid {
            return Err(DomainError::conflict(format!("broker due {id} is already paid")).into());
        }
        let unit_id = match before.contract_id {
            Some(contract_id) => tx.get::<Contract>(contract_id).await?.map(|c| c.unit_id),
            None => None,
        };
        let broker_name = tx.get::<Broker>(before.broker_id).await?.map(|b| b.name);

        let mut voucher = Voucher::record(
            VoucherId::new(),
            VoucherDraft {
                kind: VoucherKind::Payment,
                date: payment.date,
                amount: before.amount,
                safe_id: payment.safe_id,
                description: payment.description.unwrap_or_else(|| "Broker commission".to_string()),
                party_name: broker_name,
                unit_id,
            },
            now,
        );
        voucher.broker_due_id = Some(before.id);
        validate(&voucher)?;
        ensure_references(&mut tx, &voucher.references()).await?;

        let mut due = before.clone();
        due.mark_paid(voucher.id, now);

        adjust(&mut tx, voucher.apply_adjustment(), now).await?;
        tx.insert(&voucher).await?;
        tx.update(&due).await?;
        tx.append_audit(&AuditEntry::created(&voucher, actor, now)).await?;
        tx.append_audit(&AuditEntry::updated(&before, &due, actor, now)).await?;

        tx.commit().await?;
        info!(broker_due_id = %due.id, voucher_id = %voucher.id, "broker due paid");
        Ok(BrokerDueSettlement { broker_due: due, voucher })
    }

    // -------------------------
    // Attribute records
    // -------------------------

    #[instrument(skip(self, actor, draft), fields(tenant_id = %tenant_id, kind = %T::KIND), err)]
    pub async fn create_record<T: Record>(&self, tenant_id: TenantId, actor: &Actor, draft: T::Draft) -> LedgerResult<T> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let record = T::create(T::Id::from(Uuid::now_v7()), draft, now);
        check_record(&mut tx, &record).await?;
        tx.insert(&record).await?;
        tx.append_audit(&AuditEntry::created(&record, actor, now)).await?;

        tx.commit().await?;
        debug!(id = %record.id(), "record created");
        Ok(record)
    }

    #[instrument(skip(self, actor, draft), fields(tenant_id = %tenant_id, kind = %T::KIND), err)]
    pub async fn update_record<T: Record>(
        &self,
        tenant_id: TenantId,
        actor: &Actor,
        id: T::Id,
        draft: T::Draft,
    ) -> LedgerResult<T> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let before: T = require(&mut tx, id).await?;
        before.ensure_revisable(&draft)?;
        let mut after = before.clone();
        after.revise(draft, now);
        check_record(&mut tx, &after).await?;
        tx.update(&after).await?;
        tx.append_audit(&AuditEntry::updated(&before, &after, actor, now)).await?;

        tx.commit().await?;
        Ok(after)
    }

    /// Soft-delete a record nothing active depends on.
    #[instrument(skip(self, actor), fields(tenant_id = %tenant_id, kind = %T::KIND), err)]
    pub async fn delete_record<T: Record>(&self, tenant_id: TenantId, actor: &Actor, id: T::Id) -> LedgerResult<T> {
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let record: T = require(&mut tx, id).await?;
        record.ensure_deletable()?;
        ensure_no_dependents::<T, _>(&mut tx, id).await?;
        tx.soft_delete::<T>(id, now).await?;
        tx.append_audit(&AuditEntry::deleted(&record, actor, now)).await?;

        tx.commit().await?;
        Ok(record)
    }

    // -------------------------
    // Reads
    // -------------------------

    /// One active row of any kind.
    pub async fn get<T: Entity>(&self, tenant_id: TenantId, id: T::Id) -> LedgerResult<T> {
        let mut tx = self.store.begin(tenant_id).await?;
        let record = require(&mut tx, id).await?;
        tx.rollback().await?;
        Ok(record)
    }

    pub async fn list<T: Entity>(&self, tenant_id: TenantId) -> LedgerResult<Vec<T>> {
        let mut tx = self.store.begin(tenant_id).await?;
        let rows = tx.list::<T>().await?;
        tx.rollback().await?;
        Ok(rows)
    }

    /// Every row of a kind, tagged active or deleted.
    pub async fn list_any<T: Entity>(&self, tenant_id: TenantId) -> LedgerResult<Vec<Lifecycle<T>>> {
        let mut tx = self.store.begin(tenant_id).await?;
        let rows = tx.list_any::<T>().await?;
        tx.rollback().await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn dashboard(&self, tenant_id: TenantId, today: NaiveDate) -> LedgerResult<DashboardSummary> {
        let mut tx = self.store.begin(tenant_id).await?;
        let contracts = tx.list::<Contract>().await?;
        let vouchers = tx.list::<Voucher>().await?;
        let safes = tx.list::<Safe>().await?;
        let units = tx.list::<Unit>().await?;
        let installments = tx.list::<Installment>().await?;
        tx.rollback().await?;

        Ok(DashboardSummary::build(&contracts, &vouchers, &safes, &units, &installments, today))
    }

    pub async fn audit_log(&self, tenant_id: TenantId, filter: AuditFilter) -> LedgerResult<Vec<AuditEntry>> {
        let mut tx = self.store.begin(tenant_id).await?;
        let entries = tx.audit_entries(&filter).await?;
        tx.rollback().await?;
        Ok(entries)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, dataset = %dataset), err)]
    pub async fn export_csv(&self, tenant_id: TenantId, dataset: Dataset, today: NaiveDate) -> LedgerResult<String> {
        let csv = match dataset {
            Dataset::Vouchers => export::vouchers_csv(&self.list::<Voucher>(tenant_id).await?)?,
            Dataset::Contracts => export::contracts_csv(&self.list::<Contract>(tenant_id).await?)?,
            Dataset::Installments => export::installments_csv(&self.list::<Installment>(tenant_id).await?)?,
            Dataset::Safes => export::safes_csv(&self.list::<Safe>(tenant_id).await?)?,
            Dataset::Dashboard => export::dashboard_csv(&self.dashboard(tenant_id, today).await?)?,
        };
        Ok(csv)
    }

    // -------------------------
    // Settings, backup and restore
    // -------------------------

    pub async fn settings(&self, tenant_id: TenantId) -> LedgerResult<AppSettings> {
        let mut tx = self.store.begin(tenant_id).await?;
        let settings = tx.load_settings().await?.unwrap_or_default();
        tx.rollback().await?;
        Ok(settings)
    }

    #[instrument(skip(self, actor, settings), fields(tenant_id = %tenant_id), err)]
    pub async fn save_settings(&self, tenant_id: TenantId, actor: &Actor, settings: AppSettings) -> LedgerResult<AppSettings> {
        settings.validate()?;
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let before = tx.load_settings().await?.unwrap_or_default();
        tx.store_settings(&settings).await?;
        tx.append_audit(&AuditEntry::new(
            AuditAction::Update,
            "settings",
            None,
            serde_json::to_value(&before).ok(),
            serde_json::to_value(&settings).ok(),
            actor,
            now,
        ))
        .await?;

        tx.commit().await?;
        Ok(settings)
    }

    /// Every active row plus settings.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn backup(&self, tenant_id: TenantId) -> LedgerResult<Snapshot> {
        let mut tx = self.store.begin(tenant_id).await?;

        let snapshot = Snapshot {
            version: Snapshot::VERSION,
            exported_at: Some(Utc::now()),
            settings: tx.load_settings().await?.unwrap_or_default(),
            customers: tx.list().await?,
            units: tx.list().await?,
            partner_groups: tx.list().await?,
            partners: tx.list().await?,
            unit_partners: tx.list().await?,
            brokers: tx.list().await?,
            contracts: tx.list().await?,
            broker_dues: tx.list().await?,
            partner_debts: tx.list().await?,
            installments: tx.list().await?,
            safes: tx.list().await?,
            transfers: tx.list().await?,
            vouchers: tx.list().await?,
        };
        tx.rollback().await?;

        info!(rows = snapshot.row_count(), "backup taken");
        Ok(snapshot)
    }

    /// Replace the tenant's data with a verified snapshot.
    ///
    /// Current rows are soft-deleted, not erased, so the trash keeps what the
    /// restore replaced.
    #[instrument(skip(self, actor, snapshot), fields(tenant_id = %tenant_id), err)]
    pub async fn restore(&self, tenant_id: TenantId, actor: &Actor, snapshot: Snapshot) -> LedgerResult<RestoreSummary> {
        snapshot.verify()?;
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await?;

        let mut rows_replaced = 0;
        for kind in EntityKind::ALL {
            rows_replaced += tx.soft_delete_all(kind, now).await?;
        }

        upsert_all(&mut tx, &snapshot.customers).await?;
        upsert_all(&mut tx, &snapshot.units).await?;
        upsert_all(&mut tx, &snapshot.partner_groups).await?;
        upsert_all(&mut tx, &snapshot.partners).await?;
        upsert_all(&mut tx, &snapshot.unit_partners).await?;
        upsert_all(&mut tx, &snapshot.brokers).await?;
        upsert_all(&mut tx, &snapshot.contracts).await?;
        upsert_all(&mut tx, &snapshot.broker_dues).await?;
        upsert_all(&mut tx, &snapshot.partner_debts).await?;
        upsert_all(&mut tx, &snapshot.installments).await?;
        upsert_all(&mut tx, &snapshot.safes).await?;
        upsert_all(&mut tx, &snapshot.transfers).await?;
        upsert_all(&mut tx, &snapshot.vouchers).await?;
        tx.store_settings(&snapshot.settings).await?;

        let summary = RestoreSummary {
            rows_replaced,
            rows_restored: snapshot.row_count(),
        };
        tx.append_audit(&AuditEntry::new(
            AuditAction::Import,
            "backup",
            None,
            None,
            Some(json!({
                "version": snapshot.version,
                "exported_at": snapshot.exported_at,
                "rows_replaced": summary.rows_replaced,
                "rows_restored": summary.rows_restored,
            })),
            actor,
            now,
        ))
        .await?;

        tx.commit().await?;
        info!(rows_replaced, rows_restored = summary.rows_restored, "backup restored");
        Ok(summary)
    }
}

// -------------------------
// Unit helpers
// -------------------------

/// Load an active row or fail with not-found.
async fn require<T: Entity, U: UnitOfWork>(tx: &mut U, id: T::Id) -> LedgerResult<T> {
    tx.get::<T>(id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("{} {}", T::KIND, id)).into())
}

/// Every reference must point at an active row.
async fn ensure_references<U: UnitOfWork>(tx: &mut U, references: &[Reference]) -> LedgerResult<()> {
    for reference in references {
        match tx.fetch(reference.kind, reference.id).await? {
            Some(row) if row.is_active() => {}
            _ => return Err(DomainError::not_found(format!("{} {}", reference.kind, reference.id)).into()),
        }
    }
    Ok(())
}

/// Shared write checks for attribute records.
async fn check_record<T: Record, U: UnitOfWork>(tx: &mut U, record: &T) -> LedgerResult<()> {
    validate(record)?;
    ensure_references(&mut *tx, &record.references()).await?;
    if T::CHECKS_SIBLINGS {
        let siblings = tx.list::<T>().await?;
        record.check_siblings(&siblings)?;
    }
    Ok(())
}

/// Move one safe's balance.
async fn adjust<U: UnitOfWork>(tx: &mut U, adjustment: BalanceAdjustment, now: chrono::DateTime<Utc>) -> LedgerResult<()> {
    let mut safe: Safe = require(&mut *tx, adjustment.safe_id).await?;
    safe.apply(adjustment.delta, now);
    tx.update(&safe).await?;
    debug!(safe_id = %safe.id, delta = %adjustment.delta, balance = %safe.balance, "safe adjusted");
    Ok(())
}

/// Refuse deletion while an active row of a dependent kind references `id`.
async fn ensure_no_dependents<T: Entity, U: UnitOfWork>(tx: &mut U, id: T::Id) -> LedgerResult<()> {
    let target = Reference::new(T::KIND, id);
    for kind in dependent_kinds(T::KIND) {
        let holders = match kind {
            EntityKind::Customer => holders_of::<Customer, U>(tx).await?,
            EntityKind::Unit => holders_of::<Unit, U>(tx).await?,
            EntityKind::PartnerGroup => holders_of::<PartnerGroup, U>(tx).await?,
            EntityKind::Partner => holders_of::<Partner, U>(tx).await?,
            EntityKind::UnitPartner => holders_of::<UnitPartner, U>(tx).await?,
            EntityKind::Broker => holders_of::<Broker, U>(tx).await?,
            EntityKind::Contract => holders_of::<Contract, U>(tx).await?,
            EntityKind::BrokerDue => holders_of::<BrokerDue, U>(tx).await?,
            EntityKind::PartnerDebt => holders_of::<PartnerDebt, U>(tx).await?,
            EntityKind::Installment => holders_of::<Installment, U>(tx).await?,
            EntityKind::Safe => holders_of::<Safe, U>(tx).await?,
            EntityKind::Transfer => holders_of::<Transfer, U>(tx).await?,
            EntityKind::Voucher => holders_of::<Voucher, U>(tx).await?,
        };
        ensure_unreferenced(target, &holders)?;
    }
    Ok(())
}

async fn holders_of<T: Entity, U: UnitOfWork>(tx: &mut U) -> LedgerResult<Vec<(Reference, Vec<Reference>)>> {
    Ok(tx
        .list::<T>()
        .await?
        .iter()
        .map(|row| (Reference::new(T::KIND, row.id()), row.references()))
        .collect())
}

async fn upsert_all<T: Entity, U: UnitOfWork>(tx: &mut U, rows: &[T]) -> LedgerResult<()> {
    for row in rows {
        tx.upsert(row).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLedgerStore;
    use chrono::NaiveDate;
    use propledger_core::{CustomerId, UserId};
    use propledger_ledger::{BrokerDraft, CustomerDraft, InstallmentDraft, InstallmentStatus, UnitDraft, UnitPartnerDraft, UnitStatus};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn service() -> LedgerService<InMemoryLedgerStore> {
        LedgerService::new(InMemoryLedgerStore::new())
    }

    fn actor() -> Actor {
        Actor::new(UserId::new(), Some("10.0.0.1".into()))
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn voucher(kind: VoucherKind, amount: i64, safe_id: SafeId) -> VoucherDraft {
        VoucherDraft {
            kind,
            date: day(1),
            amount: Money::from(amount),
            safe_id,
            description: "test".into(),
            party_name: None,
            unit_id: None,
        }
    }

    async fn open_safe(svc: &LedgerService<InMemoryLedgerStore>, tenant: TenantId, opening: i64) -> Safe {
        svc.create_safe(
            tenant,
            &actor(),
            SafeDraft { name: "Main".into(), opening_balance: Money::from(opening), notes: None },
        )
        .await
        .unwrap()
    }

    async fn balance(svc: &LedgerService<InMemoryLedgerStore>, tenant: TenantId, id: SafeId) -> Money {
        svc.get::<Safe>(tenant, id).await.unwrap().balance
    }

    async fn unit(svc: &LedgerService<InMemoryLedgerStore>, tenant: TenantId) -> Unit {
        svc.create_record::<Unit>(
            tenant,
            &actor(),
            UnitDraft {
                code: "A-101".into(),
                unit_type: "apartment".into(),
                area: dec!(120),
                floor: Some(1),
                building: Some("A".into()),
                list_price: Money::from(500_000),
                notes: None,
            },
        )
        .await
        .unwrap()
    }

    async fn customer(svc: &LedgerService<InMemoryLedgerStore>, tenant: TenantId) -> Customer {
        svc.create_record::<Customer>(
            tenant,
            &actor(),
            CustomerDraft {
                name: "Mona Adel".into(),
                phone: "01012345678".into(),
                national_id: None,
                address: None,
                notes: None,
            },
        )
        .await
        .unwrap()
    }

    fn contract_draft(unit_id: UnitId, customer_id: CustomerId, price: i64) -> ContractDraft {
        ContractDraft {
            unit_id,
            customer_id,
            total_price: Money::from(price),
            discount_amount: Money::ZERO,
            broker_id: None,
            broker_name: None,
            broker_amount: Money::ZERO,
            start_date: day(1),
            notes: None,
        }
    }

    #[tokio::test]
    async fn receipt_update_delete_scenario() {
        let svc = service();
        let tenant = TenantId::new();
        let safe = open_safe(&svc, tenant, 1000).await;

        let v = svc.record_voucher(tenant, &actor(), voucher(VoucherKind::Receipt, 500, safe.id)).await.unwrap();
        assert_eq!(balance(&svc, tenant, safe.id).await, Money::from(1500));

        svc.update_voucher(tenant, &actor(), v.id, voucher(VoucherKind::Payment, 200, safe.id))
            .await
            .unwrap();
        assert_eq!(balance(&svc, tenant, safe.id).await, Money::from(800));

        svc.delete_voucher(tenant, &actor(), v.id).await.unwrap();
        assert_eq!(balance(&svc, tenant, safe.id).await, Money::from(1000));

        // A second delete is not-found and changes nothing.
        let again = svc.delete_voucher(tenant, &actor(), v.id).await;
        assert!(matches!(again, Err(LedgerError::Domain(DomainError::NotFound(_)))));
        assert_eq!(balance(&svc, tenant, safe.id).await, Money::from(1000));
        assert!(svc.list::<Voucher>(tenant).await.unwrap().is_empty());
        assert_eq!(svc.list_any::<Voucher>(tenant).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_vouchers_leave_balances_untouched() {
        let svc = service();
        let tenant = TenantId::new();
        let safe = open_safe(&svc, tenant, 1000).await;

        let zero = svc.record_voucher(tenant, &actor(), voucher(VoucherKind::Receipt, 0, safe.id)).await;
        assert!(matches!(zero, Err(LedgerError::Domain(DomainError::Validation(_)))));

        let missing = svc.record_voucher(tenant, &actor(), voucher(VoucherKind::Receipt, 10, SafeId::new())).await;
        assert!(matches!(missing, Err(LedgerError::Domain(DomainError::NotFound(_)))));

        assert_eq!(balance(&svc, tenant, safe.id).await, Money::from(1000));
        assert!(svc.list::<Voucher>(tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_to_missing_safe_rolls_back_everything() {
        let svc = service();
        let tenant = TenantId::new();
        let safe = open_safe(&svc, tenant, 1000).await;
        let v = svc.record_voucher(tenant, &actor(), voucher(VoucherKind::Receipt, 300, safe.id)).await.unwrap();

        let moved = svc
            .update_voucher(tenant, &actor(), v.id, voucher(VoucherKind::Receipt, 300, SafeId::new()))
            .await;
        assert!(moved.is_err());

        assert_eq!(balance(&svc, tenant, safe.id).await, Money::from(1300));
        assert_eq!(svc.get::<Voucher>(tenant, v.id).await.unwrap().safe_id, safe.id);
    }

    #[tokio::test]
    async fn moving_a_voucher_between_safes() {
        let svc = service();
        let tenant = TenantId::new();
        let a = open_safe(&svc, tenant, 1000).await;
        let b = open_safe(&svc, tenant, 0).await;

        let v = svc.record_voucher(tenant, &actor(), voucher(VoucherKind::Receipt, 400, a.id)).await.unwrap();
        svc.update_voucher(tenant, &actor(), v.id, voucher(VoucherKind::Receipt, 250, b.id))
            .await
            .unwrap();

        assert_eq!(balance(&svc, tenant, a.id).await, Money::from(1000));
        assert_eq!(balance(&svc, tenant, b.id).await, Money::from(250));
    }

    #[tokio::test]
    async fn transfers_move_money_and_reverse() {
        let svc = service();
        let tenant = TenantId::new();
        let a = open_safe(&svc, tenant, 1000).await;
        let b = open_safe(&svc, tenant, 100).await;

        let same = svc
            .record_transfer(
                tenant,
                &actor(),
                TransferDraft { from_safe_id: a.id, to_safe_id: a.id, amount: Money::from(10), date: day(2), description: String::new() },
            )
            .await;
        assert!(matches!(same, Err(LedgerError::Domain(DomainError::Validation(_)))));

        let t = svc
            .record_transfer(
                tenant,
                &actor(),
                TransferDraft { from_safe_id: a.id, to_safe_id: b.id, amount: Money::from(300), date: day(2), description: String::new() },
            )
            .await
            .unwrap();
        assert_eq!(balance(&svc, tenant, a.id).await, Money::from(700));
        assert_eq!(balance(&svc, tenant, b.id).await, Money::from(400));

        let blocked = svc.delete_safe(tenant, &actor(), a.id).await;
        assert!(matches!(blocked, Err(LedgerError::Domain(DomainError::Conflict(_)))));

        svc.delete_transfer(tenant, &actor(), t.id).await.unwrap();
        assert_eq!(balance(&svc, tenant, a.id).await, Money::from(1000));
        assert_eq!(balance(&svc, tenant, b.id).await, Money::from(100));
        assert!(svc.reconcile_safe(tenant, a.id).await.unwrap().consistent);
        assert!(svc.delete_safe(tenant, &actor(), a.id).await.is_ok());
    }

    #[tokio::test]
    async fn contract_lifecycle_resets_unit() {
        let svc = service();
        let tenant = TenantId::new();
        let u = unit(&svc, tenant).await;
        let c = customer(&svc, tenant).await;

        let contract = svc.create_contract(tenant, &actor(), contract_draft(u.id, c.id, 500_000)).await.unwrap();
        assert_eq!(svc.get::<Unit>(tenant, u.id).await.unwrap().status, UnitStatus::Sold);

        let twice = svc.create_contract(tenant, &actor(), contract_draft(u.id, c.id, 400_000)).await;
        assert!(matches!(twice, Err(LedgerError::Domain(DomainError::Conflict(_)))));

        let inst = svc
            .create_record::<Installment>(
                tenant,
                &actor(),
                InstallmentDraft { unit_id: u.id, contract_id: Some(contract.id), amount: Money::from(50_000), due_date: day(20), notes: None },
            )
            .await
            .unwrap();

        let removal = svc.delete_contract(tenant, &actor(), contract.id).await.unwrap();
        assert_eq!(removal.cascade.installments, vec![inst.id]);
        assert_eq!(svc.get::<Unit>(tenant, u.id).await.unwrap().status, UnitStatus::Available);
        assert!(svc.list::<Installment>(tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn paid_contract_cannot_be_deleted() {
        let svc = service();
        let tenant = TenantId::new();
        let safe = open_safe(&svc, tenant, 0).await;
        let u = unit(&svc, tenant).await;
        let c = customer(&svc, tenant).await;
        let contract = svc.create_contract(tenant, &actor(), contract_draft(u.id, c.id, 100_000)).await.unwrap();
        let inst = svc
            .create_record::<Installment>(
                tenant,
                &actor(),
                InstallmentDraft { unit_id: u.id, contract_id: Some(contract.id), amount: Money::from(10_000), due_date: day(5), notes: None },
            )
            .await
            .unwrap();

        let receipt = svc
            .pay_installment(
                tenant,
                &actor(),
                inst.id,
                InstallmentPayment { safe_id: safe.id, amount: Some(Money::from(4_000)), date: day(6), description: None },
            )
            .await
            .unwrap();
        assert_eq!(receipt.installment.status, InstallmentStatus::Partial);
        assert_eq!(balance(&svc, tenant, safe.id).await, Money::from(4_000));

        let blocked = svc.delete_contract(tenant, &actor(), contract.id).await;
        assert!(matches!(blocked, Err(LedgerError::Domain(DomainError::Conflict(_)))));
        assert_eq!(svc.get::<Unit>(tenant, u.id).await.unwrap().status, UnitStatus::Sold);

        let remaining = svc.unit_remaining(tenant, u.id).await.unwrap();
        assert_eq!(remaining.remaining, Money::from(96_000));

        // Deleting the settlement voucher rolls the payment back.
        svc.delete_voucher(tenant, &actor(), receipt.voucher.id).await.unwrap();
        let inst = svc.get::<Installment>(tenant, inst.id).await.unwrap();
        assert_eq!(inst.paid_amount, Money::ZERO);
        assert_eq!(inst.status, InstallmentStatus::Pending);
        assert_eq!(balance(&svc, tenant, safe.id).await, Money::ZERO);
    }

    #[tokio::test]
    async fn overpaying_an_installment_is_rejected() {
        let svc = service();
        let tenant = TenantId::new();
        let safe = open_safe(&svc, tenant, 0).await;
        let u = unit(&svc, tenant).await;
        let inst = svc
            .create_record::<Installment>(
                tenant,
                &actor(),
                InstallmentDraft { unit_id: u.id, contract_id: None, amount: Money::from(1_000), due_date: day(5), notes: None },
            )
            .await
            .unwrap();

        let over = svc
            .pay_installment(
                tenant,
                &actor(),
                inst.id,
                InstallmentPayment { safe_id: safe.id, amount: Some(Money::from(1_001)), date: day(6), description: None },
            )
            .await;
        assert!(matches!(over, Err(LedgerError::Domain(DomainError::Validation(_)))));
        assert_eq!(balance(&svc, tenant, safe.id).await, Money::ZERO);

        let full = svc
            .pay_installment(
                tenant,
                &actor(),
                inst.id,
                InstallmentPayment { safe_id: safe.id, amount: None, date: day(6), description: None },
            )
            .await
            .unwrap();
        assert_eq!(full.installment.status, InstallmentStatus::Paid);

        let statuses = svc.installment_statuses(tenant, u.id).await.unwrap();
        assert_eq!(statuses[0].status, InstallmentStatus::Paid);
    }

    #[tokio::test]
    async fn paid_installment_cannot_change_unit() {
        let svc = service();
        let tenant = TenantId::new();
        let safe = open_safe(&svc, tenant, 0).await;
        let first = unit(&svc, tenant).await;
        let second = unit(&svc, tenant).await;
        let draft = |unit_id: UnitId, amount: i64| InstallmentDraft {
            unit_id,
            contract_id: None,
            amount: Money::from(amount),
            due_date: day(5),
            notes: None,
        };
        let inst = svc.create_record::<Installment>(tenant, &actor(), draft(first.id, 1_000)).await.unwrap();
        let receipt = svc
            .pay_installment(
                tenant,
                &actor(),
                inst.id,
                InstallmentPayment { safe_id: safe.id, amount: Some(Money::from(100)), date: day(6), description: None },
            )
            .await
            .unwrap();

        let moved = svc.update_record::<Installment>(tenant, &actor(), inst.id, draft(second.id, 1_000)).await;
        assert!(matches!(moved, Err(LedgerError::Domain(DomainError::Conflict(_)))));
        let stored = svc.get::<Installment>(tenant, inst.id).await.unwrap();
        assert_eq!(stored.unit_id, first.id);
        assert_eq!(stored.unit_id, receipt.voucher.unit_id.unwrap());

        // Same unit, new amount: allowed, status follows the paid amount.
        let raised = svc.update_record::<Installment>(tenant, &actor(), inst.id, draft(first.id, 1_500)).await.unwrap();
        assert_eq!(raised.paid_amount, Money::from(100));
        assert_eq!(raised.status, InstallmentStatus::Partial);

        // Once the receipt is gone the installment is free to move.
        svc.delete_voucher(tenant, &actor(), receipt.voucher.id).await.unwrap();
        let moved = svc.update_record::<Installment>(tenant, &actor(), inst.id, draft(second.id, 1_500)).await.unwrap();
        assert_eq!(moved.unit_id, second.id);
    }

    #[tokio::test]
    async fn paid_broker_due_is_frozen() {
        let svc = service();
        let tenant = TenantId::new();
        let safe = open_safe(&svc, tenant, 5_000).await;
        let broker = svc
            .create_record::<Broker>(tenant, &actor(), BrokerDraft { name: "Samir".into(), phone: None, notes: None })
            .await
            .unwrap();
        let draft = |amount: i64| BrokerDueDraft {
            broker_id: broker.id,
            contract_id: None,
            amount: Money::from(amount),
            due_date: day(10),
        };
        let due = svc.create_record::<BrokerDue>(tenant, &actor(), draft(1_000)).await.unwrap();
        let settlement = svc
            .pay_broker_due(
                tenant,
                &actor(),
                due.id,
                BrokerDuePayment { safe_id: safe.id, date: day(11), description: None },
            )
            .await
            .unwrap();

        let edited = svc.update_record::<BrokerDue>(tenant, &actor(), due.id, draft(1)).await;
        assert!(matches!(edited, Err(LedgerError::Domain(DomainError::Conflict(_)))));
        let stored = svc.get::<BrokerDue>(tenant, due.id).await.unwrap();
        assert_eq!(stored.amount, settlement.voucher.amount);
        assert_eq!(stored.status, BrokerDueStatus::Paid);

        // Deleting the payment voucher reopens the due for editing.
        svc.delete_voucher(tenant, &actor(), settlement.voucher.id).await.unwrap();
        let edited = svc.update_record::<BrokerDue>(tenant, &actor(), due.id, draft(800)).await.unwrap();
        assert_eq!(edited.amount, Money::from(800));
        assert_eq!(balance(&svc, tenant, safe.id).await, Money::from(5_000));
    }

    #[tokio::test]
    async fn referenced_records_cannot_be_deleted() {
        let svc = service();
        let tenant = TenantId::new();
        let u = unit(&svc, tenant).await;
        let c = customer(&svc, tenant).await;
        svc.create_contract(tenant, &actor(), contract_draft(u.id, c.id, 1_000)).await.unwrap();

        let blocked = svc.delete_record::<Customer>(tenant, &actor(), c.id).await;
        assert!(matches!(blocked, Err(LedgerError::Domain(DomainError::Conflict(_)))));
        assert!(svc.get::<Customer>(tenant, c.id).await.is_ok());
    }

    #[tokio::test]
    async fn unit_ownership_is_capped() {
        let svc = service();
        let tenant = TenantId::new();
        let u = unit(&svc, tenant).await;
        let group = svc
            .create_record::<PartnerGroup>(tenant, &actor(), propledger_ledger::PartnerGroupDraft { name: "Founders".into(), notes: None })
            .await
            .unwrap();
        let partner = |name: &str| propledger_ledger::PartnerDraft {
            name: name.into(),
            phone: None,
            group_id: Some(group.id),
            notes: None,
        };
        let p1 = svc.create_record::<Partner>(tenant, &actor(), partner("Ali")).await.unwrap();
        let p2 = svc.create_record::<Partner>(tenant, &actor(), partner("Hana")).await.unwrap();

        svc.create_record::<UnitPartner>(
            tenant,
            &actor(),
            UnitPartnerDraft { unit_id: u.id, partner_id: p1.id, percentage: dec!(60) },
        )
        .await
        .unwrap();
        let over = svc
            .create_record::<UnitPartner>(
                tenant,
                &actor(),
                UnitPartnerDraft { unit_id: u.id, partner_id: p2.id, percentage: dec!(50) },
            )
            .await;
        assert!(matches!(over, Err(LedgerError::Domain(DomainError::Validation(_)))));
        assert_eq!(svc.list::<UnitPartner>(tenant).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dashboard_collection_percentage() {
        let svc = service();
        let tenant = TenantId::new();
        let safe = open_safe(&svc, tenant, 0).await;
        let c = customer(&svc, tenant).await;

        let empty = svc.dashboard(tenant, day(1)).await.unwrap();
        assert_eq!(empty.collection_percentage, Decimal::ZERO);

        for price in [500_000, 450_000] {
            let u = unit(&svc, tenant).await;
            svc.create_contract(tenant, &actor(), contract_draft(u.id, c.id, price)).await.unwrap();
        }
        svc.record_voucher(tenant, &actor(), voucher(VoucherKind::Receipt, 100_000, safe.id)).await.unwrap();

        let summary = svc.dashboard(tenant, day(1)).await.unwrap();
        assert_eq!(summary.total_sales, Money::from(950_000));
        assert_eq!(summary.collection_percentage, dec!(10.53));
        assert_eq!(summary.units.sold, 2);

        let csv = svc.export_csv(tenant, Dataset::Dashboard, day(1)).await.unwrap();
        assert!(csv.contains("collection_percentage,10.53"));
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let svc = service();
        let a = TenantId::new();
        let b = TenantId::new();
        let safe = open_safe(&svc, a, 1000).await;

        let foreign = svc.record_voucher(b, &actor(), voucher(VoucherKind::Receipt, 10, safe.id)).await;
        assert!(matches!(foreign, Err(LedgerError::Domain(DomainError::NotFound(_)))));
        assert!(svc.list::<Safe>(b).await.unwrap().is_empty());
        assert!(svc.audit_log(b, AuditFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mutations_are_audited_newest_first() {
        let svc = service();
        let tenant = TenantId::new();
        let safe = open_safe(&svc, tenant, 0).await;
        let v = svc.record_voucher(tenant, &actor(), voucher(VoucherKind::Receipt, 10, safe.id)).await.unwrap();
        svc.delete_voucher(tenant, &actor(), v.id).await.unwrap();

        let entries = svc
            .audit_log(tenant, AuditFilter { entity_type: Some("voucher".into()), entity_id: None, limit: None })
            .await
            .unwrap();
        let actions: Vec<_> = entries.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Delete, AuditAction::Create]);
        assert_eq!(entries[0].ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn backup_restores_into_another_tenant() {
        let svc = service();
        let source = TenantId::new();
        let target = TenantId::new();
        let safe = open_safe(&svc, source, 1000).await;
        svc.record_voucher(source, &actor(), voucher(VoucherKind::Payment, 250, safe.id)).await.unwrap();
        open_safe(&svc, target, 5).await;

        let snapshot = svc.backup(source).await.unwrap();
        let summary = svc.restore(target, &actor(), snapshot).await.unwrap();
        assert_eq!(summary.rows_replaced, 1);
        assert_eq!(summary.rows_restored, 2);

        let safes = svc.list::<Safe>(target).await.unwrap();
        assert_eq!(safes.len(), 1);
        assert_eq!(safes[0].balance, Money::from(750));
        assert!(svc.reconcile_safe(target, safe.id).await.unwrap().consistent);
    }

    #[tokio::test]
    async fn drifted_backup_is_refused_without_side_effects() {
        let svc = service();
        let tenant = TenantId::new();
        let safe = open_safe(&svc, tenant, 1000).await;

        let mut snapshot = svc.backup(tenant).await.unwrap();
        snapshot.safes[0].balance = Money::from(1);
        assert!(svc.restore(tenant, &actor(), snapshot).await.is_err());
        assert_eq!(balance(&svc, tenant, safe.id).await, Money::from(1000));
    }

    #[tokio::test]
    async fn settings_round_trip_and_validate() {
        let svc = service();
        let tenant = TenantId::new();
        assert_eq!(svc.settings(tenant).await.unwrap(), AppSettings::default());

        let dark = AppSettings { theme: propledger_ledger::Theme::Dark, ..AppSettings::default() };
        svc.save_settings(tenant, &actor(), dark.clone()).await.unwrap();
        assert_eq!(svc.settings(tenant).await.unwrap(), dark);

        let bad = AppSettings { font_size: 2, ..AppSettings::default() };
        assert!(svc.save_settings(tenant, &actor(), bad).await.is_err());
    }

    fn kind_strategy() -> impl Strategy<Value = VoucherKind> {
        prop_oneof![Just(VoucherKind::Receipt), Just(VoucherKind::Payment)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn balance_tracks_active_vouchers(
            opening in 0i64..100_000,
            ops in prop::collection::vec((kind_strategy(), 1i64..10_000, any::<bool>()), 1..12),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let svc = service();
                let tenant = TenantId::new();
                let safe = open_safe(&svc, tenant, opening).await;

                let mut expected = Money::from(opening);
                for (kind, amount, delete) in ops {
                    let v = svc.record_voucher(tenant, &actor(), voucher(kind, amount, safe.id)).await.unwrap();
                    if delete {
                        svc.delete_voucher(tenant, &actor(), v.id).await.unwrap();
                    } else {
                        expected += kind.effect(Money::from(amount));
                    }
                }

                prop_assert_eq!(balance(&svc, tenant, safe.id).await, expected);
                prop_assert!(svc.reconcile_safe(tenant, safe.id).await.unwrap().consistent);
                Ok(())
            })?;
        }
    }
}
