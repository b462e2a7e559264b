//! Read-only aggregations over active rows.
//!
//! Every function here is pure: callers pass in what the store returned for
//! default (active-only) reads. Sums stay exact; the output structs hold
//! two-decimal values rounded once at construction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use propledger_core::money::round2;
use propledger_core::{ContractId, Money, PartnerId, SafeId, UnitId, UnitPartnerId};

use crate::installment::Installment;
use crate::parties::UnitPartner;
use crate::property::{Contract, Unit, UnitStatus};
use crate::safe::Safe;
use crate::transfer::Transfer;
use crate::voucher::{Voucher, VoucherKind};

pub fn total_sales(contracts: &[Contract]) -> Money {
    contracts.iter().map(|c| c.total_price).sum()
}

pub fn total_by_kind(vouchers: &[Voucher], kind: VoucherKind) -> Money {
    vouchers
        .iter()
        .filter(|v| v.kind == kind)
        .map(|v| v.amount)
        .sum()
}

/// Receipts as a percentage of sales; zero when nothing has been sold.
pub fn collection_percentage(total_receipts: Money, total_sales: Money) -> Decimal {
    if total_sales.is_zero() {
        return Decimal::ZERO;
    }
    round2(total_receipts.amount() / total_sales.amount() * Decimal::ONE_HUNDRED)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitCounts {
    pub available: usize,
    pub reserved: usize,
    pub sold: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_sales: Money,
    pub total_receipts: Money,
    pub total_expenses: Money,
    pub net_profit: Money,
    pub collection_percentage: Decimal,
    pub safes_balance: Money,
    pub contracts: usize,
    pub units: UnitCounts,
    pub overdue_installments: usize,
}

impl DashboardSummary {
    pub fn build(
        contracts: &[Contract],
        vouchers: &[Voucher],
        safes: &[Safe],
        units: &[Unit],
        installments: &[Installment],
        today: NaiveDate,
    ) -> Self {
        let sales = total_sales(contracts);
        let receipts = total_by_kind(vouchers, VoucherKind::Receipt);
        let expenses = total_by_kind(vouchers, VoucherKind::Payment);
        let count = |status: UnitStatus| units.iter().filter(|u| u.status == status).count();

        Self {
            total_sales: sales.round2(),
            total_receipts: receipts.round2(),
            total_expenses: expenses.round2(),
            net_profit: (receipts - expenses).round2(),
            collection_percentage: collection_percentage(receipts, sales),
            safes_balance: safes.iter().map(|s| s.balance).sum::<Money>().round2(),
            contracts: contracts.len(),
            units: UnitCounts {
                available: count(UnitStatus::Available),
                reserved: count(UnitStatus::Reserved),
                sold: count(UnitStatus::Sold),
            },
            overdue_installments: installments.iter().filter(|i| i.is_overdue(today)).count(),
        }
    }
}

/// What is left to collect on a unit's contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitRemaining {
    pub unit_id: UnitId,
    pub contract_id: ContractId,
    pub net_price: Money,
    pub paid: Money,
    pub remaining: Money,
}

/// `(total_price − discount) − Σ paid installment amounts` for the contract's unit.
pub fn unit_remaining(contract: &Contract, installments: &[Installment]) -> UnitRemaining {
    let paid: Money = installments
        .iter()
        .filter(|i| i.unit_id == contract.unit_id)
        .map(|i| i.paid_amount)
        .sum();
    let net = contract.net_price();

    UnitRemaining {
        unit_id: contract.unit_id,
        contract_id: contract.id,
        net_price: net.round2(),
        paid: paid.round2(),
        remaining: (net - paid).round2(),
    }
}

/// Net cash that went through a unit: its receipts minus its payments.
pub fn unit_cash_flow(unit_id: UnitId, vouchers: &[Voucher]) -> Money {
    vouchers
        .iter()
        .filter(|v| v.unit_id == Some(unit_id))
        .map(|v| v.effect())
        .sum()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartnerShare {
    pub unit_partner_id: UnitPartnerId,
    pub partner_id: PartnerId,
    pub percentage: Decimal,
    pub share: Money,
}

/// Split a unit's net cash flow between its partners by ownership percentage.
pub fn partner_shares(unit_id: UnitId, partners: &[UnitPartner], vouchers: &[Voucher]) -> Vec<PartnerShare> {
    let flow = unit_cash_flow(unit_id, vouchers);
    partners
        .iter()
        .filter(|p| p.unit_id == unit_id)
        .map(|p| PartnerShare {
            unit_partner_id: p.id,
            partner_id: p.partner_id,
            percentage: p.percentage,
            share: flow.percent(p.percentage).round2(),
        })
        .collect()
}

/// Stored balance versus the balance implied by active vouchers and transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafeReconciliation {
    pub safe_id: SafeId,
    pub recorded_balance: Money,
    pub expected_balance: Money,
    pub drift: Money,
    pub consistent: bool,
}

pub fn reconcile_safe(safe: &Safe, vouchers: &[Voucher], transfers: &[Transfer]) -> SafeReconciliation {
    let vouchers_effect: Money = vouchers
        .iter()
        .filter(|v| v.safe_id == safe.id)
        .map(|v| v.effect())
        .sum();
    let transfers_effect: Money = transfers.iter().map(|t| t.effect_on(safe.id)).sum();
    let expected = safe.opening_balance + vouchers_effect + transfers_effect;
    let drift = safe.balance - expected;

    SafeReconciliation {
        safe_id: safe.id,
        recorded_balance: safe.balance,
        expected_balance: expected,
        drift,
        consistent: drift.is_zero(),
    }
}
