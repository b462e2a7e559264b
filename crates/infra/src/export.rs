//! CSV exports of ledger data.
//!
//! Each dataset is rendered from the same active rows the JSON API returns.
//! Monetary columns are written as exact decimals; the dashboard export is a
//! two-column `metric,value` sheet.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use propledger_core::{
    ContractId, CustomerId, DomainError, InstallmentId, Money, SafeId, UnitId, VoucherId,
};
use propledger_ledger::{Contract, DashboardSummary, Installment, Safe, Voucher};

use crate::store::StoreError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Dataset {
    Vouchers,
    Contracts,
    Installments,
    Safes,
    Dashboard,
}

impl Dataset {
    pub fn as_str(self) -> &'static str {
        match self {
            Dataset::Vouchers => "vouchers",
            Dataset::Contracts => "contracts",
            Dataset::Installments => "installments",
            Dataset::Safes => "safes",
            Dataset::Dashboard => "dashboard",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.csv", self.as_str())
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = DomainError;

    /// Accepts the bare name or the `.csv` file name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_suffix(".csv").unwrap_or(s) {
            "vouchers" => Ok(Dataset::Vouchers),
            "contracts" => Ok(Dataset::Contracts),
            "installments" => Ok(Dataset::Installments),
            "safes" => Ok(Dataset::Safes),
            "dashboard" => Ok(Dataset::Dashboard),
            other => Err(DomainError::validation(format!("export: unknown dataset '{other}'"))),
        }
    }
}

#[derive(Serialize)]
struct VoucherRow<'a> {
    id: VoucherId,
    date: NaiveDate,
    kind: &'static str,
    amount: Money,
    safe_id: SafeId,
    unit_id: Option<UnitId>,
    party_name: Option<&'a str>,
    description: &'a str,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct ContractRow<'a> {
    id: ContractId,
    unit_id: UnitId,
    customer_id: CustomerId,
    start_date: NaiveDate,
    total_price: Money,
    discount_amount: Money,
    net_price: Money,
    broker_name: Option<&'a str>,
    broker_amount: Money,
}

#[derive(Serialize)]
struct InstallmentRow {
    id: InstallmentId,
    unit_id: UnitId,
    contract_id: Option<ContractId>,
    due_date: NaiveDate,
    amount: Money,
    paid_amount: Money,
    status: &'static str,
}

#[derive(Serialize)]
struct SafeRow<'a> {
    id: SafeId,
    name: &'a str,
    opening_balance: Money,
    balance: Money,
}

#[derive(Serialize)]
struct MetricRow {
    metric: &'static str,
    value: String,
}

pub fn vouchers_csv(vouchers: &[Voucher]) -> Result<String, StoreError> {
    write_rows(vouchers.iter().map(|v| VoucherRow {
        id: v.id,
        date: v.date,
        kind: v.kind.as_str(),
        amount: v.amount,
        safe_id: v.safe_id,
        unit_id: v.unit_id,
        party_name: v.party_name.as_deref(),
        description: &v.description,
        created_at: v.created_at,
    }))
}

pub fn contracts_csv(contracts: &[Contract]) -> Result<String, StoreError> {
    write_rows(contracts.iter().map(|c| ContractRow {
        id: c.id,
        unit_id: c.unit_id,
        customer_id: c.customer_id,
        start_date: c.start_date,
        total_price: c.total_price,
        discount_amount: c.discount_amount,
        net_price: c.net_price().round2(),
        broker_name: c.broker_name.as_deref(),
        broker_amount: c.broker_amount,
    }))
}

pub fn installments_csv(installments: &[Installment]) -> Result<String, StoreError> {
    write_rows(installments.iter().map(|i| InstallmentRow {
        id: i.id,
        unit_id: i.unit_id,
        contract_id: i.contract_id,
        due_date: i.due_date,
        amount: i.amount,
        paid_amount: i.paid_amount,
        status: i.status.as_str(),
    }))
}

pub fn safes_csv(safes: &[Safe]) -> Result<String, StoreError> {
    write_rows(safes.iter().map(|s| SafeRow {
        id: s.id,
        name: &s.name,
        opening_balance: s.opening_balance,
        balance: s.balance,
    }))
}

pub fn dashboard_csv(summary: &DashboardSummary) -> Result<String, StoreError> {
    let money = |m: Money| m.amount().to_string();
    let count = |n: usize| n.to_string();
    let pct = |d: Decimal| d.to_string();

    write_rows([
        MetricRow { metric: "total_sales", value: money(summary.total_sales) },
        MetricRow { metric: "total_receipts", value: money(summary.total_receipts) },
        MetricRow { metric: "total_expenses", value: money(summary.total_expenses) },
        MetricRow { metric: "net_profit", value: money(summary.net_profit) },
        MetricRow { metric: "collection_percentage", value: pct(summary.collection_percentage) },
        MetricRow { metric: "safes_balance", value: money(summary.safes_balance) },
        MetricRow { metric: "contracts", value: count(summary.contracts) },
        MetricRow { metric: "units_available", value: count(summary.units.available) },
        MetricRow { metric: "units_reserved", value: count(summary.units.reserved) },
        MetricRow { metric: "units_sold", value: count(summary.units.sold) },
        MetricRow { metric: "overdue_installments", value: count(summary.overdue_installments) },
    ])
}

fn write_rows<R: Serialize>(rows: impl IntoIterator<Item = R>) -> Result<String, StoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| StoreError::Serialization(format!("csv: {e}")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| StoreError::Serialization(format!("csv: {e}")))?;
    String::from_utf8(bytes).map_err(|e| StoreError::Serialization(format!("csv: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use propledger_ledger::{SafeDraft, VoucherDraft, VoucherKind};
    use rust_decimal_macros::dec;

    #[test]
    fn dataset_names_parse_with_or_without_extension() {
        assert_eq!("vouchers".parse::<Dataset>().unwrap(), Dataset::Vouchers);
        assert_eq!("dashboard.csv".parse::<Dataset>().unwrap(), Dataset::Dashboard);
        assert!("ledger.xlsx".parse::<Dataset>().is_err());
        assert_eq!(Dataset::Safes.file_name(), "safes.csv");
    }

    #[test]
    fn voucher_export_has_header_and_one_line_per_row() {
        let safe_id = SafeId::new();
        let voucher = Voucher::record(
            VoucherId::new(),
            VoucherDraft {
                kind: VoucherKind::Receipt,
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                amount: Money::new(dec!(1250.50)),
                safe_id,
                description: "down payment, unit 4".into(),
                party_name: Some("Omar".into()),
                unit_id: None,
            },
            Utc::now(),
        );

        let csv = vouchers_csv(&[voucher]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,date,kind,amount,safe_id,unit_id,party_name,description,created_at"
        );
        let row = lines.next().unwrap();
        assert!(row.contains(",receipt,1250.50,"));
        assert!(row.contains("\"down payment, unit 4\""));
        assert!(lines.next().is_none());
    }

    #[test]
    fn safes_export_lists_balances() {
        let safe = Safe::open(
            SafeId::new(),
            SafeDraft { name: "Main".into(), opening_balance: Money::from(1000), notes: None },
            Utc::now(),
        );
        let csv = safes_csv(&[safe]).unwrap();
        assert!(csv.starts_with("id,name,opening_balance,balance\n"));
        assert!(csv.contains(",Main,1000,1000"));
    }
}
