//! Receipt and payment vouchers and their effect on safe balances.
//!
//! A voucher moves exactly one safe. Creating it applies its effect, editing
//! it reverts the old effect before applying the new one (possibly on another
//! safe), deleting it reverts the effect once. The functions here only say
//! *which* adjustments are due; the caller applies them inside one unit of work.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use propledger_core::{
    BrokerDueId, DomainError, DomainResult, Entity, EntityKind, InstallmentId, Money, Reference,
    SafeId, UnitId, VoucherId,
};

use crate::validation::{FieldValue, Validate};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherKind {
    /// Money in.
    Receipt,
    /// Money out.
    Payment,
}

impl VoucherKind {
    /// Signed effect of `amount` on the owning safe.
    pub fn effect(self, amount: Money) -> Money {
        match self {
            VoucherKind::Receipt => amount,
            VoucherKind::Payment => -amount,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VoucherKind::Receipt => "receipt",
            VoucherKind::Payment => "payment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: VoucherId,
    pub kind: VoucherKind,
    pub date: NaiveDate,
    pub amount: Money,
    pub safe_id: SafeId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub party_name: Option<String>,
    #[serde(default)]
    pub unit_id: Option<UnitId>,
    /// Set when the voucher settles (part of) an installment.
    #[serde(default)]
    pub installment_id: Option<InstallmentId>,
    /// Set when the voucher pays a broker due.
    #[serde(default)]
    pub broker_due_id: Option<BrokerDueId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoucherDraft {
    pub kind: VoucherKind,
    pub date: NaiveDate,
    pub amount: Money,
    pub safe_id: SafeId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub party_name: Option<String>,
    #[serde(default)]
    pub unit_id: Option<UnitId>,
}

/// A signed balance change for one safe.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BalanceAdjustment {
    pub safe_id: SafeId,
    pub delta: Money,
}

impl Voucher {
    pub fn record(id: VoucherId, draft: VoucherDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            kind: draft.kind,
            date: draft.date,
            amount: draft.amount,
            safe_id: draft.safe_id,
            description: draft.description,
            party_name: draft.party_name,
            unit_id: draft.unit_id,
            installment_id: None,
            broker_due_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Signed effect on the owning safe.
    pub fn effect(&self) -> Money {
        self.kind.effect(self.amount)
    }

    /// Vouchers generated by an installment or broker-due payment.
    pub fn is_settlement(&self) -> bool {
        self.installment_id.is_some() || self.broker_due_id.is_some()
    }

    /// The voucher as it would look after applying `draft`.
    ///
    /// Settlement vouchers keep their kind, amount and unit: those are mirrored
    /// on the settled installment/due and must change through that record.
    pub fn revised(&self, draft: VoucherDraft, now: DateTime<Utc>) -> DomainResult<Voucher> {
        if self.is_settlement()
            && (draft.kind != self.kind
                || draft.amount != self.amount
                || draft.unit_id != self.unit_id)
        {
            return Err(DomainError::conflict(
                "voucher settles an installment or broker due; delete it and record the payment again",
            ));
        }

        Ok(Voucher {
            id: self.id,
            kind: draft.kind,
            date: draft.date,
            amount: draft.amount,
            safe_id: draft.safe_id,
            description: draft.description,
            party_name: draft.party_name,
            unit_id: draft.unit_id,
            installment_id: self.installment_id,
            broker_due_id: self.broker_due_id,
            created_at: self.created_at,
            updated_at: now,
        })
    }

    /// Adjustment applied when the voucher is recorded.
    pub fn apply_adjustment(&self) -> BalanceAdjustment {
        BalanceAdjustment {
            safe_id: self.safe_id,
            delta: self.effect(),
        }
    }

    /// Adjustment that undoes this voucher's effect.
    pub fn revert_adjustment(&self) -> BalanceAdjustment {
        BalanceAdjustment {
            safe_id: self.safe_id,
            delta: -self.effect(),
        }
    }
}

/// Ordered adjustments for an edit: revert `old` on its safe, then apply
/// `new` on its (possibly different) safe.
pub fn update_adjustments(old: &Voucher, new: &Voucher) -> [BalanceAdjustment; 2] {
    [old.revert_adjustment(), new.apply_adjustment()]
}

impl Entity for Voucher {
    const KIND: EntityKind = EntityKind::Voucher;
    type Id = VoucherId;

    fn id(&self) -> VoucherId {
        self.id
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![Reference::new(EntityKind::Safe, self.safe_id)];
        if let Some(unit_id) = self.unit_id {
            refs.push(Reference::new(EntityKind::Unit, unit_id));
        }
        refs
    }
}

impl Validate for Voucher {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        vec![
            ("amount", FieldValue::Amount(self.amount)),
            ("description", FieldValue::Text(&self.description)),
            ("party_name", FieldValue::OptText(self.party_name.as_deref())),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe::{Safe, SafeDraft};
    use crate::validation::validate;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn test_safe(opening: Decimal) -> Safe {
        Safe::open(
            SafeId::new(),
            SafeDraft {
                name: "Main".to_string(),
                opening_balance: Money::new(opening),
                notes: None,
            },
            Utc::now(),
        )
    }

    fn draft(kind: VoucherKind, amount: Decimal, safe_id: SafeId) -> VoucherDraft {
        VoucherDraft {
            kind,
            date: test_date(),
            amount: Money::new(amount),
            safe_id,
            description: String::new(),
            party_name: None,
            unit_id: None,
        }
    }

    fn apply(safe: &mut Safe, adj: BalanceAdjustment) {
        assert_eq!(adj.safe_id, safe.id);
        safe.apply(adj.delta, Utc::now());
    }

    #[test]
    fn receipt_adds_and_payment_subtracts() {
        assert_eq!(VoucherKind::Receipt.effect(Money::from(5)), Money::from(5));
        assert_eq!(VoucherKind::Payment.effect(Money::from(5)), Money::from(-5));
    }

    #[test]
    fn non_positive_amount_is_a_validation_error() {
        let v = Voucher::record(VoucherId::new(), draft(VoucherKind::Receipt, dec!(0), SafeId::new()), Utc::now());
        match validate(&v) {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("voucher.amount")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn receipt_then_payment_edit_then_delete_returns_to_start() {
        let mut safe = test_safe(dec!(1000));

        let v = Voucher::record(VoucherId::new(), draft(VoucherKind::Receipt, dec!(500), safe.id), Utc::now());
        apply(&mut safe, v.apply_adjustment());
        assert_eq!(safe.balance, Money::from(1500));

        let edited = v.revised(draft(VoucherKind::Payment, dec!(200), safe.id), Utc::now()).unwrap();
        for adj in update_adjustments(&v, &edited) {
            apply(&mut safe, adj);
        }
        assert_eq!(safe.balance, Money::from(800));

        apply(&mut safe, edited.revert_adjustment());
        assert_eq!(safe.balance, Money::from(1000));
    }

    #[test]
    fn moving_between_safes_touches_both() {
        let mut a = test_safe(dec!(100));
        let mut b = test_safe(dec!(100));

        let v = Voucher::record(VoucherId::new(), draft(VoucherKind::Receipt, dec!(40), a.id), Utc::now());
        apply(&mut a, v.apply_adjustment());

        let moved = v.revised(draft(VoucherKind::Receipt, dec!(60), b.id), Utc::now()).unwrap();
        let [revert, reapply] = update_adjustments(&v, &moved);
        apply(&mut a, revert);
        apply(&mut b, reapply);

        assert_eq!(a.balance, Money::from(100));
        assert_eq!(b.balance, Money::from(160));
    }

    #[test]
    fn settlement_vouchers_keep_their_amount() {
        let mut v = Voucher::record(VoucherId::new(), draft(VoucherKind::Receipt, dec!(10), SafeId::new()), Utc::now());
        v.installment_id = Some(InstallmentId::new());

        let err = v.revised(draft(VoucherKind::Receipt, dec!(11), v.safe_id), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let mut same = draft(VoucherKind::Receipt, dec!(10), SafeId::new());
        same.description = "moved".to_string();
        let moved = v.revised(same, Utc::now()).unwrap();
        assert_eq!(moved.installment_id, v.installment_id);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after any sequence of vouchers on one safe, the balance is
        /// the opening balance plus receipts minus payments.
        #[test]
        fn balance_is_opening_plus_signed_sum(
            entries in prop::collection::vec((any::<bool>(), 1i64..1_000_000i64), 1..20)
        ) {
            let mut safe = test_safe(dec!(1000));
            let mut expected = Money::from(1000);

            for (is_receipt, cents) in entries {
                let kind = if is_receipt { VoucherKind::Receipt } else { VoucherKind::Payment };
                let amount = Decimal::new(cents, 2);
                let v = Voucher::record(VoucherId::new(), draft(kind, amount, safe.id), Utc::now());
                apply(&mut safe, v.apply_adjustment());
                expected += kind.effect(Money::new(amount));
            }

            prop_assert_eq!(safe.balance, expected);
        }

        /// Property: editing the amount on the same safe and kind moves the
        /// balance by exactly the signed difference.
        #[test]
        fn amount_edit_moves_balance_by_difference(
            is_receipt in any::<bool>(),
            a in 1i64..1_000_000i64,
            b in 1i64..1_000_000i64,
        ) {
            let kind = if is_receipt { VoucherKind::Receipt } else { VoucherKind::Payment };
            let mut safe = test_safe(dec!(0));
            let v = Voucher::record(VoucherId::new(), draft(kind, Decimal::from(a), safe.id), Utc::now());
            apply(&mut safe, v.apply_adjustment());
            let before = safe.balance;

            let edited = v.revised(draft(kind, Decimal::from(b), safe.id), Utc::now()).unwrap();
            for adj in update_adjustments(&v, &edited) {
                apply(&mut safe, adj);
            }

            prop_assert_eq!(safe.balance - before, kind.effect(Money::from(b - a)));
        }
    }
}
