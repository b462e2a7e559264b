//! Field validation shared by every create/update path.
//!
//! Rules live in one table keyed by `(EntityKind, field)`. Records only expose
//! their field values; [`validate`] looks up the rules for the record's kind
//! and applies them, then runs the record's cross-field invariants.

use rust_decimal::Decimal;

use propledger_core::{DomainError, DomainResult, Entity, EntityKind, Money};

/// A single field rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Text must be non-blank.
    Required,
    /// Text (when present) must not exceed this many characters.
    MaxLength(usize),
    /// Optional phone number: `+` then 7..=15 digits; spaces and dashes ignored.
    Phone,
    /// Optional national id: exactly 14 digits.
    NationalId,
    /// Amount > 0.
    Positive,
    /// Amount >= 0.
    NonNegative,
    /// 0 < value <= 100.
    Percentage,
}

/// A record field as seen by the rule table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    OptText(Option<&'a str>),
    Amount(Money),
    Number(Decimal),
}

/// Records expose field values for the rule table and may add invariants that
/// span several fields.
pub trait Validate {
    fn field_values(&self) -> Vec<(&'static str, FieldValue<'_>)>;

    fn check_invariants(&self) -> DomainResult<()> {
        Ok(())
    }
}

pub const FIELD_RULES: &[(EntityKind, &str, Rule)] = &[
    (EntityKind::Customer, "name", Rule::Required),
    (EntityKind::Customer, "name", Rule::MaxLength(120)),
    (EntityKind::Customer, "phone", Rule::Required),
    (EntityKind::Customer, "phone", Rule::Phone),
    (EntityKind::Customer, "national_id", Rule::NationalId),
    (EntityKind::Customer, "address", Rule::MaxLength(250)),
    (EntityKind::Unit, "code", Rule::Required),
    (EntityKind::Unit, "code", Rule::MaxLength(40)),
    (EntityKind::Unit, "unit_type", Rule::Required),
    (EntityKind::Unit, "area", Rule::NonNegative),
    (EntityKind::Unit, "list_price", Rule::NonNegative),
    (EntityKind::PartnerGroup, "name", Rule::Required),
    (EntityKind::Partner, "name", Rule::Required),
    (EntityKind::Partner, "phone", Rule::Phone),
    (EntityKind::UnitPartner, "percentage", Rule::Percentage),
    (EntityKind::Broker, "name", Rule::Required),
    (EntityKind::Broker, "phone", Rule::Phone),
    (EntityKind::BrokerDue, "amount", Rule::Positive),
    (EntityKind::PartnerDebt, "amount", Rule::Positive),
    (EntityKind::PartnerDebt, "description", Rule::MaxLength(500)),
    (EntityKind::Installment, "amount", Rule::Positive),
    (EntityKind::Installment, "paid_amount", Rule::NonNegative),
    (EntityKind::Contract, "total_price", Rule::Positive),
    (EntityKind::Contract, "discount_amount", Rule::NonNegative),
    (EntityKind::Contract, "broker_amount", Rule::NonNegative),
    (EntityKind::Safe, "name", Rule::Required),
    (EntityKind::Safe, "name", Rule::MaxLength(120)),
    (EntityKind::Transfer, "amount", Rule::Positive),
    (EntityKind::Transfer, "description", Rule::MaxLength(500)),
    (EntityKind::Voucher, "amount", Rule::Positive),
    (EntityKind::Voucher, "description", Rule::MaxLength(500)),
];

/// Apply every table rule for `T::KIND`, then the record's own invariants.
pub fn validate<T: Entity + Validate>(record: &T) -> DomainResult<()> {
    let values = record.field_values();
    for (kind, field, rule) in FIELD_RULES {
        if *kind != T::KIND {
            continue;
        }
        for (name, value) in values.iter().filter(|(name, _)| name == field) {
            check(*rule, value).map_err(|msg| {
                DomainError::validation(format!("{}.{}: {}", T::KIND, name, msg))
            })?;
        }
    }
    record.check_invariants()
}

fn check(rule: Rule, value: &FieldValue<'_>) -> Result<(), String> {
    match (rule, value) {
        (Rule::Required, FieldValue::Text(s)) => required(Some(s)),
        (Rule::Required, FieldValue::OptText(s)) => required(*s),
        (Rule::MaxLength(max), FieldValue::Text(s)) => max_length(s, max),
        (Rule::MaxLength(max), FieldValue::OptText(Some(s))) => max_length(s, max),
        (Rule::Phone, FieldValue::Text(s)) => phone(s),
        (Rule::Phone, FieldValue::OptText(Some(s))) => phone(s),
        (Rule::NationalId, FieldValue::Text(s)) => national_id(s),
        (Rule::NationalId, FieldValue::OptText(Some(s))) => national_id(s),
        (Rule::Positive, v) => match number(v) {
            Some(n) if n > Decimal::ZERO => Ok(()),
            Some(_) => Err("must be greater than zero".to_string()),
            None => Ok(()),
        },
        (Rule::NonNegative, v) => match number(v) {
            Some(n) if n < Decimal::ZERO => Err("must not be negative".to_string()),
            _ => Ok(()),
        },
        (Rule::Percentage, v) => match number(v) {
            Some(n) if n <= Decimal::ZERO || n > Decimal::ONE_HUNDRED => {
                Err("must be within (0, 100]".to_string())
            }
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}

fn number(value: &FieldValue<'_>) -> Option<Decimal> {
    match value {
        FieldValue::Amount(m) => Some(m.amount()),
        FieldValue::Number(n) => Some(*n),
        _ => None,
    }
}

fn required(s: Option<&str>) -> Result<(), String> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err("is required".to_string()),
    }
}

fn max_length(s: &str, max: usize) -> Result<(), String> {
    if s.chars().count() > max {
        Err(format!("must be at most {max} characters"))
    } else {
        Ok(())
    }
}

fn phone(s: &str) -> Result<(), String> {
    let compact: String = s.chars().filter(|c| *c != ' ' && *c != '-').collect();
    if compact.is_empty() {
        return Ok(());
    }
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err("must be a phone number of 7 to 15 digits".to_string())
    }
}

fn national_id(s: &str) -> Result<(), String> {
    if s.is_empty() {
        return Ok(());
    }
    if s.len() == 14 && s.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err("must be exactly 14 digits".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_accepts_common_formats() {
        assert!(phone("+20 100-123-4567").is_ok());
        assert!(phone("01001234567").is_ok());
        assert!(phone("").is_ok());
        assert!(phone("12345").is_err());
        assert!(phone("0100abc4567").is_err());
    }

    #[test]
    fn national_id_requires_fourteen_digits() {
        assert!(national_id("29801011234567").is_ok());
        assert!(national_id("2980101123456").is_err());
        assert!(national_id("2980101123456x").is_err());
    }

    #[test]
    fn percentage_bounds() {
        let ok = FieldValue::Number(Decimal::ONE_HUNDRED);
        let zero = FieldValue::Number(Decimal::ZERO);
        assert!(check(Rule::Percentage, &ok).is_ok());
        assert!(check(Rule::Percentage, &zero).is_err());
    }

    #[test]
    fn absent_optional_text_passes_format_rules() {
        assert!(check(Rule::Phone, &FieldValue::OptText(None)).is_ok());
        assert!(check(Rule::NationalId, &FieldValue::OptText(None)).is_ok());
        assert!(check(Rule::Required, &FieldValue::OptText(None)).is_err());
    }
}
