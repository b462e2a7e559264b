use serde::{Deserialize, Serialize};

use propledger_core::{DomainError, DomainResult};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Per-tenant presentation preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub theme: Theme,
    pub font_family: String,
    pub font_size: u8,
    pub currency: String,
    pub date_format: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            font_family: "Cairo".to_string(),
            font_size: 14,
            currency: "EGP".to_string(),
            date_format: "YYYY-MM-DD".to_string(),
        }
    }
}

impl AppSettings {
    pub const FONT_SIZE_RANGE: std::ops::RangeInclusive<u8> = 8..=32;

    pub fn validate(&self) -> DomainResult<()> {
        if self.font_family.trim().is_empty() {
            return Err(DomainError::validation("settings.font_family: is required"));
        }
        if !Self::FONT_SIZE_RANGE.contains(&self.font_size) {
            return Err(DomainError::validation(format!(
                "settings.font_size: must be between {} and {}",
                Self::FONT_SIZE_RANGE.start(),
                Self::FONT_SIZE_RANGE.end()
            )));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::validation(
                "settings.currency: must be a three-letter ISO code",
            ));
        }
        if self.date_format.trim().is_empty() {
            return Err(DomainError::validation("settings.date_format: is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AppSettings::default().validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: AppSettings = serde_json::from_str(r#"{"theme":"dark","font_size":16}"#).unwrap();
        assert_eq!(s.theme, Theme::Dark);
        assert_eq!(s.font_size, 16);
        assert_eq!(s.currency, "EGP");
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut s = AppSettings { font_size: 40, ..AppSettings::default() };
        assert!(s.validate().is_err());
        s.font_size = 12;
        s.currency = "egp".into();
        assert!(s.validate().is_err());
    }
}
