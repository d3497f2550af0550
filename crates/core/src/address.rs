//! Postal address captured on orders.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Billing or shipping address, stored on the order as an immutable snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub full_name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 code.
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ValueObject for Address {}

impl Address {
    pub fn validate(&self) -> DomainResult<()> {
        let required = [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("address {field} is required")));
            }
        }
        if self.country.len() != 2 || !self.country.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(DomainError::validation(
                "address country must be a two-letter code",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample() -> Address {
    Address {
        full_name: "Ada Lovelace".into(),
        line1: "12 Analytical Row".into(),
        line2: None,
        city: "London".into(),
        state: None,
        postal_code: "NW1 6XE".into(),
        country: "GB".into(),
        phone: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_address_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn blank_city_and_bad_country_are_rejected() {
        let mut a = sample();
        a.city = "  ".into();
        assert!(a.validate().is_err());

        let mut b = sample();
        b.country = "GBR".into();
        assert!(b.validate().is_err());
    }
}
