//! Input validation for customer records and other user-entered fields.
//!
//! Validation runs before any network call; a failing form never reaches
//! the backend.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 15-character GSTIN: state code, PAN, entity number, `Z`, checksum.
pub static GSTIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][1-9A-Z]Z[0-9A-Z]$").expect("valid GSTIN regex")
});

/// Indian mobile number with optional `+91` / `0` prefix.
pub static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\+91[\-\s]?|0)?[6-9][0-9]{9}$").expect("valid phone regex")
});

pub static PINCODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9][0-9]{5}$").expect("valid pincode regex"));

pub fn is_valid_gstin(value: &str) -> bool {
    GSTIN_REGEX.is_match(value)
}

pub fn is_valid_phone(value: &str) -> bool {
    PHONE_REGEX.is_match(value)
}

/// A customer as entered on the create/edit form, after trimming.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    #[validate(length(min = 1, max = 120, message = "Customer name is required"))]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(regex(path = *GSTIN_REGEX, message = "Invalid GSTIN format"))]
    pub gstin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(regex(path = *PHONE_REGEX, message = "Invalid phone number"))]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(regex(path = *PINCODE_REGEX, message = "Invalid pincode"))]
    pub pincode: Option<String>,
}

impl NewCustomer {
    /// Build from raw form values: trims everything, drops blanks and
    /// upper-cases the GSTIN.
    pub fn from_form(
        name: &str,
        gstin: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
        address: Option<&str>,
        state: Option<&str>,
        pincode: Option<&str>,
    ) -> Self {
        Self {
            name: name.trim().to_string(),
            gstin: non_blank(gstin).map(|g| g.to_uppercase()),
            email: non_blank(email),
            phone: non_blank(phone).map(|p| p.replace(' ', "")),
            address: non_blank(address),
            state: non_blank(state),
            pincode: non_blank(pincode),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Flatten `ValidationErrors` into `field: message` lines for a banner.
pub fn describe(errors: &validator::ValidationErrors) -> Vec<String> {
    let mut lines: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{}: {}", field, message),
                None => format!("{}: invalid value", field),
            })
        })
        .collect();
    lines.sort();
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer_with_gstin(gstin: &str) -> NewCustomer {
        NewCustomer::from_form("Wayanad Traders", Some(gstin), None, None, None, None, None)
    }

    #[test]
    fn well_formed_gstin_passes() {
        assert!(is_valid_gstin("32AAECW1234B1Z0"));
        assert!(customer_with_gstin("32AAECW1234B1Z0").validate().is_ok());
    }

    #[test]
    fn malformed_gstin_blocks_the_form() {
        assert!(!is_valid_gstin("invalid-gstin"));

        let errors = customer_with_gstin("invalid-gstin").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("gstin"));
        assert_eq!(describe(&errors), vec!["gstin: Invalid GSTIN format".to_string()]);
    }

    #[test]
    fn lowercase_gstin_is_normalized_before_validation() {
        let customer = customer_with_gstin(" 32aaecw1234b1z0 ");
        assert_eq!(customer.gstin.as_deref(), Some("32AAECW1234B1Z0"));
        assert!(customer.validate().is_ok());
    }

    #[test]
    fn blank_optional_fields_are_skipped() {
        let customer = NewCustomer::from_form("Malabar Mart", Some(""), Some("  "), None, None, None, Some(""));
        assert!(customer.gstin.is_none());
        assert!(customer.email.is_none());
        assert!(customer.validate().is_ok());
    }

    #[test]
    fn email_phone_and_name_are_checked() {
        let customer = NewCustomer::from_form(
            "  ",
            None,
            Some("not-an-email"),
            Some("12345"),
            None,
            None,
            Some("012345"),
        );

        let errors = customer.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("phone"));
        assert!(fields.contains_key("pincode"));
    }

    #[test]
    fn phone_accepts_common_indian_formats() {
        assert!(is_valid_phone("9847012345"));
        assert!(is_valid_phone("+919847012345"));
        assert!(is_valid_phone("09847012345"));
        assert!(!is_valid_phone("5847012345"));
    }
}
