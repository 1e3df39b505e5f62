//! Intake form rules. Checks run in a fixed order and stop at the first failure.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::domain::CustomerContact;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern")
});

pub const PHONE_DIGITS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("All fields are required.")]
    MissingField,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Phone number must be exactly 10 digits.")]
    InvalidPhone,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

pub fn is_valid_phone(phone: &str) -> bool {
    phone.len() == PHONE_DIGITS && phone.bytes().all(|b| b.is_ascii_digit())
}

/// Returns the trimmed contact when every rule passes.
pub fn validate_contact(contact: &CustomerContact) -> Result<CustomerContact, ValidationError> {
    let trimmed = CustomerContact {
        first_name: contact.first_name.trim().to_string(),
        last_name: contact.last_name.trim().to_string(),
        email: contact.email.trim().to_string(),
        phone: contact.phone.trim().to_string(),
    };

    if trimmed.first_name.is_empty()
        || trimmed.last_name.is_empty()
        || trimmed.email.is_empty()
        || trimmed.phone.is_empty()
    {
        return Err(ValidationError::MissingField);
    }
    if !is_valid_email(&trimmed.email) {
        return Err(ValidationError::InvalidEmail);
    }
    if !is_valid_phone(&trimmed.phone) {
        return Err(ValidationError::InvalidPhone);
    }
    Ok(trimmed)
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
