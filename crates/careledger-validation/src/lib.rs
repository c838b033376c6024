//! CareLedger Input Validation
//!
//! Local precondition checks applied before anything reaches the ledger:
//! - Required text fields (patient name, diagnosis, treatment)
//! - Patient identifiers (unsigned decimal integers)
//! - Ledger addresses (opaque, or `0x`-prefixed 20-byte hex)
//!
//! Errors accumulate in a [`ValidationResult`] so a form can report every
//! problem at once.

use serde::{Deserialize, Serialize};

/// Length of a hex-encoded 20-byte address, without the `0x` prefix
pub const HEX_ADDRESS_DIGITS: usize = 40;

/// Validation error with detailed context
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: ValidationErrorCode,
}

/// Specific validation error codes for programmatic handling
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValidationErrorCode {
    Required,
    InvalidFormat,
    OutOfRange,
    InvalidCharacters,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({:?})", self.field, self.message, self.code)
    }
}

/// Validation result that can accumulate multiple errors
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add_error(&mut self, field: &str, message: &str, code: ValidationErrorCode) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
            code,
        });
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when no errors were recorded, otherwise the result itself
    pub fn into_result(self) -> Result<(), ValidationResult> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }

    /// True if any recorded error concerns `field`
    pub fn has_error_for(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl std::fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "Validation failed: {}", messages.join("; "))
    }
}

impl std::error::Error for ValidationResult {}

/// Validate that a text field carries content.
///
/// Whitespace-only input counts as empty: the ledger would accept it, but it
/// produces a semantically empty entry.
pub fn validate_required(value: &str, field_name: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if value.trim().is_empty() {
        result.add_error(
            field_name,
            &format!("{} is required", field_name),
            ValidationErrorCode::Required,
        );
    }

    result
}

/// Validate a patient identifier as typed into a form.
///
/// Must be a non-empty unsigned decimal integer that fits in 64 bits.
pub fn validate_patient_id(raw: &str) -> ValidationResult {
    let mut result = ValidationResult::new();
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        result.add_error("patient_id", "Patient ID is required", ValidationErrorCode::Required);
        return result;
    }

    if !trimmed.chars().all(|c| c.is_ascii_digit()) {
        result.add_error(
            "patient_id",
            "Patient ID must be an unsigned decimal number",
            ValidationErrorCode::InvalidCharacters,
        );
        return result;
    }

    if trimmed.parse::<u64>().is_err() {
        result.add_error(
            "patient_id",
            "Patient ID is too large",
            ValidationErrorCode::OutOfRange,
        );
    }

    result
}

/// Parse a patient identifier, returning the accumulated errors on failure
pub fn parse_patient_id(raw: &str) -> Result<u64, ValidationResult> {
    validate_patient_id(raw).into_result()?;
    raw.trim().parse::<u64>().map_err(|_| {
        let mut result = ValidationResult::new();
        result.add_error("patient_id", "Patient ID is too large", ValidationErrorCode::OutOfRange);
        result
    })
}

/// Validate a ledger address.
///
/// Addresses are opaque to this layer, with two exceptions: they may not be
/// empty or contain whitespace, and a `0x`-prefixed address must carry
/// exactly 40 hex digits.
pub fn validate_address(address: &str, field_name: &str) -> ValidationResult {
    let mut result = ValidationResult::new();

    if address.is_empty() {
        result.add_error(
            field_name,
            &format!("{} is required", field_name),
            ValidationErrorCode::Required,
        );
        return result;
    }

    if address.chars().any(char::is_whitespace) {
        result.add_error(
            field_name,
            "Address cannot contain whitespace",
            ValidationErrorCode::InvalidCharacters,
        );
        return result;
    }

    if let Some(digits) = address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) {
        if digits.len() != HEX_ADDRESS_DIGITS {
            result.add_error(
                field_name,
                &format!("Hex address must have {} digits after 0x", HEX_ADDRESS_DIGITS),
                ValidationErrorCode::InvalidFormat,
            );
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            result.add_error(
                field_name,
                "Hex address can only contain 0-9 and a-f",
                ValidationErrorCode::InvalidCharacters,
            );
        }
    }

    result
}

/// Validate all four inputs of the add-record form together
pub fn validate_record_fields(
    patient_id: &str,
    patient_name: &str,
    diagnosis: &str,
    treatment: &str,
) -> ValidationResult {
    let mut result = validate_patient_id(patient_id);
    result.merge(validate_required(patient_name, "patient_name"));
    result.merge(validate_required(diagnosis, "diagnosis"));
    result.merge(validate_required(treatment, "treatment"));
    result
}
