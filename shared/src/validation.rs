//! Input validation utilities

/// Maximum length of a purchase, inventory or write-off number
pub const MAX_BUSINESS_NUMBER_LEN: usize = 50;

/// Maximum length of a rejection reason
pub const MAX_REASON_LEN: usize = 500;

/// Validate a business identifier (purchase/inventory/write-off number)
pub fn validate_business_number(number: &str) -> Result<(), &'static str> {
    if number.trim().is_empty() {
        return Err("Number must not be empty");
    }
    if number.trim() != number {
        return Err("Number must not start or end with whitespace");
    }
    if number.chars().count() > MAX_BUSINESS_NUMBER_LEN {
        return Err("Number must be at most 50 characters");
    }
    if number.chars().any(char::is_control) {
        return Err("Number must not contain control characters");
    }
    Ok(())
}

/// Validate a rejection reason
pub fn validate_reason(reason: &str) -> Result<(), &'static str> {
    if reason.trim().is_empty() {
        return Err("Reason must not be empty");
    }
    if reason.chars().count() > MAX_REASON_LEN {
        return Err("Reason must be at most 500 characters");
    }
    Ok(())
}
