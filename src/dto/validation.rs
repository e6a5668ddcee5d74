//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a task PIN is exactly four ASCII digits.
///
/// # Examples
///
/// ```ignore
/// validate_pin("4821") // Ok
/// validate_pin("482")  // Err - too short
/// validate_pin("48a1") // Err - not a digit
/// ```
pub fn validate_pin(pin: &str) -> Result<(), ValidationError> {
    if pin.len() != 4 {
        let mut err = ValidationError::new("pin_length");
        err.message = Some(format!("PIN must be exactly 4 digits (got {})", pin.len()).into());
        return Err(err);
    }

    if !pin.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("pin_format");
        err.message = Some("PIN must contain only digits".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_pin_valid() {
        assert!(validate_pin("1000").is_ok());
        assert!(validate_pin("9999").is_ok());
    }

    #[test]
    fn test_validate_pin_invalid_length() {
        assert!(validate_pin("123").is_err());
        assert!(validate_pin("12345").is_err());
        assert!(validate_pin("").is_err());
    }

    #[test]
    fn test_validate_pin_invalid_format() {
        assert!(validate_pin("12a4").is_err());
        assert!(validate_pin("12 4").is_err());
        assert!(validate_pin("-123").is_err());
    }
}
