//! # Validation Module
//!
//! Form field rules shared by every screen.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: View event handler                                           │
//! │  └── THIS MODULE: turns raw field text into a clean value or a         │
//! │      message the view shows in a toast                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: BankService                                                  │
//! │  └── Business rules (balance, request status)                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Gateway                                                      │
//! │  └── Atomic batches, NOT NULL / foreign keys                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every validator returns the normalized value (trimmed text, parsed
//! money) so callers never re-trim.
//!
//! ## Usage
//! ```rust
//! use kidbank_core::validation::{validate_kid_name, validate_pin};
//!
//! assert_eq!(validate_kid_name("  Sam ").unwrap(), "Sam");
//! assert!(validate_pin("1234").is_err()); // too common
//! ```

use crate::error::ValidationError;
use crate::money::Money;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Smallest amount a parent can move: one cent.
pub const MIN_AMOUNT: Money = Money::from_cents(1);

/// Largest single deposit, withdrawal or request.
pub const MAX_AMOUNT: Money = Money::from_dollars(10_000);

pub const PIN_LENGTH: usize = 4;

/// PINs a kid would guess first.
const COMMON_PINS: [&str; 12] = [
    "1234", "0000", "1111", "2222", "3333", "4444", "5555", "6666", "7777", "8888", "9999",
    "4321",
];

fn required(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(value.to_string())
}

fn length_between(field: &str, value: String, min: usize, max: usize) -> ValidationResult<String> {
    let len = value.chars().count();
    if len < min {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min,
        });
    }
    if len > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(value)
}

// =============================================================================
// Account Fields
// =============================================================================

/// Validates an email address.
///
/// ## Rules
/// - Must not be empty
/// - `local@domain.tld` shape, no whitespace
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = required("Email", email)?;

    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
                && domain
                    .rsplit_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    .unwrap_or(false)
        }
        None => false,
    };

    if !well_formed {
        return Err(ValidationError::InvalidFormat {
            field: "Email".to_string(),
            reason: "must be a valid email address".to_string(),
        });
    }
    Ok(email)
}

/// Validates a password. Not trimmed: spaces are legal password characters.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "Password".to_string(),
        });
    }
    if password.chars().count() < 6 {
        return Err(ValidationError::TooShort {
            field: "Password".to_string(),
            min: 6,
        });
    }
    Ok(())
}

pub fn validate_password_confirm(password: &str, confirm: &str) -> ValidationResult<()> {
    if confirm.is_empty() {
        return Err(ValidationError::Required {
            field: "Password confirmation".to_string(),
        });
    }
    if password != confirm {
        return Err(ValidationError::Mismatch {
            field: "Password confirmation".to_string(),
        });
    }
    Ok(())
}

/// Validates a parent's display name (2-50 characters).
pub fn validate_display_name(name: &str) -> ValidationResult<String> {
    let name = required("Display name", name)?;
    length_between("Display name", name, 2, 50)
}

// =============================================================================
// Kid Fields
// =============================================================================

/// Validates a kid's name.
///
/// ## Rules
/// - 2-30 characters after trimming
/// - Letters, spaces, hyphens and apostrophes only
///
/// ## Example
/// ```rust
/// use kidbank_core::validation::validate_kid_name;
///
/// assert!(validate_kid_name("Mary-Kate O'Neil").is_ok());
/// assert!(validate_kid_name("R2D2").is_err());
/// ```
pub fn validate_kid_name(name: &str) -> ValidationResult<String> {
    let name = required("Name", name)?;
    let name = length_between("Name", name, 2, 30)?;

    if !name
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c == ' ' || c == '-' || c == '\'')
    {
        return Err(ValidationError::InvalidFormat {
            field: "Name".to_string(),
            reason: "can only contain letters, spaces, hyphens, and apostrophes".to_string(),
        });
    }
    Ok(name)
}

/// Validates a kid's login PIN.
///
/// ## Rules
/// - Exactly 4 digits
/// - Not one of the obvious patterns (`1234`, `0000`, repeated digits, `4321`)
pub fn validate_pin(pin: &str) -> ValidationResult<String> {
    if pin.is_empty() {
        return Err(ValidationError::Required {
            field: "PIN".to_string(),
        });
    }
    if pin.chars().count() != PIN_LENGTH {
        return Err(ValidationError::InvalidFormat {
            field: "PIN".to_string(),
            reason: format!("must be exactly {PIN_LENGTH} digits"),
        });
    }
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "PIN".to_string(),
            reason: "must contain only numbers".to_string(),
        });
    }
    if COMMON_PINS.contains(&pin) {
        return Err(ValidationError::NotAllowed {
            field: "PIN".to_string(),
            reason: "is too common, please choose another".to_string(),
        });
    }
    Ok(pin.to_string())
}

// =============================================================================
// Money Fields
// =============================================================================

/// Validates an amount typed by the user against `[min, max]`.
///
/// ## Example
/// ```rust
/// use kidbank_core::validation::{validate_amount, MAX_AMOUNT, MIN_AMOUNT};
///
/// let amount = validate_amount("12.5", MIN_AMOUNT, MAX_AMOUNT).unwrap();
/// assert_eq!(amount.cents(), 1250);
/// assert!(validate_amount("0", MIN_AMOUNT, MAX_AMOUNT).is_err());
/// ```
pub fn validate_amount(input: &str, min: Money, max: Money) -> ValidationResult<Money> {
    let amount: Money = input.parse()?;
    if amount < min || amount > max {
        return Err(ValidationError::OutOfRange {
            field: "Amount".to_string(),
            min,
            max,
        });
    }
    Ok(amount)
}

/// Validates an optional description. Empty input yields `None`.
pub fn validate_description(description: &str) -> ValidationResult<Option<String>> {
    let description = description.trim();
    if description.is_empty() {
        return Ok(None);
    }
    length_between("Description", description.to_string(), 1, 200).map(Some)
}

// =============================================================================
// Theme Fields
// =============================================================================

/// Validates a `#rgb` or `#rrggbb` colour and returns it lowercased.
pub fn validate_color(color: &str) -> ValidationResult<String> {
    let color = required("Color", color)?;
    let hex = color.strip_prefix('#').unwrap_or("");
    if !(hex.len() == 3 || hex.len() == 6) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidFormat {
            field: "Color".to_string(),
            reason: "must be a hex color like #ff5733".to_string(),
        });
    }
    Ok(color.to_lowercase())
}

/// Validates a custom theme's name (2-30 characters).
pub fn validate_theme_name(name: &str) -> ValidationResult<String> {
    let name = required("Theme name", name)?;
    length_between("Theme name", name, 2, 30)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert_eq!(validate_email(" jo@home.net ").unwrap(), "jo@home.net");
        assert!(validate_email("").is_err());
        assert!(validate_email("jo@home").is_err());
        assert!(validate_email("jo home@x.io").is_err());
        assert!(validate_email("@x.io").is_err());
        assert!(validate_email("a@b@c.io").is_err());
        assert!(validate_email("a@.io").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("five5").is_err());
        assert!(validate_password("").is_err());
        assert!(validate_password_confirm("secret", "secret").is_ok());
        assert_eq!(
            validate_password_confirm("secret", "secrets").unwrap_err().to_string(),
            "Password confirmation does not match"
        );
    }

    #[test]
    fn test_kid_name() {
        assert_eq!(validate_kid_name("  Sam ").unwrap(), "Sam");
        assert!(validate_kid_name("Mary-Kate O'Neil").is_ok());
        assert!(validate_kid_name("S").is_err());
        assert!(validate_kid_name(&"a".repeat(31)).is_err());
        assert!(validate_kid_name("R2D2").is_err());
    }

    #[test]
    fn test_pin() {
        assert_eq!(validate_pin("4826").unwrap(), "4826");
        assert!(validate_pin("").is_err());
        assert!(validate_pin("123").is_err());
        assert!(validate_pin("12a4").is_err());
        for common in COMMON_PINS {
            assert!(matches!(
                validate_pin(common),
                Err(ValidationError::NotAllowed { .. })
            ));
        }
    }

    #[test]
    fn test_amount_bounds() {
        assert_eq!(validate_amount("0.01", MIN_AMOUNT, MAX_AMOUNT).unwrap().cents(), 1);
        assert_eq!(
            validate_amount("10000", MIN_AMOUNT, MAX_AMOUNT).unwrap(),
            MAX_AMOUNT
        );
        assert!(validate_amount("10000.01", MIN_AMOUNT, MAX_AMOUNT).is_err());
        assert!(validate_amount("0", MIN_AMOUNT, MAX_AMOUNT).is_err());
        assert!(validate_amount("-5", MIN_AMOUNT, MAX_AMOUNT).is_err());
        assert!(validate_amount("1.999", MIN_AMOUNT, MAX_AMOUNT).is_err());

        let err = validate_amount("0", MIN_AMOUNT, MAX_AMOUNT).unwrap_err();
        assert_eq!(err.to_string(), "Amount must be between $0.01 and $10,000.00");
    }

    #[test]
    fn test_description() {
        assert_eq!(validate_description("   ").unwrap(), None);
        assert_eq!(
            validate_description(" Birthday ").unwrap(),
            Some("Birthday".to_string())
        );
        assert!(validate_description(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_theme_fields() {
        assert_eq!(validate_color("#FF5733").unwrap(), "#ff5733");
        assert!(validate_color("#abc").is_ok());
        assert!(validate_color("ff5733").is_err());
        assert!(validate_color("#ggg").is_err());
        assert!(validate_theme_name("Dino").is_ok());
        assert!(validate_theme_name("D").is_err());
        assert!(validate_display_name("Jo").is_ok());
        assert!(validate_display_name(&"J".repeat(51)).is_err());
    }
}
