//! Form checks that run before any request reaches the provider.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use tyxar_core::{Email, EmailError};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Rejected form input. The display text is shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter your email address.")]
    EmptyEmail,
    #[error("Please enter a valid email address.")]
    InvalidEmail(#[source] EmailError),
    #[error("Please enter your password.")]
    EmptyPassword,
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Password must be at least 8 characters long.")]
    PasswordTooShort,
    #[error("Please enter a valid 6-digit code.")]
    InvalidCode,
    #[error("Project name is required.")]
    ProjectNameRequired,
}

/// Parse a submitted email.
///
/// # Errors
///
/// `EmptyEmail` for blank input, `InvalidEmail` otherwise.
pub fn email(raw: &str) -> Result<Email, ValidationError> {
    match Email::parse(raw) {
        Ok(email) => Ok(email),
        Err(EmailError::Empty) => Err(ValidationError::EmptyEmail),
        Err(e) => Err(ValidationError::InvalidEmail(e)),
    }
}

/// Require a non-empty password.
///
/// # Errors
///
/// `EmptyPassword` for empty input.
pub fn password(raw: String) -> Result<SecretString, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::EmptyPassword);
    }
    Ok(SecretString::from(raw))
}

/// Check a new password and its confirmation.
///
/// # Errors
///
/// `PasswordMismatch` first, then `PasswordTooShort`.
pub fn new_password(password: &SecretString, confirm: &SecretString) -> Result<(), ValidationError> {
    if password.expose_secret() != confirm.expose_secret() {
        return Err(ValidationError::PasswordMismatch);
    }
    if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Check a one-time code: exactly six ASCII digits.
///
/// # Errors
///
/// `InvalidCode` otherwise.
pub fn one_time_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidCode)
    }
}
