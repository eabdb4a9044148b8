use thiserror::Error;

use crate::domain::models::types::{CurrencySpec, NATIVE_CURRENCY};

use super::address::is_valid_address;

/// Symbols allowed in a three-character currency code besides ASCII alphanumerics.
const CURRENCY_SYMBOLS: &str = "?!@#$%^&*<>(){}[]|";

/// Length of a hex-encoded (non-standard) currency code.
const HEX_CURRENCY_LEN: usize = 40;

/// Reasons a currency spec can be rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencySpecError {
    /// The `currency` field is absent.
    #[error("currency is required")]
    MissingCurrency,

    /// The currency code is neither a standard nor a hex code.
    #[error("invalid currency code: {0}")]
    InvalidCurrency(String),

    /// A non-native currency was given without an issuer.
    #[error("issuer is required for a non-native currency")]
    IssuerRequired,

    /// The issuer is not a valid account address.
    #[error("invalid issuer: {0}")]
    InvalidIssuer(String),

    /// The native currency was given an issuer.
    #[error("the native currency cannot have an issuer")]
    UnexpectedIssuer,
}

/// Returns true for the native currency, a three-character standard code or
/// a 40-character hex code that is not all zeros.
pub fn is_valid_currency_code(code: &str) -> bool {
    if code == NATIVE_CURRENCY {
        return true;
    }
    match code.len() {
        3 => code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || CURRENCY_SYMBOLS.contains(c)),
        HEX_CURRENCY_LEN => {
            code.chars().all(|c| c.is_ascii_hexdigit()) && code.chars().any(|c| c != '0')
        }
        _ => false,
    }
}

/// Validates one leg of a book spec.
///
/// An empty issuer string is treated the same as an absent one, so
/// `{"currency": "XRP", "issuer": ""}` is accepted as the native asset.
///
/// # Arguments
/// * `currency` - The `currency` field, if present
/// * `issuer` - The `issuer` field, if present
///
/// # Returns
/// The normalized `CurrencySpec`, or the first rule it violates.
pub fn validate_currency_spec(
    currency: Option<&str>,
    issuer: Option<&str>,
) -> Result<CurrencySpec, CurrencySpecError> {
    let currency = currency.ok_or(CurrencySpecError::MissingCurrency)?;
    if !is_valid_currency_code(currency) {
        return Err(CurrencySpecError::InvalidCurrency(currency.to_string()));
    }

    let issuer = issuer.filter(|i| !i.is_empty());

    if currency == NATIVE_CURRENCY {
        return match issuer {
            Some(_) => Err(CurrencySpecError::UnexpectedIssuer),
            None => Ok(CurrencySpec::native()),
        };
    }

    match issuer {
        None => Err(CurrencySpecError::IssuerRequired),
        Some(issuer) if !is_valid_address(issuer) => {
            Err(CurrencySpecError::InvalidIssuer(issuer.to_string()))
        }
        Some(issuer) => Ok(CurrencySpec::issued(currency, issuer)),
    }
}
