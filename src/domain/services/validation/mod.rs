//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Stateless validators for the subscribe path.
//
// | Component               | Description                                              |
// |-------------------------|----------------------------------------------------------|
// | is_valid_address        | Lexical account-address check (prefix, length, alphabet) |
// | is_valid_currency_code  | Native, three-character or 40-hex currency codes         |
// | validate_currency_spec  | One book leg: currency plus issuer rules                 |
//--------------------------------------------------------------------------------------------------

pub mod address;
pub mod currency;

pub use address::is_valid_address;
pub use currency::{is_valid_currency_code, validate_currency_spec, CurrencySpecError};
