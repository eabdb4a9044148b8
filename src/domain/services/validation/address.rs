//! Lexical validation of account addresses.
//!
//! Addresses are base-58 strings over the network alphabet, which leaves out
//! `0`, `O`, `I` and `l`. The check is purely lexical: the embedded checksum
//! is not verified, so a well-formed string with a corrupted checksum is
//! accepted here and resolves to "account not found" further down the line.

/// Base-58 alphabet used by the network.
pub const ADDRESS_ALPHABET: &str = "rpshnaf39wBUDNEGHJKLM4PQRST7VWXYZ2bcdeCg65jkm8oFqi1tuvAxyz";

/// First character of every classic account address.
pub const ACCOUNT_PREFIX: char = 'r';

/// Shortest valid encoded address.
pub const MIN_ADDRESS_LEN: usize = 25;

/// Longest valid encoded address.
pub const MAX_ADDRESS_LEN: usize = 35;

/// Returns true if `s` is a syntactically valid account address.
///
/// # Arguments
/// * `s` - Candidate address as sent by the client
///
/// # Returns
/// `true` when the prefix, length and alphabet all match.
pub fn is_valid_address(s: &str) -> bool {
    let len = s.len();
    if !(MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&len) {
        return false;
    }
    if !s.starts_with(ACCOUNT_PREFIX) {
        return false;
    }
    s.chars().all(|c| ADDRESS_ALPHABET.contains(c))
}
