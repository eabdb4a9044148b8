use crate::domain::models::types::{BookSpec, BookTrade};

/// Returns true if an executed trade belongs to a subscribed book.
///
/// Both legs must match exactly on currency and issuer; the native asset only
/// matches the native asset. When the book has `both` set, the reversed
/// assignment (gets and pays swapped) matches as well.
pub fn book_matches(trade: &BookTrade, spec: &BookSpec) -> bool {
    let direct = trade.taker_gets == spec.taker_gets && trade.taker_pays == spec.taker_pays;
    if direct {
        return true;
    }
    spec.both && trade.taker_gets == spec.taker_pays && trade.taker_pays == spec.taker_gets
}

/// The trade pairs a book answers to: its own pair, plus the reversed pair
/// when `both` is set. A trade matches the book exactly when it equals one
/// of these keys, so the registry indexes books under them.
pub fn book_keys(spec: &BookSpec) -> Vec<BookTrade> {
    let direct = BookTrade::new(spec.taker_gets.clone(), spec.taker_pays.clone());
    if spec.both {
        let reversed = direct.reversed();
        vec![direct, reversed]
    } else {
        vec![direct]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::types::CurrencySpec;

    const ISSUER_X: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
    const ISSUER_Y: &str = "rrrrrrrrrrrrrrrrrrrrBZbvji";

    fn usd(issuer: &str) -> CurrencySpec {
        CurrencySpec::issued("USD", issuer)
    }

    #[test]
    fn test_exact_pair_matches() {
        let trade = BookTrade::new(CurrencySpec::native(), usd(ISSUER_X));
        let spec = BookSpec::new(CurrencySpec::native(), usd(ISSUER_X));
        assert!(book_matches(&trade, &spec));
    }

    #[test]
    fn test_different_issuer_does_not_match() {
        let trade = BookTrade::new(CurrencySpec::native(), usd(ISSUER_X));
        let spec = BookSpec::new(CurrencySpec::native(), usd(ISSUER_Y));
        assert!(!book_matches(&trade, &spec));
    }

    #[test]
    fn test_different_currency_does_not_match() {
        let trade = BookTrade::new(CurrencySpec::native(), usd(ISSUER_X));
        let spec = BookSpec::new(CurrencySpec::native(), CurrencySpec::issued("EUR", ISSUER_X));
        assert!(!book_matches(&trade, &spec));
    }

    #[test]
    fn test_native_only_matches_native() {
        // An issued currency literally named like the native one must not match it.
        let fake_native = CurrencySpec::issued("XRP", ISSUER_X);
        let trade = BookTrade::new(fake_native, usd(ISSUER_X));
        let spec = BookSpec::new(CurrencySpec::native(), usd(ISSUER_X));
        assert!(!book_matches(&trade, &spec));
    }

    #[test]
    fn test_reversed_trade_requires_both() {
        let trade = BookTrade::new(usd(ISSUER_X), CurrencySpec::native());
        let one_sided = BookSpec::new(CurrencySpec::native(), usd(ISSUER_X));
        let two_sided = one_sided.clone().with_both(true);

        assert!(!book_matches(&trade, &one_sided));
        assert!(book_matches(&trade, &two_sided));
        assert!(book_matches(&trade.reversed(), &two_sided));
    }

    #[test]
    fn test_book_keys_agree_with_matching() {
        let one_sided = BookSpec::new(CurrencySpec::native(), usd(ISSUER_X));
        let two_sided = one_sided.clone().with_both(true);

        let keys = book_keys(&one_sided);
        assert_eq!(keys, vec![BookTrade::new(CurrencySpec::native(), usd(ISSUER_X))]);

        let keys = book_keys(&two_sided);
        assert_eq!(keys.len(), 2);
        for key in &keys {
            assert!(book_matches(key, &two_sided));
        }
        assert!(!book_matches(&keys[1], &one_sided));
    }
}
