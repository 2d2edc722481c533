use rust_decimal::{Decimal, RoundingStrategy};

/// Format a decimal with thousands separators and a fixed number of decimal
/// places. Midpoints round away from zero.
///
/// # Examples
///
/// ```
/// use ledger_core::formatting::format_decimal;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_decimal(Decimal::new(12345, 1), 1), "1,234.5");
/// assert_eq!(format_decimal(Decimal::new(1234567, 0), 0), "1,234,567");
/// assert_eq!(format_decimal(Decimal::ZERO, 2), "0.00");
/// ```
pub fn format_decimal(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let plain = format!("{:.prec$}", rounded.abs(), prec = decimals as usize);

    let (int_part, frac_part) = match plain.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (plain.as_str(), None),
    };

    let mut result = group_thousands(int_part);
    if let Some(frac) = frac_part {
        result.push('.');
        result.push_str(frac);
    }

    if negative {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format a monetary amount with two decimal places and thousands separators.
///
/// # Examples
///
/// ```
/// use ledger_core::formatting::format_currency;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_currency(Decimal::new(123456, 2)), "$1,234.56");
/// assert_eq!(format_currency(Decimal::ZERO), "$0.00");
/// ```
pub fn format_currency(amount: Decimal) -> String {
    if amount.is_sign_negative() && !amount.is_zero() {
        format!("$-{}", format_decimal(amount.abs(), 2))
    } else {
        format!("${}", format_decimal(amount, 2))
    }
}

/// Format a count with thousands separators.
pub fn format_count(count: u64) -> String {
    group_thousands(&count.to_string())
}

/// `(part / whole) * 100`, rounded to `decimal_places`. Zero when `whole` is
/// zero.
pub fn percentage(part: u64, whole: u64, decimal_places: u32) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    let raw = Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(whole);
    raw.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // ── format_decimal ───────────────────────────────────────────────────────

    #[test]
    fn test_format_decimal_zero() {
        assert_eq!(format_decimal(dec!(0), 0), "0");
        assert_eq!(format_decimal(dec!(0), 2), "0.00");
    }

    #[test]
    fn test_format_decimal_pads_scale() {
        assert_eq!(format_decimal(dec!(1234.5), 2), "1,234.50");
    }

    #[test]
    fn test_format_decimal_rounds_midpoint_away_from_zero() {
        assert_eq!(format_decimal(dec!(1.005), 2), "1.01");
        assert_eq!(format_decimal(dec!(-1.005), 2), "-1.01");
    }

    #[test]
    fn test_format_decimal_negative_with_thousands() {
        assert_eq!(format_decimal(dec!(-9876.5), 1), "-9,876.5");
    }

    #[test]
    fn test_format_decimal_negative_rounding_to_zero() {
        assert_eq!(format_decimal(dec!(-0.001), 2), "0.00");
    }

    // ── format_currency ──────────────────────────────────────────────────────

    #[test]
    fn test_format_currency_large() {
        assert_eq!(format_currency(dec!(1000000)), "$1,000,000.00");
    }

    #[test]
    fn test_format_currency_negative() {
        assert_eq!(format_currency(dec!(-9.99)), "$-9.99");
    }

    // ── format_count ─────────────────────────────────────────────────────────

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(5), "5");
        assert_eq!(format_count(1234), "1,234");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    // ── percentage ───────────────────────────────────────────────────────────

    #[test]
    fn test_percentage_basic() {
        assert_eq!(percentage(50, 200, 1), dec!(25.0));
    }

    #[test]
    fn test_percentage_zero_whole() {
        assert_eq!(percentage(10, 0, 2), Decimal::ZERO);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3, 2), dec!(33.33));
    }
}
