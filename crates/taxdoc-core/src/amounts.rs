//! Monetary amount parsing for display totals.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

lazy_static! {
    static ref AMOUNT: Regex = Regex::new(
        r"^\(?\s*(-)?\s*[£$€]?\s*(-)?\s*(\d{1,3}(?:,\d{3})+|\d+)(\.\d+)?\s*\)?$"
    )
    .unwrap();
}

/// Parse an amount as printed on a tax form.
///
/// Accepts an optional `£`, `$` or `€`, comma thousands separators, a
/// leading minus or accounting parentheses for negatives. Anything else,
/// such as tax codes or identifiers, is not an amount.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.starts_with('(') != s.ends_with(')') {
        return None;
    }
    let caps = AMOUNT.captures(s)?;

    let integer = caps[3].replace(',', "");
    let fraction = caps.get(4).map(|m| m.as_str()).unwrap_or("");
    let value = Decimal::from_str(&format!("{}{}", integer, fraction)).ok()?;

    let negative = s.starts_with('(') || caps.get(1).is_some() || caps.get(2).is_some();
    Some(if negative { -value } else { value })
}
