//! Modulo-11 check digits of the 14-digit identifier
//!
//! Each check digit is a weighted sum modulo 11; a remainder below 2 gives 0,
//! anything else gives `11 - remainder`.

/// Weights for the first check digit (over the first 12 digits)
const FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Weights for the second check digit (over 12 digits plus the first check digit)
const SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Computes the two check digits for a 12-digit base
///
/// `base` must contain only ASCII digits; anything else contributes zero.
///
/// # Examples
///
/// ```
/// use sintegra_queue::identifier::check_digits;
///
/// assert_eq!(check_digits("000064860001"), "75");
/// ```
pub fn check_digits(base: &str) -> String {
    let digits: Vec<u32> = base.chars().map(|c| c.to_digit(10).unwrap_or(0)).collect();

    let first = weighted_digit(&digits, &FIRST_WEIGHTS);

    let mut extended = digits;
    extended.push(first);
    let second = weighted_digit(&extended, &SECOND_WEIGHTS);

    format!("{}{}", first, second)
}

/// Weighted modulo-11 sum; a remainder below 2 maps to 0
fn weighted_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}
