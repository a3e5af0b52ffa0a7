//! Identifier handling
//!
//! Normalization and check-digit validation for the 14-digit subject key, plus
//! the punctuated "masked" form the registry expects in its forms.

mod checksum;

pub use checksum::check_digits;

use crate::IdentifierError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of digits in a normalized subject key
pub const SUBJECT_KEY_LEN: usize = 14;

/// A subject key that passed normalization and check-digit validation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectKey(String);

impl SubjectKey {
    /// Parses raw input in any formatting into a validated subject key
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        normalize(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the masked display form (`XX.XXX.XXX/XXXX-XX`)
    pub fn masked(&self) -> String {
        mask(&self.0)
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SubjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubjectKey {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SubjectKey> for String {
    fn from(key: SubjectKey) -> Self {
        key.0
    }
}

/// Normalizes an identifier and validates its check digits
///
/// # Normalization Steps
///
/// 1. Drop every non-digit character
/// 2. Require exactly 14 digits
/// 3. Reject a single digit repeated 14 times (those pass the checksum)
/// 4. Recompute both check digits and compare with the last two digits
///
/// # Examples
///
/// ```
/// use sintegra_queue::identifier::normalize;
///
/// assert_eq!(normalize("00.006.486/0001-75").unwrap(), "00006486000175");
/// assert!(normalize("123").is_err());
/// ```
pub fn normalize(raw: &str) -> Result<String, IdentifierError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() != SUBJECT_KEY_LEN {
        return Err(IdentifierError::WrongLength(digits.len()));
    }

    let first = digits.as_bytes()[0];
    if digits.bytes().all(|b| b == first) {
        return Err(IdentifierError::RepeatedDigits);
    }

    let expected = check_digits(&digits[..12]);
    if digits[12..] != expected {
        return Err(IdentifierError::ChecksumMismatch { expected });
    }

    Ok(digits)
}

/// Renders the masked form `XX.XXX.XXX/XXXX-XX`
///
/// Non-digit characters in the input are ignored. Input that does not carry
/// 14 digits is returned as its bare digits.
pub fn mask(identifier: &str) -> String {
    let d: String = identifier.chars().filter(|c| c.is_ascii_digit()).collect();
    if d.len() != SUBJECT_KEY_LEN {
        return d;
    }
    format!(
        "{}.{}.{}/{}-{}",
        &d[0..2],
        &d[2..5],
        &d[5..8],
        &d[8..12],
        &d[12..14]
    )
}
