//! Hardware (MAC) address newtype.
//!
//! Devices report their MAC in several spellings (`A4CF12F3B2C1`,
//! `a4:cf:12:f3:b2:c1`, `A4-CF-12-F3-B2-C1`). `HwAddr` normalises all of them
//! to six bytes so that collections keyed by hardware address and policy
//! device lists compare equal regardless of formatting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HwAddr([u8; 6]);

impl HwAddr {
    /// Create a hardware address from raw octets.
    #[inline]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Get the raw octets.
    #[inline]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Lowercase hex without separators, as used in device ids.
    pub fn compact(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for HwAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

/// Error type for hardware address parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HwAddrError {
    #[error("invalid hardware address: {0:?}")]
    InvalidFormat(String),
}

impl FromStr for HwAddr {
    type Err = HwAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect();

        if digits.len() != 12 {
            return Err(HwAddrError::InvalidFormat(s.to_string()));
        }

        let mut octets = [0u8; 6];
        hex::decode_to_slice(&digits, &mut octets)
            .map_err(|_| HwAddrError::InvalidFormat(s.to_string()))?;
        Ok(Self(octets))
    }
}

impl TryFrom<String> for HwAddr {
    type Error = HwAddrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HwAddr> for String {
    fn from(addr: HwAddr) -> Self {
        addr.to_string()
    }
}
