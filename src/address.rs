//! Account addresses.
//!
//! An [`Address`] is a fixed 20-byte account identifier, written as `0x`
//! followed by 40 hex digits. Parsing is case-insensitive and the canonical
//! form is lowercase, so two spellings of the same account always compare
//! and hash equal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AddressError;

/// A case-normalized 20-byte account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address. Not a real account; used as an invalid sentinel.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Construct an address from its raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    /// Whether this is the all-zero (invalid) address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Parse an address from hex, with or without a `0x` prefix.
    ///
    /// Accepts mixed case; the stored form is byte-exact, and display is
    /// always lowercase.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if hex.len() != 40 {
            return Err(AddressError::BadLength { len: hex.len() });
        }
        let mut bytes = [0u8; 20];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let hi = hex_digit(hex.as_bytes()[2 * i])?;
            let lo = hex_digit(hex.as_bytes()[2 * i + 1])?;
            *byte = (hi << 4) | lo;
        }
        Ok(Address(bytes))
    }

    /// The raw bytes of this address.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Shortened display form (`0xab12…cd34`) for log lines.
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}…{}", &full[..6], &full[full.len() - 4..])
    }
}

fn hex_digit(b: u8) -> Result<u8, AddressError> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        other => Err(AddressError::BadDigit {
            digit: other as char,
        }),
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}
