//! Wallet addressing for the Rill protocol.
//!
//! An address is an opaque byte string identifying a wallet. Equality and
//! ordering are defined over the raw bytes; base58 ([bs58]) is used only
//! where the store format or a human-facing surface needs a displayable
//! form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

/// A wallet address: an opaque, variable-length byte string.
///
/// `Ord`/`Eq` compare the raw bytes directly, matching the byte-order
/// comparisons the wallet-state journal and block store rely on for
/// deduplication and lookup.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(Vec<u8>);

impl Address {
    /// Wrap raw bytes as an address. Empty addresses are rejected.
    pub fn new(bytes: Vec<u8>) -> Result<Self, AddressError> {
        if bytes.is_empty() {
            return Err(AddressError::Empty);
        }
        Ok(Self(bytes))
    }

    /// The raw address bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the address, returning the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Base58-encode this address.
    pub fn to_base58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    /// Parse an address from its base58 form.
    pub fn from_base58(s: &str) -> Result<Self, AddressError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| AddressError::InvalidBase58(e.to_string()))?;
        Self::new(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Address> for Vec<u8> {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl TryFrom<Vec<u8>> for Address {
    type Error = AddressError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::new(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base58(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_empty() {
        assert_eq!(Address::new(vec![]).unwrap_err(), AddressError::Empty);
    }

    #[test]
    fn base58_roundtrip() {
        let addr = Address::new(vec![1, 2, 3, 4, 5]).unwrap();
        let encoded = addr.to_base58();
        let decoded = Address::from_base58(&encoded).unwrap();
        assert_eq!(addr, decoded);
    }

    #[test]
    fn from_str_roundtrip() {
        let addr = Address::new(vec![0xAA; 20]).unwrap();
        let parsed: Address = addr.to_base58().parse().unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn display_matches_base58() {
        let addr = Address::new(vec![9, 9, 9]).unwrap();
        assert_eq!(format!("{addr}"), addr.to_base58());
    }

    #[test]
    fn ordering_is_byte_order() {
        let a = Address::new(vec![1, 0]).unwrap();
        let b = Address::new(vec![1, 1]).unwrap();
        assert!(a < b);
    }

    #[test]
    fn equal_bytes_are_equal() {
        let a = Address::new(vec![7; 10]).unwrap();
        let b = Address::new(vec![7; 10]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_length_same_prefix_differ() {
        let a = Address::new(vec![1, 2]).unwrap();
        let b = Address::new(vec![1, 2, 3]).unwrap();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn serde_json_roundtrip() {
        let addr = Address::new(vec![1, 2, 3]).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert!(json.starts_with('"'));
        let decoded: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, decoded);
    }

    #[test]
    fn from_base58_invalid_is_error() {
        assert!(Address::from_base58("0OIl").is_err());
    }

    #[test]
    fn into_bytes_roundtrip() {
        let original = vec![5u8, 6, 7];
        let addr = Address::new(original.clone()).unwrap();
        assert_eq!(addr.into_bytes(), original);
    }
}
