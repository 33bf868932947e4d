use serde::{Deserialize, Serialize};

use crate::constants::{ADDRESS_SIZE, HANDLE_SIZE, HANDLE_VERSION};
use crate::error::EncodingError;

fn decode_hex(s: &str) -> Result<Vec<u8>, EncodingError> {
    let trimmed = s.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(body).map_err(|e| EncodingError::InvalidHex(e.to_string()))
}

fn to_fixed<const N: usize>(bytes: &[u8], what: &'static str) -> Result<[u8; N], EncodingError> {
    bytes.try_into().map_err(|_| EncodingError::InvalidLength {
        what,
        expected: N,
        actual: bytes.len(),
    })
}

// Network identity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    pub fn is_local(&self) -> bool {
        self.0 == crate::constants::LOCAL_CHAIN_ID
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A 20-byte account or contract address.
///
/// Parsing accepts any hex casing with or without the `0x` prefix; the
/// canonical rendering is lowercase with the prefix.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(into = "String", try_from = "String")]
pub struct Address(pub [u8; ADDRESS_SIZE]);

impl Address {
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
        let bytes = decode_hex(s)?;
        Ok(Self(to_fixed(&bytes, "address")?))
    }

    pub fn short(&self) -> String {
        self.to_hex()[..10].to_string()
    }
}

impl std::str::FromStr for Address {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.to_hex()
    }
}

impl TryFrom<String> for Address {
    type Error = EncodingError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

/// Semantic type of an encrypted value. Codes match the on-chain type tags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EncryptedType {
    Bool = 0,
    Uint32 = 4,
    Uint128 = 6,
    Address = 7,
}

impl EncryptedType {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> Result<Self, EncodingError> {
        match code {
            0 => Ok(Self::Bool),
            4 => Ok(Self::Uint32),
            6 => Ok(Self::Uint128),
            7 => Ok(Self::Address),
            other => Err(EncodingError::UnknownType(other)),
        }
    }

    pub fn bit_width(&self) -> u32 {
        match self {
            Self::Bool => 1,
            Self::Uint32 => 32,
            Self::Uint128 => 128,
            Self::Address => 160,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "ebool",
            Self::Uint32 => "euint32",
            Self::Uint128 => "euint128",
            Self::Address => "eaddress",
        }
    }
}

impl std::fmt::Display for EncryptedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A plaintext value already coerced to the width of its encrypted slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClearValue {
    Bool(bool),
    Uint32(u32),
    Uint128(u128),
    Address(Address),
}

impl ClearValue {
    pub fn encrypted_type(&self) -> EncryptedType {
        match self {
            Self::Bool(_) => EncryptedType::Bool,
            Self::Uint32(_) => EncryptedType::Uint32,
            Self::Uint128(_) => EncryptedType::Uint128,
            Self::Address(_) => EncryptedType::Address,
        }
    }

    // Big-endian, fixed width per type
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Bool(b) => vec![u8::from(*b)],
            Self::Uint32(v) => v.to_be_bytes().to_vec(),
            Self::Uint128(v) => v.to_be_bytes().to_vec(),
            Self::Address(a) => a.0.to_vec(),
        }
    }

    pub fn from_bytes(ty: EncryptedType, bytes: &[u8]) -> Result<Self, EncodingError> {
        match ty {
            EncryptedType::Bool => match bytes {
                [0] => Ok(Self::Bool(false)),
                [1] => Ok(Self::Bool(true)),
                _ => Err(EncodingError::InvalidLength {
                    what: "ebool",
                    expected: 1,
                    actual: bytes.len(),
                }),
            },
            EncryptedType::Uint32 => Ok(Self::Uint32(u32::from_be_bytes(to_fixed(bytes, "euint32")?))),
            EncryptedType::Uint128 => Ok(Self::Uint128(u128::from_be_bytes(to_fixed(bytes, "euint128")?))),
            EncryptedType::Address => Ok(Self::Address(Address(to_fixed(bytes, "eaddress")?))),
        }
    }

    /// The value widened to an unsigned integer, when it has one.
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Self::Bool(b) => Some(u128::from(*b)),
            Self::Uint32(v) => Some(u128::from(*v)),
            Self::Uint128(v) => Some(*v),
            Self::Address(_) => None,
        }
    }
}

/// Opaque 32-byte reference to an encrypted value.
///
/// Layout: bytes `0..21` hash, byte `21` input index, bytes `22..30` chain id
/// (big endian), byte `30` encrypted type code, byte `31` layout version.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(into = "String", try_from = "String")]
pub struct Handle(pub [u8; HANDLE_SIZE]);

impl Handle {
    pub fn compose(hash: &[u8; 32], index: u8, chain_id: ChainId, ty: EncryptedType) -> Self {
        let mut bytes = [0u8; HANDLE_SIZE];
        bytes[..21].copy_from_slice(&hash[..21]);
        bytes[21] = index;
        bytes[22..30].copy_from_slice(&chain_id.0.to_be_bytes());
        bytes[30] = ty.code();
        bytes[31] = HANDLE_VERSION;
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
        let bytes = decode_hex(s)?;
        Ok(Self(to_fixed(&bytes, "handle")?))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, EncodingError> {
        Ok(Self(to_fixed(bytes, "handle")?))
    }

    pub fn index(&self) -> u8 {
        self.0[21]
    }

    pub fn chain_id(&self) -> ChainId {
        let mut id = [0u8; 8];
        id.copy_from_slice(&self.0[22..30]);
        ChainId(u64::from_be_bytes(id))
    }

    pub fn encrypted_type(&self) -> Result<EncryptedType, EncodingError> {
        EncryptedType::from_code(self.0[30])
    }

    pub fn short(&self) -> String {
        let hex = self.to_hex();
        format!("{}…{}", &hex[..8], &hex[hex.len() - 4..])
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({})", self.to_hex())
    }
}

impl From<Handle> for String {
    fn from(h: Handle) -> Self {
        h.to_hex()
    }
}

impl TryFrom<String> for Handle {
    type Error = EncodingError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

/// Public key material of an encryption engine, rendered as `0x` hex.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(into = "String", try_from = "String")]
pub struct EnginePublicKey(pub Vec<u8>);

impl EnginePublicKey {
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
        let bytes = decode_hex(s)?;
        if bytes.is_empty() {
            return Err(EncodingError::InvalidLength {
                what: "public key",
                expected: 1,
                actual: 0,
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for EnginePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for EnginePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EnginePublicKey({})", self.to_hex())
    }
}

impl From<EnginePublicKey> for String {
    fn from(k: EnginePublicKey) -> Self {
        k.to_hex()
    }
}

impl TryFrom<String> for EnginePublicKey {
    type Error = EncodingError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_is_case_insensitive() {
        let mixed = Address::from_hex("0x5FbDB2315678afecb367f032d93F642f64180aa3").unwrap();
        let lower = Address::from_hex("5fbdb2315678afecb367f032d93f642f64180aa3").unwrap();
        assert_eq!(mixed, lower);
        assert_eq!(mixed.to_hex(), "0x5fbdb2315678afecb367f032d93f642f64180aa3");
    }

    #[test]
    fn test_address_wrong_length() {
        let err = Address::from_hex("0xabcd").unwrap_err();
        assert!(matches!(err, EncodingError::InvalidLength { expected: 20, actual: 2, .. }));
    }

    #[test]
    fn test_address_serde_as_string() {
        let addr = Address([0x11; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "11".repeat(20)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_handle_layout() {
        let handle = Handle::compose(&[0xAA; 32], 3, ChainId(31337), EncryptedType::Uint128);
        assert_eq!(handle.index(), 3);
        assert_eq!(handle.chain_id(), ChainId(31337));
        assert_eq!(handle.encrypted_type().unwrap(), EncryptedType::Uint128);
        assert_eq!(handle.0[31], HANDLE_VERSION);
        assert_eq!(handle.to_hex().len(), 66);
    }

    #[test]
    fn test_clear_value_bytes() {
        let value = ClearValue::Uint128(0x0102);
        let bytes = value.to_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(ClearValue::from_bytes(EncryptedType::Uint128, &bytes).unwrap(), value);
        assert!(ClearValue::from_bytes(EncryptedType::Uint32, &bytes).is_err());
        assert!(ClearValue::from_bytes(EncryptedType::Bool, &[2]).is_err());
    }

    #[test]
    fn test_unknown_type_code() {
        assert_eq!(EncryptedType::from_code(9), Err(EncodingError::UnknownType(9)));
    }
}
