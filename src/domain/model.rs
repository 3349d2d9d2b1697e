use crate::utils::error::{MarketError, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 解析 `0x` 開頭（可省略）的十六進位字串
pub fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let stripped = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    Ok(hex::decode(stripped)?)
}

pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn decode_fixed<const N: usize>(value: &str) -> Result<[u8; N]> {
    let bytes = decode_hex(value)?;
    bytes
        .try_into()
        .map_err(|_| MarketError::InvalidHex(hex::FromHexError::InvalidStringLength))
}

/// 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for Address {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        decode_fixed::<20>(s).map(Self)
    }
}

impl TryFrom<String> for Address {
    type Error = MarketError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// 32-byte transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for TxHash {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        decode_fixed::<32>(s).map(Self)
    }
}

impl TryFrom<String> for TxHash {
    type Error = MarketError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self {
        hash.to_string()
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

/// Raw byte payload, hex encoded on the wire.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Bytes {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        decode_hex(s).map(Self)
    }
}

impl TryFrom<String> for Bytes {
    type Error = MarketError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Bytes> for String {
    fn from(bytes: Bytes) -> Self {
        encode_hex(&bytes.0)
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes({})", encode_hex(&self.0))
    }
}

fn serialize_quantity<S: Serializer>(
    value: &Option<u64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_str(&format!("{:#x}", v)),
        None => serializer.serialize_none(),
    }
}

/// Parameters of `eth_sendTransaction` / `eth_call`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransactionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_quantity"
    )]
    pub gas: Option<u64>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub gas_used: Option<String>,
    /// `0x1` 成功、`0x0` revert；Byzantium 以前的節點不會回傳
    #[serde(default)]
    pub status: Option<String>,
}

impl TransactionReceipt {
    pub fn is_reverted(&self) -> bool {
        matches!(self.status.as_deref(), Some("0x0") | Some("0x00"))
    }
}

/// Where a submitted deployment stands after one receipt lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentStatus {
    Pending,
    Deployed(Address),
}
