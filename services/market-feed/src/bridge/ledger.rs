//! Ledger boundary: account keys, the client trait and the chunked fetch

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BridgeError;

/// Upper bound on keys per `getMultipleAccounts` request.
pub const MAX_CHUNK_SIZE: usize = 99;

/// 32-byte account address, displayed in base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountKey(pub [u8; 32]);

impl AccountKey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Read a key from a 32-byte slice.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The all-zero key marks an absent link in account layouts.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountKey({})", self)
    }
}

impl FromStr for AccountKey {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| BridgeError::InvalidKey(format!("{}: {}", s, e)))?;
        Self::from_slice(&bytes)
            .ok_or_else(|| BridgeError::InvalidKey(format!("{}: {} bytes", s, bytes.len())))
    }
}

impl TryFrom<String> for AccountKey {
    type Error = BridgeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AccountKey> for String {
    fn from(key: AccountKey) -> Self {
        key.to_string()
    }
}

/// Current slot and cumulative transaction count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochInfo {
    pub absolute_slot: u64,
    #[serde(default)]
    pub transaction_count: Option<u64>,
}

/// Invoked with the raw account bytes on every remote change.
pub type AccountCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Remote ledger holding the oracle accounts.
#[async_trait]
pub trait LedgerClient: Send + Sync + 'static {
    /// Fetch one account. `None` when it does not exist.
    async fn get_account(&self, key: &AccountKey) -> Result<Option<Vec<u8>>, BridgeError>;

    /// Fetch up to [`MAX_CHUNK_SIZE`] accounts. The result is positionally
    /// aligned with `keys`.
    async fn get_multiple_accounts(
        &self,
        keys: &[AccountKey],
    ) -> Result<Vec<Option<Vec<u8>>>, BridgeError>;

    /// Register `callback` for changes to `key`. Returns the subscription id.
    async fn subscribe(&self, key: AccountKey, callback: AccountCallback)
        -> Result<u64, BridgeError>;

    async fn epoch_info(&self) -> Result<EpochInfo, BridgeError>;
}

/// Fetch `keys` in concurrent chunks of at most `chunk_size`.
///
/// Results keep request order. Missing accounts are dropped together with
/// their key, so every returned payload is paired with the key it came
/// from. Any chunk failing fails the whole fetch.
pub async fn fetch_accounts_chunked<L: LedgerClient + ?Sized>(
    client: &L,
    keys: &[AccountKey],
    chunk_size: usize,
) -> Result<Vec<(AccountKey, Vec<u8>)>, BridgeError> {
    let chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
    let requests = keys.chunks(chunk_size).enumerate().map(|(chunk, slice)| async move {
        let values = client.get_multiple_accounts(slice).await?;
        if values.len() != slice.len() {
            return Err(BridgeError::Payload(format!(
                "chunk {} returned {} values for {} keys",
                chunk,
                values.len(),
                slice.len()
            )));
        }
        debug!(chunk, keys = slice.len(), "Fetched account chunk");
        Ok(slice.iter().copied().zip(values).collect::<Vec<_>>())
    });

    let chunks = try_join_all(requests).await?;
    Ok(chunks
        .into_iter()
        .flatten()
        .filter_map(|(key, value)| value.map(|data| (key, data)))
        .collect())
}
