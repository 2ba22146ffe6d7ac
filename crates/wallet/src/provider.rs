use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::{Address, JsonRpcClient, WalletError};

/// The subset of an EIP-1193 provider the adapter relies on.
#[async_trait]
pub trait InjectedProvider: Send + Sync {
    /// `eth_requestAccounts`: prompt for access and return the exposed accounts.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;
    /// `eth_chainId`: the chain the wallet is currently pointed at.
    async fn chain_id(&self) -> Result<u64, WalletError>;
}

/// Provider bridged over JSON-RPC, e.g. a local wallet daemon or a
/// development node exposing unlocked accounts.
pub struct HttpProvider {
    rpc: JsonRpcClient,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            rpc: JsonRpcClient::new(url),
        }
    }
}

#[async_trait]
impl InjectedProvider for HttpProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let raw: Vec<String> = self.rpc.call("eth_requestAccounts", json!([])).await?;
        raw.iter()
            .map(|s| {
                s.parse::<Address>()
                    .map_err(|e| WalletError::InvalidResponse(e.to_string()))
            })
            .collect()
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        let raw: String = self.rpc.call("eth_chainId", json!([])).await?;
        parse_quantity(&raw)
    }
}

/// Parse an EIP-1474 hex quantity such as `0x4`.
pub fn parse_quantity(raw: &str) -> Result<u64, WalletError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| WalletError::InvalidResponse(format!("quantity without 0x: {raw}")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| WalletError::InvalidResponse(format!("{raw}: {e}")))
}

#[derive(Default)]
struct MockState {
    accounts: Vec<Address>,
    chain_id: u64,
    reject: bool,
    unavailable: bool,
}

/// Scripted provider for tests and offline demos.
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

impl MockProvider {
    pub fn new(accounts: Vec<Address>, chain_id: u64) -> Self {
        Self {
            state: Mutex::new(MockState {
                accounts,
                chain_id,
                ..MockState::default()
            }),
        }
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.lock().accounts = accounts;
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.lock().chain_id = chain_id;
    }

    /// Make the next requests fail as if the user dismissed the prompt.
    pub fn set_reject(&self, reject: bool) {
        self.lock().reject = reject;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl InjectedProvider for MockProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let state = self.lock();
        if state.unavailable {
            return Err(WalletError::Unavailable("no injected provider".into()));
        }
        if state.reject {
            return Err(WalletError::UserRejected);
        }
        Ok(state.accounts.clone())
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        let state = self.lock();
        if state.unavailable {
            return Err(WalletError::Unavailable("no injected provider".into()));
        }
        Ok(state.chain_id)
    }
}
