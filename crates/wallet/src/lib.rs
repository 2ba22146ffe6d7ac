use thiserror::Error;

pub mod adapter;
pub mod address;
pub mod jsonrpc;
pub mod provider;

pub use adapter::{ConnectorKind, WalletAdapter, WalletStatus};
pub use address::{Address, AddressError, ADDRESS_LENGTH};
pub use jsonrpc::{JsonRpcClient, RpcError, USER_REJECTED_CODE};
pub use provider::{HttpProvider, InjectedProvider, MockProvider};

/// The connected wallet reports a chain other than the configured one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported chain {actual}, expected {expected}")]
pub struct UnsupportedChain {
    pub expected: u64,
    pub actual: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("wallet unavailable: {0}")]
    Unavailable(String),
    #[error("user rejected the request")]
    UserRejected,
    #[error("wallet exposed no accounts")]
    NoAccounts,
    #[error("unsupported connector: {0}")]
    UnsupportedConnector(String),
    #[error(transparent)]
    UnsupportedChain(#[from] UnsupportedChain),
    #[error("invalid wallet response: {0}")]
    InvalidResponse(String),
}

impl From<RpcError> for WalletError {
    fn from(err: RpcError) -> Self {
        if err.is_user_rejection() {
            return WalletError::UserRejected;
        }
        match err {
            RpcError::Decode(msg) => WalletError::InvalidResponse(msg),
            other => WalletError::Unavailable(other.to_string()),
        }
    }
}

/// Handle used to authorize contract writes on behalf of the connected
/// account. The wallet itself holds the keys; the handle only names the
/// account and the chain it was issued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signer {
    address: Address,
    chain_id: u64,
}

impl Signer {
    pub fn new(address: Address, chain_id: u64) -> Self {
        Self { address, chain_id }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}
