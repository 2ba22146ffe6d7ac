use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::{Address, InjectedProvider, Signer, UnsupportedChain, WalletError};

/// Wallet connectors the adapter knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    Injected,
}

impl FromStr for ConnectorKind {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "injected" => Ok(ConnectorKind::Injected),
            other => Err(WalletError::UnsupportedConnector(other.to_string())),
        }
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorKind::Injected => f.write_str("injected"),
        }
    }
}

/// Snapshot of the connection as seen by the rest of the client.
///
/// `signer` is only present when the wallet is on the expected chain;
/// `address` is kept on a mismatch so a later `chain_changed` can recover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletStatus {
    pub address: Option<Address>,
    pub signer: Option<Signer>,
    pub chain_id: Option<u64>,
    pub chain_error: Option<UnsupportedChain>,
}

/// Wraps an injected provider and publishes connection changes.
///
/// No operation returns an error: chain mismatches land in
/// [`WalletStatus::chain_error`], everything else is logged.
pub struct WalletAdapter {
    provider: Arc<dyn InjectedProvider>,
    expected_chain_id: u64,
    status: watch::Sender<WalletStatus>,
}

impl WalletAdapter {
    pub fn new(provider: Arc<dyn InjectedProvider>, expected_chain_id: u64) -> Self {
        let (status, _) = watch::channel(WalletStatus::default());
        Self {
            provider,
            expected_chain_id,
            status,
        }
    }

    pub fn expected_chain_id(&self) -> u64 {
        self.expected_chain_id
    }

    pub fn current(&self) -> WalletStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified whenever address, signer or chain error change.
    pub fn subscribe(&self) -> watch::Receiver<WalletStatus> {
        self.status.subscribe()
    }

    pub async fn connect(&self, kind: ConnectorKind) {
        info!(%kind, "connecting wallet");
        let accounts = match self.provider.request_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                warn!(error = %err, "wallet connection failed");
                return;
            }
        };
        let chain_id = match self.provider.chain_id().await {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, "failed to read wallet chain id");
                return;
            }
        };
        match accounts.first() {
            Some(account) => self.publish(Some(*account), Some(chain_id)),
            None => warn!(error = %WalletError::NoAccounts, "wallet connection failed"),
        }
    }

    pub fn disconnect(&self) {
        info!("wallet disconnected");
        self.publish(None, None);
    }

    /// EIP-1193 `accountsChanged`.
    pub fn accounts_changed(&self, accounts: &[Address]) {
        let chain_id = self.status.borrow().chain_id;
        match (accounts.first(), chain_id) {
            (Some(account), Some(chain_id)) => self.publish(Some(*account), Some(chain_id)),
            (Some(_), None) => warn!("accounts changed before the wallet was connected"),
            (None, _) => self.disconnect(),
        }
    }

    /// EIP-1193 `chainChanged`.
    pub fn chain_changed(&self, chain_id: u64) {
        let address = self.status.borrow().address;
        if address.is_some() {
            self.publish(address, Some(chain_id));
        }
    }

    fn publish(&self, address: Option<Address>, chain_id: Option<u64>) {
        let next = self.status_for(address, chain_id);
        if let Some(err) = &next.chain_error {
            warn!(error = %err, "wallet is on an unsupported chain");
        }
        self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn status_for(&self, address: Option<Address>, chain_id: Option<u64>) -> WalletStatus {
        let chain_error = chain_id
            .filter(|id| *id != self.expected_chain_id)
            .map(|actual| UnsupportedChain {
                expected: self.expected_chain_id,
                actual,
            });
        let signer = match (address, chain_id, &chain_error) {
            (Some(address), Some(chain_id), None) => Some(Signer::new(address, chain_id)),
            _ => None,
        };
        WalletStatus {
            address,
            signer,
            chain_id,
            chain_error,
        }
    }
}
