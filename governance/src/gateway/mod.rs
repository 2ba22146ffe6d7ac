//! Typed façade over the drop, token and vote contracts.
//!
//! [`ChainGateway`] is the only component that talks to the chain. It owns
//! the signer reference used for writes and forwards each call to a module
//! backend: [`memory::MemoryChain`] in-process, or [`rpc::RpcChain`] over a
//! JSON-RPC relay.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use dao_wallet::{Address, Signer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::abi;
use crate::amount::TokenAmount;
use crate::proposal::{Proposal, ProposalAction, ProposalId, VoteChoice};

pub mod memory;
pub mod rpc;

pub use memory::{ChainCall, MemoryChain};
pub use rpc::RpcChain;

/// Operation names, shared by logs, metrics labels, relay methods and
/// failure injection.
pub mod ops {
    pub const DROP_BALANCE_OF: &str = "drop.balanceOf";
    pub const DROP_CLAIM: &str = "drop.claim";
    pub const DROP_CLAIMERS: &str = "drop.getAllClaimerAddresses";
    pub const TOKEN_HOLDER_BALANCES: &str = "token.getAllHolderBalances";
    pub const TOKEN_DELEGATION_OF: &str = "token.getDelegationOf";
    pub const TOKEN_DELEGATE_TO: &str = "token.delegateTo";
    pub const VOTE_GET_ALL: &str = "vote.getAll";
    pub const VOTE_GET: &str = "vote.get";
    pub const VOTE_HAS_VOTED: &str = "vote.hasVoted";
    pub const VOTE_VOTE: &str = "vote.vote";
    pub const VOTE_EXECUTE: &str = "vote.execute";
    pub const VOTE_PROPOSE: &str = "vote.propose";
}

/// Token id of the membership NFT within the drop.
pub type TokenId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("chain read {op} failed: {message}")]
    Read { op: &'static str, message: String },
    #[error("chain write {op} failed: {message}")]
    Write { op: &'static str, message: String },
    #[error("user rejected {op}")]
    UserRejected { op: &'static str },
    #[error("no wallet signer available for {op}")]
    WalletUnavailable { op: &'static str },
    #[error("invalid {op} response: {message}")]
    Decode { op: &'static str, message: String },
}

impl GatewayError {
    pub fn op(&self) -> &'static str {
        match self {
            GatewayError::Read { op, .. }
            | GatewayError::Write { op, .. }
            | GatewayError::UserRejected { op }
            | GatewayError::WalletUnavailable { op }
            | GatewayError::Decode { op, .. } => op,
        }
    }
}

/// Multi-token NFT drop holding the membership credential.
#[async_trait]
pub trait DropModule: Send + Sync {
    fn address(&self) -> Address;
    async fn balance_of(
        &self,
        owner: Address,
        token_id: TokenId,
    ) -> Result<TokenAmount, GatewayError>;
    async fn claim(
        &self,
        signer: &Signer,
        token_id: TokenId,
        quantity: u64,
    ) -> Result<(), GatewayError>;
    async fn get_all_claimer_addresses(
        &self,
        token_id: TokenId,
    ) -> Result<Vec<Address>, GatewayError>;
}

/// Fungible governance token with vote delegation.
#[async_trait]
pub trait TokenModule: Send + Sync {
    fn address(&self) -> Address;
    async fn get_all_holder_balances(
        &self,
    ) -> Result<HashMap<Address, TokenAmount>, GatewayError>;
    /// The zero address when `owner` has not delegated.
    async fn get_delegation_of(&self, owner: Address) -> Result<Address, GatewayError>;
    async fn delegate_to(&self, signer: &Signer, delegatee: Address) -> Result<(), GatewayError>;
}

/// On-chain governor.
#[async_trait]
pub trait VoteModule: Send + Sync {
    fn address(&self) -> Address;
    async fn get_all(&self) -> Result<Vec<Proposal>, GatewayError>;
    async fn get(&self, id: &ProposalId) -> Result<Proposal, GatewayError>;
    async fn has_voted(&self, id: &ProposalId, voter: Address) -> Result<bool, GatewayError>;
    async fn vote(
        &self,
        signer: &Signer,
        id: &ProposalId,
        choice: VoteChoice,
    ) -> Result<(), GatewayError>;
    async fn execute(&self, signer: &Signer, id: &ProposalId) -> Result<(), GatewayError>;
    async fn propose(
        &self,
        signer: &Signer,
        description: &str,
        actions: &[ProposalAction],
    ) -> Result<(), GatewayError>;
}

pub struct ChainGateway {
    network: String,
    drop: Arc<dyn DropModule>,
    token: Arc<dyn TokenModule>,
    vote: Arc<dyn VoteModule>,
    signer: RwLock<Option<Signer>>,
}

impl ChainGateway {
    pub fn new(
        network: impl Into<String>,
        drop: Arc<dyn DropModule>,
        token: Arc<dyn TokenModule>,
        vote: Arc<dyn VoteModule>,
    ) -> Self {
        Self {
            network: network.into(),
            drop,
            token,
            vote,
            signer: RwLock::new(None),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn drop_address(&self) -> Address {
        self.drop.address()
    }

    pub fn token_address(&self) -> Address {
        self.token.address()
    }

    pub fn vote_address(&self) -> Address {
        self.vote.address()
    }

    /// Swap the key that signs subsequent writes. Called on every wallet change.
    pub fn set_signer(&self, signer: Option<Signer>) {
        let mut slot = self.signer.write().unwrap_or_else(|e| e.into_inner());
        if *slot != signer {
            debug!(signer = ?signer.map(|s| s.address()), "gateway signer updated");
        }
        *slot = signer;
    }

    pub fn signer(&self) -> Option<Signer> {
        *self.signer.read().unwrap_or_else(|e| e.into_inner())
    }

    /// The current signer, provided it signs for `from`. A write built for
    /// one account is never sent from another.
    fn require_signer(&self, op: &'static str, from: Address) -> Result<Signer, GatewayError> {
        match self.signer() {
            Some(signer) if signer.address() == from => Ok(signer),
            Some(signer) => {
                warn!(
                    op,
                    expected = %from,
                    current = %signer.address(),
                    "signer changed, refusing write"
                );
                Err(GatewayError::WalletUnavailable { op })
            }
            None => Err(GatewayError::WalletUnavailable { op }),
        }
    }

    pub async fn drop_balance_of(
        &self,
        owner: Address,
        token_id: TokenId,
    ) -> Result<TokenAmount, GatewayError> {
        self.drop.balance_of(owner, token_id).await
    }

    pub async fn claim(
        &self,
        from: Address,
        token_id: TokenId,
        quantity: u64,
    ) -> Result<(), GatewayError> {
        let signer = self.require_signer(ops::DROP_CLAIM, from)?;
        record_write(
            ops::DROP_CLAIM,
            self.drop.claim(&signer, token_id, quantity).await,
        )
    }

    pub async fn get_all_claimer_addresses(
        &self,
        token_id: TokenId,
    ) -> Result<Vec<Address>, GatewayError> {
        self.drop.get_all_claimer_addresses(token_id).await
    }

    pub async fn get_all_holder_balances(
        &self,
    ) -> Result<HashMap<Address, TokenAmount>, GatewayError> {
        self.token.get_all_holder_balances().await
    }

    pub async fn get_delegation_of(&self, owner: Address) -> Result<Address, GatewayError> {
        self.token.get_delegation_of(owner).await
    }

    pub async fn delegate_to(&self, from: Address, delegatee: Address) -> Result<(), GatewayError> {
        let signer = self.require_signer(ops::TOKEN_DELEGATE_TO, from)?;
        record_write(
            ops::TOKEN_DELEGATE_TO,
            self.token.delegate_to(&signer, delegatee).await,
        )
    }

    /// Calldata for `transfer(to, amount)` on the governance token.
    pub fn encode_transfer(&self, to: Address, amount: TokenAmount) -> Vec<u8> {
        abi::encode_transfer(to, amount)
    }

    pub async fn get_all_proposals(&self) -> Result<Vec<Proposal>, GatewayError> {
        self.vote.get_all().await
    }

    pub async fn get_proposal(&self, id: &ProposalId) -> Result<Proposal, GatewayError> {
        self.vote.get(id).await
    }

    pub async fn has_voted(&self, id: &ProposalId, voter: Address) -> Result<bool, GatewayError> {
        self.vote.has_voted(id, voter).await
    }

    pub async fn vote(
        &self,
        from: Address,
        id: &ProposalId,
        choice: VoteChoice,
    ) -> Result<(), GatewayError> {
        let signer = self.require_signer(ops::VOTE_VOTE, from)?;
        record_write(ops::VOTE_VOTE, self.vote.vote(&signer, id, choice).await)
    }

    pub async fn execute(&self, from: Address, id: &ProposalId) -> Result<(), GatewayError> {
        let signer = self.require_signer(ops::VOTE_EXECUTE, from)?;
        record_write(ops::VOTE_EXECUTE, self.vote.execute(&signer, id).await)
    }

    pub async fn propose(
        &self,
        from: Address,
        description: &str,
        actions: &[ProposalAction],
    ) -> Result<(), GatewayError> {
        let signer = self.require_signer(ops::VOTE_PROPOSE, from)?;
        record_write(
            ops::VOTE_PROPOSE,
            self.vote.propose(&signer, description, actions).await,
        )
    }
}

fn record_write(op: &'static str, result: Result<(), GatewayError>) -> Result<(), GatewayError> {
    metrics::increment_counter!("dao_gateway_write_total", "op" => op);
    match &result {
        Ok(()) => debug!(op, "chain write confirmed"),
        Err(err) => {
            metrics::increment_counter!("dao_gateway_write_failures_total", "op" => op);
            debug!(op, error = %err, "chain write failed");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    #[tokio::test]
    async fn writes_require_a_signer() {
        let chain = Arc::new(MemoryChain::new(addr(1), addr(2), addr(3)));
        let gateway = chain.clone().gateway("rinkeby");

        let err = gateway.claim(addr(0xaa), 0, 1).await.unwrap_err();
        assert_eq!(err, GatewayError::WalletUnavailable { op: ops::DROP_CLAIM });
        assert!(chain.calls().is_empty());

        gateway.set_signer(Some(Signer::new(addr(0xaa), 4)));
        gateway.claim(addr(0xaa), 0, 1).await.unwrap();
        assert_eq!(
            chain.calls(),
            vec![ChainCall::Claim {
                from: addr(0xaa),
                token_id: 0,
                quantity: 1
            }]
        );
    }

    #[tokio::test]
    async fn signer_swap_changes_write_origin() {
        let chain = Arc::new(MemoryChain::new(addr(1), addr(2), addr(3)));
        let gateway = chain.clone().gateway("rinkeby");
        gateway.set_signer(Some(Signer::new(addr(0xaa), 4)));
        gateway.delegate_to(addr(0xaa), addr(0xaa)).await.unwrap();
        gateway.set_signer(Some(Signer::new(addr(0xbb), 4)));
        gateway.delegate_to(addr(0xbb), addr(0xbb)).await.unwrap();

        assert_eq!(gateway.get_delegation_of(addr(0xaa)).await.unwrap(), addr(0xaa));
        assert_eq!(gateway.get_delegation_of(addr(0xbb)).await.unwrap(), addr(0xbb));
        assert_eq!(gateway.get_delegation_of(addr(0xcc)).await.unwrap(), Address::ZERO);

        gateway.set_signer(None);
        assert!(gateway.signer().is_none());
    }

    #[tokio::test]
    async fn writes_for_a_previous_account_are_refused() {
        let chain = Arc::new(MemoryChain::new(addr(1), addr(2), addr(3)));
        let gateway = chain.clone().gateway("rinkeby");
        gateway.set_signer(Some(Signer::new(addr(0xbb), 4)));

        let err = gateway
            .vote(addr(0xaa), &ProposalId::new("1"), VoteChoice::For)
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::WalletUnavailable { op: ops::VOTE_VOTE });
        let err = gateway.delegate_to(addr(0xaa), addr(0xaa)).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::WalletUnavailable {
                op: ops::TOKEN_DELEGATE_TO
            }
        );
        assert!(chain.calls().is_empty());
        assert_eq!(gateway.get_delegation_of(addr(0xbb)).await.unwrap(), Address::ZERO);
    }

    #[test]
    fn encode_transfer_uses_local_abi() {
        let chain = Arc::new(MemoryChain::new(addr(1), addr(2), addr(3)));
        let gateway = chain.gateway("rinkeby");
        let data = gateway.encode_transfer(addr(0xbb), TokenAmount::from_tokens(1));
        assert_eq!(&data[..4], &abi::TRANSFER_SELECTOR);
        assert_eq!(gateway.token_address(), addr(2));
    }
}
