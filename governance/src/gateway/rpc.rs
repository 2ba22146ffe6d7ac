//! Contract modules backed by a JSON-RPC relay.
//!
//! Each gateway operation maps to one relay method named after the operation
//! (`vote.getAll`, `drop.claim`, ...). Parameters are sent as an object:
//!
//! ```json
//! {"contract": "0x..", "from": "0x..", "args": [...]}
//! ```
//!
//! `from` is present only on writes; the relay forwards those to the wallet
//! for signing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dao_wallet::{Address, JsonRpcClient, RpcError, Signer};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ops, ChainGateway, DropModule, GatewayError, TokenId, TokenModule, VoteModule};
use crate::amount::TokenAmount;
use crate::proposal::{Proposal, ProposalAction, ProposalId, ProposalState, VoteChoice, VoteTally};

pub struct RpcChain {
    client: JsonRpcClient,
    drop_address: Address,
    token_address: Address,
    vote_address: Address,
}

impl RpcChain {
    pub fn new(
        url: impl Into<String>,
        drop_address: Address,
        token_address: Address,
        vote_address: Address,
    ) -> Self {
        Self {
            client: JsonRpcClient::new(url),
            drop_address,
            token_address,
            vote_address,
        }
    }

    pub fn gateway(self: Arc<Self>, network: impl Into<String>) -> ChainGateway {
        ChainGateway::new(network, self.clone(), self.clone(), self)
    }

    async fn read<T: DeserializeOwned>(
        &self,
        op: &'static str,
        contract: Address,
        args: Value,
    ) -> Result<T, GatewayError> {
        let params = json!({ "contract": contract, "args": args });
        self.client.call(op, params).await.map_err(|err| match err {
            RpcError::Decode(message) => GatewayError::Decode { op, message },
            other => GatewayError::Read {
                op,
                message: other.to_string(),
            },
        })
    }

    async fn write(
        &self,
        op: &'static str,
        contract: Address,
        signer: &Signer,
        args: Value,
    ) -> Result<(), GatewayError> {
        let params = json!({
            "contract": contract,
            "from": signer.address(),
            "args": args,
        });
        self.client
            .call::<Value>(op, params)
            .await
            .map(|_receipt| ())
            .map_err(|err| {
                if err.is_user_rejection() {
                    GatewayError::UserRejected { op }
                } else {
                    GatewayError::Write {
                        op,
                        message: err.to_string(),
                    }
                }
            })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(u64),
}

impl From<WireId> for ProposalId {
    fn from(id: WireId) -> Self {
        match id {
            WireId::Text(s) => ProposalId::new(s),
            WireId::Number(n) => ProposalId::new(n.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct TallyWire {
    #[serde(rename = "type")]
    choice: VoteChoice,
    #[serde(default)]
    label: Option<String>,
    count: TokenAmount,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProposalWire {
    proposal_id: WireId,
    description: String,
    state: ProposalState,
    votes: Vec<TallyWire>,
}

impl ProposalWire {
    fn into_proposal(self, op: &'static str) -> Result<Proposal, GatewayError> {
        let tallies = self
            .votes
            .into_iter()
            .map(|t| {
                let mut tally = VoteTally::new(t.choice, t.count);
                if let Some(label) = t.label {
                    tally.label = label;
                }
                tally
            })
            .collect();
        Proposal::from_tallies(self.proposal_id.into(), self.description, self.state, tallies)
            .map_err(|e| GatewayError::Decode {
                op,
                message: e.to_string(),
            })
    }
}

#[derive(Deserialize)]
struct HolderBalanceWire {
    holder: Address,
    balance: TokenAmount,
}

#[async_trait]
impl DropModule for RpcChain {
    fn address(&self) -> Address {
        self.drop_address
    }

    async fn balance_of(
        &self,
        owner: Address,
        token_id: TokenId,
    ) -> Result<TokenAmount, GatewayError> {
        self.read(ops::DROP_BALANCE_OF, self.drop_address, json!([owner, token_id]))
            .await
    }

    async fn claim(
        &self,
        signer: &Signer,
        token_id: TokenId,
        quantity: u64,
    ) -> Result<(), GatewayError> {
        self.write(ops::DROP_CLAIM, self.drop_address, signer, json!([token_id, quantity]))
            .await
    }

    async fn get_all_claimer_addresses(
        &self,
        token_id: TokenId,
    ) -> Result<Vec<Address>, GatewayError> {
        self.read(ops::DROP_CLAIMERS, self.drop_address, json!([token_id]))
            .await
    }
}

#[async_trait]
impl TokenModule for RpcChain {
    fn address(&self) -> Address {
        self.token_address
    }

    async fn get_all_holder_balances(&self) -> Result<HashMap<Address, TokenAmount>, GatewayError> {
        let rows: Vec<HolderBalanceWire> = self
            .read(ops::TOKEN_HOLDER_BALANCES, self.token_address, json!([]))
            .await?;
        Ok(rows.into_iter().map(|row| (row.holder, row.balance)).collect())
    }

    async fn get_delegation_of(&self, owner: Address) -> Result<Address, GatewayError> {
        self.read(ops::TOKEN_DELEGATION_OF, self.token_address, json!([owner]))
            .await
    }

    async fn delegate_to(&self, signer: &Signer, delegatee: Address) -> Result<(), GatewayError> {
        self.write(ops::TOKEN_DELEGATE_TO, self.token_address, signer, json!([delegatee]))
            .await
    }
}

#[async_trait]
impl VoteModule for RpcChain {
    fn address(&self) -> Address {
        self.vote_address
    }

    async fn get_all(&self) -> Result<Vec<Proposal>, GatewayError> {
        let wire: Vec<ProposalWire> = self
            .read(ops::VOTE_GET_ALL, self.vote_address, json!([]))
            .await?;
        wire.into_iter()
            .map(|p| p.into_proposal(ops::VOTE_GET_ALL))
            .collect()
    }

    async fn get(&self, id: &ProposalId) -> Result<Proposal, GatewayError> {
        let wire: ProposalWire = self.read(ops::VOTE_GET, self.vote_address, json!([id])).await?;
        wire.into_proposal(ops::VOTE_GET)
    }

    async fn has_voted(&self, id: &ProposalId, voter: Address) -> Result<bool, GatewayError> {
        self.read(ops::VOTE_HAS_VOTED, self.vote_address, json!([id, voter]))
            .await
    }

    async fn vote(
        &self,
        signer: &Signer,
        id: &ProposalId,
        choice: VoteChoice,
    ) -> Result<(), GatewayError> {
        self.write(ops::VOTE_VOTE, self.vote_address, signer, json!([id, choice]))
            .await
    }

    async fn execute(&self, signer: &Signer, id: &ProposalId) -> Result<(), GatewayError> {
        self.write(ops::VOTE_EXECUTE, self.vote_address, signer, json!([id]))
            .await
    }

    async fn propose(
        &self,
        signer: &Signer,
        description: &str,
        actions: &[ProposalAction],
    ) -> Result<(), GatewayError> {
        self.write(
            ops::VOTE_PROPOSE,
            self.vote_address,
            signer,
            json!([description, actions]),
        )
        .await
    }
}
