//! In-process simulation of the drop, token and vote contracts.
//!
//! Keeps a log of every write it accepts so callers can assert exactly which
//! transactions a flow would have broadcast. Reads and writes can be made to
//! fail per operation, and a proposal can be scripted to move to another
//! state once a vote lands on it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use dao_wallet::{Address, Signer};

use super::{ops, ChainGateway, DropModule, GatewayError, TokenId, TokenModule, VoteModule};
use crate::abi;
use crate::amount::TokenAmount;
use crate::proposal::{Proposal, ProposalAction, ProposalId, ProposalState, VoteChoice};

/// A write accepted by the simulated chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    Claim {
        from: Address,
        token_id: TokenId,
        quantity: u64,
    },
    DelegateTo {
        from: Address,
        delegatee: Address,
    },
    Vote {
        from: Address,
        id: ProposalId,
        choice: VoteChoice,
    },
    Execute {
        from: Address,
        id: ProposalId,
    },
    Propose {
        from: Address,
        description: String,
        actions: Vec<ProposalAction>,
    },
}

#[derive(Default)]
struct ChainState {
    nft_balances: HashMap<(Address, TokenId), u64>,
    claimers: HashMap<TokenId, Vec<Address>>,
    token_balances: HashMap<Address, TokenAmount>,
    delegations: HashMap<Address, Address>,
    proposals: Vec<Proposal>,
    actions: HashMap<ProposalId, Vec<ProposalAction>>,
    voters: HashSet<(ProposalId, Address)>,
    after_vote: HashMap<ProposalId, ProposalState>,
    failing: HashSet<&'static str>,
    rejecting: HashSet<&'static str>,
    failing_has_voted: HashSet<ProposalId>,
    calls: Vec<ChainCall>,
    next_id: u64,
}

pub struct MemoryChain {
    drop_address: Address,
    token_address: Address,
    vote_address: Address,
    state: Mutex<ChainState>,
}

impl MemoryChain {
    pub fn new(drop_address: Address, token_address: Address, vote_address: Address) -> Self {
        Self {
            drop_address,
            token_address,
            vote_address,
            state: Mutex::new(ChainState {
                next_id: 1,
                ..ChainState::default()
            }),
        }
    }

    /// Wrap this chain in a gateway that uses it for all three modules.
    pub fn gateway(self: Arc<Self>, network: impl Into<String>) -> ChainGateway {
        ChainGateway::new(network, self.clone(), self.clone(), self)
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Give `owner` one membership token and record them as a claimer.
    pub fn grant_membership(&self, owner: Address) {
        let mut state = self.lock();
        credit_nft(&mut state, owner, 0, 1);
    }

    /// List `owner` as a claimer without a current balance, as after a
    /// transfer away.
    pub fn add_claimer(&self, token_id: TokenId, owner: Address) {
        let mut state = self.lock();
        let claimers = state.claimers.entry(token_id).or_default();
        if !claimers.contains(&owner) {
            claimers.push(owner);
        }
    }

    pub fn set_token_balance(&self, holder: Address, amount: TokenAmount) {
        self.lock().token_balances.insert(holder, amount);
    }

    pub fn set_delegation(&self, owner: Address, delegatee: Address) {
        self.lock().delegations.insert(owner, delegatee);
    }

    pub fn insert_proposal(&self, proposal: Proposal) {
        let mut state = self.lock();
        match state.proposals.iter_mut().find(|p| p.id == proposal.id) {
            Some(existing) => *existing = proposal,
            None => state.proposals.push(proposal),
        }
    }

    pub fn set_proposal_state(&self, id: &ProposalId, next: ProposalState) {
        if let Some(p) = self.lock().proposals.iter_mut().find(|p| &p.id == id) {
            p.state = next;
        }
    }

    /// Move `id` to `next` as soon as any vote is cast on it.
    pub fn transition_after_vote(&self, id: &ProposalId, next: ProposalState) {
        self.lock().after_vote.insert(id.clone(), next);
    }

    pub fn mark_voted(&self, id: &ProposalId, voter: Address) {
        self.lock().voters.insert((id.clone(), voter));
    }

    /// Make every call of `op` fail (reads) or revert (writes).
    pub fn fail(&self, op: &'static str) {
        self.lock().failing.insert(op);
    }

    /// Make every call of write `op` fail as a user rejection.
    pub fn reject(&self, op: &'static str) {
        self.lock().rejecting.insert(op);
    }

    pub fn fail_has_voted_for(&self, id: &ProposalId) {
        self.lock().failing_has_voted.insert(id.clone());
    }

    pub fn heal(&self) {
        let mut state = self.lock();
        state.failing.clear();
        state.rejecting.clear();
        state.failing_has_voted.clear();
    }

    pub fn calls(&self) -> Vec<ChainCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn token_balance(&self, holder: Address) -> TokenAmount {
        self.lock()
            .token_balances
            .get(&holder)
            .copied()
            .unwrap_or_default()
    }

    fn read(&self, op: &'static str) -> Result<MutexGuard<'_, ChainState>, GatewayError> {
        let state = self.lock();
        if state.failing.contains(op) {
            return Err(GatewayError::Read {
                op,
                message: "simulated rpc failure".into(),
            });
        }
        Ok(state)
    }

    fn write(&self, op: &'static str) -> Result<MutexGuard<'_, ChainState>, GatewayError> {
        let state = self.lock();
        if state.rejecting.contains(op) {
            return Err(GatewayError::UserRejected { op });
        }
        if state.failing.contains(op) {
            return Err(revert(op, "simulated revert"));
        }
        Ok(state)
    }
}

fn revert(op: &'static str, reason: &str) -> GatewayError {
    GatewayError::Write {
        op,
        message: format!("execution reverted: {reason}"),
    }
}

fn credit_nft(state: &mut ChainState, owner: Address, token_id: TokenId, quantity: u64) {
    *state.nft_balances.entry((owner, token_id)).or_default() += quantity;
    let claimers = state.claimers.entry(token_id).or_default();
    if !claimers.contains(&owner) {
        claimers.push(owner);
    }
}

fn find_proposal<'a>(
    state: &'a mut ChainState,
    id: &ProposalId,
    op: &'static str,
) -> Result<&'a mut Proposal, GatewayError> {
    state
        .proposals
        .iter_mut()
        .find(|p| &p.id == id)
        .ok_or_else(|| revert(op, "unknown proposal id"))
}

#[async_trait]
impl DropModule for MemoryChain {
    fn address(&self) -> Address {
        self.drop_address
    }

    async fn balance_of(
        &self,
        owner: Address,
        token_id: TokenId,
    ) -> Result<TokenAmount, GatewayError> {
        let state = self.read(ops::DROP_BALANCE_OF)?;
        let held = state.nft_balances.get(&(owner, token_id)).copied().unwrap_or(0);
        Ok(TokenAmount::from(held))
    }

    async fn claim(
        &self,
        signer: &Signer,
        token_id: TokenId,
        quantity: u64,
    ) -> Result<(), GatewayError> {
        let mut state = self.write(ops::DROP_CLAIM)?;
        credit_nft(&mut state, signer.address(), token_id, quantity);
        state.calls.push(ChainCall::Claim {
            from: signer.address(),
            token_id,
            quantity,
        });
        Ok(())
    }

    async fn get_all_claimer_addresses(
        &self,
        token_id: TokenId,
    ) -> Result<Vec<Address>, GatewayError> {
        let state = self.read(ops::DROP_CLAIMERS)?;
        Ok(state.claimers.get(&token_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl TokenModule for MemoryChain {
    fn address(&self) -> Address {
        self.token_address
    }

    async fn get_all_holder_balances(&self) -> Result<HashMap<Address, TokenAmount>, GatewayError> {
        let state = self.read(ops::TOKEN_HOLDER_BALANCES)?;
        Ok(state
            .token_balances
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(holder, amount)| (*holder, *amount))
            .collect())
    }

    async fn get_delegation_of(&self, owner: Address) -> Result<Address, GatewayError> {
        let state = self.read(ops::TOKEN_DELEGATION_OF)?;
        Ok(state.delegations.get(&owner).copied().unwrap_or(Address::ZERO))
    }

    async fn delegate_to(&self, signer: &Signer, delegatee: Address) -> Result<(), GatewayError> {
        let mut state = self.write(ops::TOKEN_DELEGATE_TO)?;
        state.delegations.insert(signer.address(), delegatee);
        state.calls.push(ChainCall::DelegateTo {
            from: signer.address(),
            delegatee,
        });
        Ok(())
    }
}

#[async_trait]
impl VoteModule for MemoryChain {
    fn address(&self) -> Address {
        self.vote_address
    }

    async fn get_all(&self) -> Result<Vec<Proposal>, GatewayError> {
        let state = self.read(ops::VOTE_GET_ALL)?;
        Ok(state.proposals.clone())
    }

    async fn get(&self, id: &ProposalId) -> Result<Proposal, GatewayError> {
        let state = self.read(ops::VOTE_GET)?;
        state
            .proposals
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::Read {
                op: ops::VOTE_GET,
                message: format!("unknown proposal {id}"),
            })
    }

    async fn has_voted(&self, id: &ProposalId, voter: Address) -> Result<bool, GatewayError> {
        let state = self.read(ops::VOTE_HAS_VOTED)?;
        if state.failing_has_voted.contains(id) {
            return Err(GatewayError::Read {
                op: ops::VOTE_HAS_VOTED,
                message: format!("simulated rpc failure for {id}"),
            });
        }
        Ok(state.voters.contains(&(id.clone(), voter)))
    }

    async fn vote(
        &self,
        signer: &Signer,
        id: &ProposalId,
        choice: VoteChoice,
    ) -> Result<(), GatewayError> {
        let mut state = self.write(ops::VOTE_VOTE)?;
        let voter = signer.address();
        if state.voters.contains(&(id.clone(), voter)) {
            return Err(revert(ops::VOTE_VOTE, "vote already cast"));
        }
        // Undelegated tokens carry no voting weight.
        let weight = if state.delegations.contains_key(&voter) {
            state.token_balances.get(&voter).copied().unwrap_or_default()
        } else {
            TokenAmount::ZERO
        };
        let next = state.after_vote.get(id).copied();
        let proposal = find_proposal(&mut state, id, ops::VOTE_VOTE)?;
        if proposal.state != ProposalState::Active {
            return Err(revert(ops::VOTE_VOTE, "vote not currently active"));
        }
        let tally = &mut proposal.votes[choice as usize];
        tally.count = tally
            .count
            .checked_add(weight)
            .ok_or_else(|| revert(ops::VOTE_VOTE, "tally overflow"))?;
        if let Some(next) = next {
            proposal.state = next;
        }
        state.voters.insert((id.clone(), voter));
        state.calls.push(ChainCall::Vote {
            from: voter,
            id: id.clone(),
            choice,
        });
        Ok(())
    }

    async fn execute(&self, signer: &Signer, id: &ProposalId) -> Result<(), GatewayError> {
        let mut state = self.write(ops::VOTE_EXECUTE)?;
        let proposal = find_proposal(&mut state, id, ops::VOTE_EXECUTE)?;
        if proposal.state != ProposalState::Succeeded {
            return Err(revert(ops::VOTE_EXECUTE, "proposal not successful"));
        }
        proposal.state = ProposalState::Executed;
        let actions = state.actions.get(id).cloned().unwrap_or_default();
        let treasury = self.vote_address;
        for action in &actions {
            if action.to_address != self.token_address {
                continue;
            }
            if let Some((to, amount)) = abi::decode_transfer(&action.transaction_data) {
                let from_balance = state.token_balances.get(&treasury).copied().unwrap_or_default();
                let remaining = from_balance
                    .checked_sub(amount)
                    .ok_or_else(|| revert(ops::VOTE_EXECUTE, "transfer amount exceeds balance"))?;
                state.token_balances.insert(treasury, remaining);
                let credited = state
                    .token_balances
                    .get(&to)
                    .copied()
                    .unwrap_or_default()
                    .checked_add(amount)
                    .ok_or_else(|| revert(ops::VOTE_EXECUTE, "balance overflow"))?;
                state.token_balances.insert(to, credited);
            }
        }
        state.calls.push(ChainCall::Execute {
            from: signer.address(),
            id: id.clone(),
        });
        Ok(())
    }

    async fn propose(
        &self,
        signer: &Signer,
        description: &str,
        actions: &[ProposalAction],
    ) -> Result<(), GatewayError> {
        let mut state = self.write(ops::VOTE_PROPOSE)?;
        if actions.is_empty() {
            return Err(revert(ops::VOTE_PROPOSE, "empty proposal"));
        }
        let id = ProposalId::new(state.next_id.to_string());
        state.next_id += 1;
        state
            .proposals
            .push(Proposal::new(id.clone(), description, ProposalState::Active));
        state.actions.insert(id, actions.to_vec());
        state.calls.push(ChainCall::Propose {
            from: signer.address(),
            description: description.to_string(),
            actions: actions.to_vec(),
        });
        Ok(())
    }
}
