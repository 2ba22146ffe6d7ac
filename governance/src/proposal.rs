use std::fmt;

use dao_wallet::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::TokenAmount;

/// Governor proposal lifecycle, in on-chain code order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum ProposalState {
    Pending = 0,
    Active = 1,
    Canceled = 2,
    Defeated = 3,
    Succeeded = 4,
    Queued = 5,
    Expired = 6,
    Executed = 7,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProposalError {
    #[error("unknown proposal state code {0}")]
    UnknownState(u8),
    #[error("unknown vote choice code {0}")]
    UnknownChoice(u8),
    #[error("proposal {id} has {count} tallies, expected one per choice")]
    TallyShape { id: ProposalId, count: usize },
    #[error("proposal {id} is missing the {choice} tally")]
    MissingTally { id: ProposalId, choice: VoteChoice },
}

impl TryFrom<u8> for ProposalState {
    type Error = ProposalError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => ProposalState::Pending,
            1 => ProposalState::Active,
            2 => ProposalState::Canceled,
            3 => ProposalState::Defeated,
            4 => ProposalState::Succeeded,
            5 => ProposalState::Queued,
            6 => ProposalState::Expired,
            7 => ProposalState::Executed,
            other => return Err(ProposalError::UnknownState(other)),
        })
    }
}

impl From<ProposalState> for u8 {
    fn from(state: ProposalState) -> Self {
        state as u8
    }
}

/// Ballot option. Abstain is what an untouched ballot submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum VoteChoice {
    Against = 0,
    For = 1,
    #[default]
    Abstain = 2,
}

impl VoteChoice {
    /// Display and tally order.
    pub const ALL: [VoteChoice; 3] = [VoteChoice::Against, VoteChoice::For, VoteChoice::Abstain];

    pub fn label(&self) -> &'static str {
        match self {
            VoteChoice::Against => "Against",
            VoteChoice::For => "For",
            VoteChoice::Abstain => "Abstain",
        }
    }
}

impl TryFrom<u8> for VoteChoice {
    type Error = ProposalError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(VoteChoice::Against),
            1 => Ok(VoteChoice::For),
            2 => Ok(VoteChoice::Abstain),
            other => Err(ProposalError::UnknownChoice(other)),
        }
    }
}

impl From<VoteChoice> for u8 {
    fn from(choice: VoteChoice) -> Self {
        choice as u8
    }
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque proposal identifier as reported by the vote module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(String);

impl ProposalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProposalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub choice: VoteChoice,
    pub count: TokenAmount,
    pub label: String,
}

impl VoteTally {
    pub fn new(choice: VoteChoice, count: TokenAmount) -> Self {
        Self {
            choice,
            count,
            label: choice.label().to_string(),
        }
    }
}

/// Immutable snapshot of a proposal. A refresh replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub description: String,
    pub state: ProposalState,
    /// Indexed by `VoteChoice as usize`.
    pub votes: [VoteTally; 3],
}

impl Proposal {
    /// A proposal with zero tallies.
    pub fn new(
        id: impl Into<ProposalId>,
        description: impl Into<String>,
        state: ProposalState,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            state,
            votes: VoteChoice::ALL.map(|choice| VoteTally::new(choice, TokenAmount::ZERO)),
        }
    }

    /// Build from tallies in arbitrary order, one per choice.
    pub fn from_tallies(
        id: ProposalId,
        description: String,
        state: ProposalState,
        tallies: Vec<VoteTally>,
    ) -> Result<Self, ProposalError> {
        if tallies.len() != VoteChoice::ALL.len() {
            return Err(ProposalError::TallyShape {
                id,
                count: tallies.len(),
            });
        }
        let mut slots: [Option<VoteTally>; 3] = [None, None, None];
        for tally in tallies {
            let idx = tally.choice as usize;
            slots[idx] = Some(tally);
        }
        let [against, for_, abstain] = slots;
        let take = |slot: Option<VoteTally>, choice: VoteChoice| {
            slot.ok_or_else(|| ProposalError::MissingTally {
                id: id.clone(),
                choice,
            })
        };
        let votes = [
            take(against, VoteChoice::Against)?,
            take(for_, VoteChoice::For)?,
            take(abstain, VoteChoice::Abstain)?,
        ];
        Ok(Self {
            id,
            description,
            state,
            votes,
        })
    }

    pub fn tally(&self, choice: VoteChoice) -> &VoteTally {
        &self.votes[choice as usize]
    }
}

impl From<String> for ProposalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A call the governor performs if the proposal passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalAction {
    pub to_address: Address,
    pub native_token_value: TokenAmount,
    #[serde(with = "hex_bytes")]
    pub transaction_data: Vec<u8>,
}

/// One entry of a vote batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    pub proposal_id: ProposalId,
    pub choice: VoteChoice,
}

impl Ballot {
    pub fn new(proposal_id: ProposalId, choice: VoteChoice) -> Self {
        Self { proposal_id, choice }
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let digits = raw.strip_prefix("0x").unwrap_or(&raw);
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}
