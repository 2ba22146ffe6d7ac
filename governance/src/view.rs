//! What the member page shows for a given session state.

use std::fmt;

use dao_wallet::{Address, UnsupportedChain};
use primitive_types::U256;
use serde::Serialize;

use crate::composer::ComposerInputs;
use crate::proposal::{Proposal, ProposalId, VoteChoice};
use crate::state::SessionState;
use crate::treasury;

pub const MINT_LABEL: &str = "Mint your nft (FREE)";
pub const MINTING_LABEL: &str = "Minting...";
pub const VOTE_LABEL: &str = "Submit Votes";
pub const VOTING_LABEL: &str = "Voting...";
pub const PROPOSE_LABEL: &str = "Propose";
pub const PROPOSING_LABEL: &str = "Proposing...";
pub const PROPOSED_LABEL: &str = "Successfully proposed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum View {
    ChainMismatch { expected: u64, actual: u64 },
    Landing,
    Mint { claiming: bool, button: &'static str },
    Member(Box<MemberPage>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberPage {
    pub address: Address,
    pub members: Vec<MemberRow>,
    pub ballots: Vec<BallotView>,
    pub voting: bool,
    pub vote_button: &'static str,
    pub voted: Vec<ProposalCard>,
    pub defeated: Vec<ProposalCard>,
    pub executed: Vec<ProposalCard>,
    /// Present only when the connected account holds governance tokens.
    pub composer: Option<ComposerView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberRow {
    pub address: String,
    pub token_amount: String,
}

/// An open ballot. Options follow `VoteChoice::ALL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BallotView {
    pub id: ProposalId,
    pub description: String,
    pub options: Vec<BallotOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BallotOption {
    pub choice: VoteChoice,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalCard {
    pub id: ProposalId,
    pub description: String,
    /// `(label, whole tokens)` in `VoteChoice::ALL` order.
    pub tallies: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposerView {
    pub inputs: ComposerInputs,
    pub proposing: bool,
    pub button: &'static str,
}

/// `0x1234...abcd`.
pub fn shorten_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Tally count in whole tokens, rounded half away from zero.
pub fn tally_whole_tokens(proposal: &Proposal, choice: VoteChoice) -> U256 {
    proposal.tally(choice).count.whole_tokens_rounded()
}

pub fn render(state: &SessionState) -> View {
    if let Some(UnsupportedChain { expected, actual }) = state.chain_error {
        return View::ChainMismatch { expected, actual };
    }
    let Some(address) = state.address else {
        return View::Landing;
    };
    if !state.has_membership {
        return View::Mint {
            claiming: state.is_claiming,
            button: if state.is_claiming { MINTING_LABEL } else { MINT_LABEL },
        };
    }

    let members = state
        .members
        .iter()
        .map(|m| MemberRow {
            address: shorten_address(&m.address.to_string()),
            token_amount: m.token_amount.to_string(),
        })
        .collect();
    let ballots = state.proposals.active.iter().map(ballot).collect();
    let holds_tokens = !treasury::balance_of(&state.balances, address).is_zero();
    let composer = holds_tokens.then(|| ComposerView {
        inputs: state.composer.clone(),
        proposing: state.is_proposing,
        button: if state.is_proposing {
            PROPOSING_LABEL
        } else if state.has_proposed {
            PROPOSED_LABEL
        } else {
            PROPOSE_LABEL
        },
    });

    View::Member(Box::new(MemberPage {
        address,
        members,
        ballots,
        voting: state.is_voting,
        vote_button: if state.is_voting { VOTING_LABEL } else { VOTE_LABEL },
        voted: state.proposals.voted.iter().map(card).collect(),
        defeated: state.proposals.defeated.iter().map(card).collect(),
        executed: state.proposals.executed.iter().map(card).collect(),
        composer,
    }))
}

fn ballot(proposal: &Proposal) -> BallotView {
    BallotView {
        id: proposal.id.clone(),
        description: proposal.description.clone(),
        options: proposal
            .votes
            .iter()
            .map(|t| BallotOption {
                choice: t.choice,
                label: t.label.clone(),
                selected: t.choice == VoteChoice::default(),
            })
            .collect(),
    }
}

fn card(proposal: &Proposal) -> ProposalCard {
    ProposalCard {
        id: proposal.id.clone(),
        description: proposal.description.clone(),
        tallies: VoteChoice::ALL
            .iter()
            .map(|c| (c.label().to_string(), tally_whole_tokens(proposal, *c).to_string()))
            .collect(),
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::ChainMismatch { expected, actual } => {
                writeln!(f, "Please connect to chain {expected}")?;
                write!(f, "The wallet is on chain {actual}; switch networks in your wallet.")
            }
            View::Landing => write!(f, "Welcome. Connect your wallet to continue."),
            View::Mint { button, .. } => write!(f, "Not a member yet. [{button}]"),
            View::Member(page) => fmt::Display::fmt(page, f),
        }
    }
}

impl fmt::Display for MemberPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Member page for {}", self.address)?;
        writeln!(f, "\nMembers")?;
        for m in &self.members {
            writeln!(f, "  {:<16} {}", m.address, m.token_amount)?;
        }
        if !self.ballots.is_empty() {
            writeln!(f, "\nActive proposals")?;
            for b in &self.ballots {
                writeln!(f, "  [{}] {}", b.id, b.description)?;
            }
        }
        for (title, cards) in [
            ("Already voted", &self.voted),
            ("Defeated", &self.defeated),
            ("Executed", &self.executed),
        ] {
            if cards.is_empty() {
                continue;
            }
            writeln!(f, "\n{title}")?;
            for c in cards {
                let tallies: Vec<String> =
                    c.tallies.iter().map(|(l, n)| format!("{l}: {n}")).collect();
                writeln!(f, "  [{}] {} ({})", c.id, c.description, tallies.join(", "))?;
            }
        }
        Ok(())
    }
}
