//! Client-side governance for a membership-NFT DAO.
//!
//! The crate connects a wallet, tracks whether the account holds the
//! membership token, classifies on-chain proposals, runs the multi-step vote
//! flow and composes treasury transfer proposals. All chain access goes
//! through [`gateway::ChainGateway`].

use thiserror::Error;

pub mod abi;
pub mod amount;
pub mod composer;
pub mod config;
pub mod controller;
pub mod gateway;
pub mod membership;
pub mod orchestrator;
pub mod proposal;
pub mod state;
pub mod store;
pub mod treasury;
pub mod view;

pub use amount::{AmountError, TokenAmount, TOKEN_DECIMALS};
pub use composer::{ComposeError, ComposerInputs, Draft, ProposalComposer};
pub use config::{ConfigError, Contracts, DaoConfig};
pub use controller::DaoClient;
pub use gateway::{ChainGateway, GatewayError};
pub use membership::{MembershipService, MEMBERSHIP_TOKEN_ID};
pub use orchestrator::{
    ensure_delegation, BallotFailure, VoteError, VoteOrchestrator, VoteReport,
};
pub use proposal::{
    Ballot, Proposal, ProposalAction, ProposalError, ProposalId, ProposalState, VoteChoice,
    VoteTally,
};
pub use state::{Session, SessionState};
pub use store::{ProposalBuckets, ProposalStore};
pub use treasury::{Member, TreasuryService};
pub use view::{shorten_address, View};

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("no wallet connected")]
    NotConnected,
    #[error("another request of this kind is still running")]
    Busy,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
