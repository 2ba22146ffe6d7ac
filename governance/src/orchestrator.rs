//! The vote flow: delegate, cast every ballot, then execute whatever passed.
//!
//! Steps run strictly in order and stop at the first failing step. Within a
//! step the per-proposal calls run concurrently and are all awaited before
//! the step is judged. Transactions already broadcast are never compensated.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dao_wallet::Address;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::gateway::{ops, ChainGateway, GatewayError};
use crate::proposal::{Ballot, ProposalId, ProposalState};

/// A per-proposal failure inside a concurrent step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotFailure {
    pub proposal: ProposalId,
    pub error: GatewayError,
}

impl fmt::Display for BallotFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proposal {}: {}", self.proposal, self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("failed to delegate voting power: {0}")]
    Delegation(#[source] GatewayError),
    #[error("failed to cast {} vote(s), first {}", .0.len(), first(.0))]
    Cast(Vec<BallotFailure>),
    #[error("failed to execute {} proposal(s), first {}", .0.len(), first(.0))]
    Execute(Vec<BallotFailure>),
}

fn first(failures: &[BallotFailure]) -> String {
    failures.first().map(ToString::to_string).unwrap_or_default()
}

/// Outcome of a successful vote batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteReport {
    pub trace_id: Uuid,
    /// Whether this batch had to delegate first.
    pub delegated: bool,
    pub cast: Vec<ProposalId>,
    /// Ballots whose proposal had left the `Active` state.
    pub skipped: Vec<ProposalId>,
    pub executed: Vec<ProposalId>,
}

/// Delegate `address`'s tokens to itself unless they are already delegated.
/// Returns whether a delegation transaction was sent.
pub async fn ensure_delegation(
    gateway: &ChainGateway,
    address: Address,
) -> Result<bool, GatewayError> {
    let delegation = gateway.get_delegation_of(address).await?;
    if delegation != Address::ZERO {
        return Ok(false);
    }
    info!(%address, "delegating voting power to self");
    gateway.delegate_to(address, address).await?;
    Ok(true)
}

pub struct VoteOrchestrator {
    gateway: Arc<ChainGateway>,
}

impl VoteOrchestrator {
    pub fn new(gateway: Arc<ChainGateway>) -> Self {
        Self { gateway }
    }

    /// Every write in the batch is signed for `address`; once the wallet
    /// moves to another account the remaining writes fail instead.
    pub async fn submit(
        &self,
        address: Address,
        ballots: Vec<Ballot>,
    ) -> Result<VoteReport, VoteError> {
        let trace_id = Uuid::new_v4();
        let span = info_span!("vote_batch", %trace_id, voter = %address, ballots = ballots.len());
        self.run(trace_id, address, ballots).instrument(span).await
    }

    async fn run(
        &self,
        trace_id: Uuid,
        address: Address,
        ballots: Vec<Ballot>,
    ) -> Result<VoteReport, VoteError> {
        let delegated = ensure_delegation(&self.gateway, address)
            .await
            .map_err(VoteError::Delegation)?;

        let ids: Vec<ProposalId> = ballots.iter().map(|b| b.proposal_id.clone()).collect();

        let casts = ballots.into_iter().map(|ballot| {
            let gateway = self.gateway.clone();
            async move {
                let proposal = gateway.get_proposal(&ballot.proposal_id).await?;
                if proposal.state != ProposalState::Active {
                    info!(
                        proposal = %ballot.proposal_id,
                        state = ?proposal.state,
                        "proposal no longer active, not voting"
                    );
                    return Ok(false);
                }
                gateway
                    .vote(address, &ballot.proposal_id, ballot.choice)
                    .await?;
                metrics::increment_counter!("dao_votes_cast_total");
                info!(proposal = %ballot.proposal_id, choice = %ballot.choice, "vote cast");
                Ok::<_, GatewayError>(true)
            }
        });
        let cast_outcomes = settle(ops::VOTE_VOTE, casts).await;
        let (cast, skipped) = partition(&ids, cast_outcomes).map_err(VoteError::Cast)?;

        let executions = ids.iter().cloned().map(|id| {
            let gateway = self.gateway.clone();
            async move {
                let proposal = gateway.get_proposal(&id).await?;
                if proposal.state != ProposalState::Succeeded {
                    return Ok(false);
                }
                gateway.execute(address, &id).await?;
                metrics::increment_counter!("dao_proposals_executed_total");
                info!(proposal = %id, "proposal executed");
                Ok::<_, GatewayError>(true)
            }
        });
        let exec_outcomes = settle(ops::VOTE_EXECUTE, executions).await;
        let (executed, _) = partition(&ids, exec_outcomes).map_err(VoteError::Execute)?;

        info!(
            cast = cast.len(),
            skipped = skipped.len(),
            executed = executed.len(),
            "vote batch complete"
        );
        Ok(VoteReport {
            trace_id,
            delegated,
            cast,
            skipped,
            executed,
        })
    }
}

/// Run every future to completion and return the outcomes in input order.
async fn settle<F>(
    op: &'static str,
    futures: impl Iterator<Item = F>,
) -> Vec<Result<bool, GatewayError>>
where
    F: Future<Output = Result<bool, GatewayError>> + Send + 'static,
{
    let mut set = JoinSet::new();
    let mut count = 0;
    for (idx, fut) in futures.enumerate() {
        set.spawn(async move { (idx, fut.await) }.in_current_span());
        count += 1;
    }
    let mut outcomes: Vec<Option<Result<bool, GatewayError>>> = vec![None; count];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, outcome)) => outcomes[idx] = Some(outcome),
            Err(err) => warn!(error = %err, "ballot task aborted"),
        }
    }
    outcomes
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(GatewayError::Write {
                    op,
                    message: "task aborted".into(),
                })
            })
        })
        .collect()
}

/// Split settled outcomes into (acted, skipped) ids, or collect every failure.
fn partition(
    ids: &[ProposalId],
    outcomes: Vec<Result<bool, GatewayError>>,
) -> Result<(Vec<ProposalId>, Vec<ProposalId>), Vec<BallotFailure>> {
    let mut acted = Vec::new();
    let mut skipped = Vec::new();
    let mut failures = Vec::new();
    for (id, outcome) in ids.iter().zip(outcomes) {
        match outcome {
            Ok(true) => acted.push(id.clone()),
            Ok(false) => skipped.push(id.clone()),
            Err(error) => {
                warn!(proposal = %id, error = %error, "ballot step failed");
                failures.push(BallotFailure {
                    proposal: id.clone(),
                    error,
                });
            }
        }
    }
    if failures.is_empty() {
        Ok((acted, skipped))
    } else {
        Err(failures)
    }
}
