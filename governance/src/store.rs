//! Classification of on-chain proposals into the buckets the member page
//! shows.

use std::sync::Arc;

use dao_wallet::Address;
use serde::Serialize;
use tracing::{debug, warn};

use crate::gateway::{ChainGateway, GatewayError};
use crate::proposal::{Proposal, ProposalState};

/// Every proposal lands in at most one bucket. `active` and `voted` together
/// hold exactly the proposals in the `Active` state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProposalBuckets {
    pub active: Vec<Proposal>,
    pub voted: Vec<Proposal>,
    pub defeated: Vec<Proposal>,
    pub executed: Vec<Proposal>,
}

impl ProposalBuckets {
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
            && self.voted.is_empty()
            && self.defeated.is_empty()
            && self.executed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.voted.len() + self.defeated.len() + self.executed.len()
    }
}

pub struct ProposalStore {
    gateway: Arc<ChainGateway>,
}

impl ProposalStore {
    pub fn new(gateway: Arc<ChainGateway>) -> Self {
        Self { gateway }
    }

    /// Fetch all proposals and classify them for `address`.
    ///
    /// Source order is kept within each bucket. A failed `has_voted` check
    /// leaves the proposal votable; a failed listing fails the refresh so the
    /// caller can keep what it had.
    pub async fn refresh(&self, address: Address) -> Result<ProposalBuckets, GatewayError> {
        let proposals = self.gateway.get_all_proposals().await?;
        let mut buckets = ProposalBuckets::default();
        for proposal in proposals {
            match proposal.state {
                ProposalState::Active => {
                    let voted = match self.gateway.has_voted(&proposal.id, address).await {
                        Ok(voted) => voted,
                        Err(err) => {
                            warn!(
                                proposal = %proposal.id,
                                %address,
                                error = %err,
                                "has_voted check failed"
                            );
                            false
                        }
                    };
                    if voted {
                        buckets.voted.push(proposal);
                    } else {
                        buckets.active.push(proposal);
                    }
                }
                ProposalState::Defeated => buckets.defeated.push(proposal),
                ProposalState::Executed => buckets.executed.push(proposal),
                _ => {}
            }
        }
        debug!(
            active = buckets.active.len(),
            voted = buckets.voted.len(),
            defeated = buckets.defeated.len(),
            executed = buckets.executed.len(),
            "classified proposals"
        );
        Ok(buckets)
    }
}
