//! Treasury transfer proposals.

use std::sync::Arc;

use dao_wallet::{Address, AddressError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::amount::{AmountError, TokenAmount, TOKEN_DECIMALS};
use crate::gateway::{ChainGateway, GatewayError};
use crate::orchestrator::ensure_delegation;
use crate::proposal::ProposalAction;

/// Raw form inputs, kept as typed so the description quotes them verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerInputs {
    pub amount: String,
    pub to_address: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("invalid amount: {0}")]
    Amount(#[from] AmountError),
    #[error("invalid recipient: {0}")]
    Recipient(#[from] AddressError),
    #[error("failed to delegate voting power: {0}")]
    Delegation(#[source] GatewayError),
    #[error("failed to create proposal: {0}")]
    Propose(#[source] GatewayError),
}

/// A proposal ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub description: String,
    pub actions: Vec<ProposalAction>,
}

pub struct ProposalComposer {
    gateway: Arc<ChainGateway>,
}

impl ProposalComposer {
    pub fn new(gateway: Arc<ChainGateway>) -> Self {
        Self { gateway }
    }

    /// Validate `inputs` and build the single-transfer proposal. No chain
    /// access.
    pub fn draft(&self, inputs: &ComposerInputs) -> Result<Draft, ComposeError> {
        let amount = TokenAmount::parse_units(&inputs.amount, TOKEN_DECIMALS)?;
        let to: Address = inputs.to_address.trim().parse()?;
        let description = format!(
            "Should the DAO transfer {} tokens from the treasury to {} {}",
            inputs.amount, inputs.to_address, inputs.reason
        );
        let action = ProposalAction {
            to_address: self.gateway.token_address(),
            native_token_value: TokenAmount::ZERO,
            transaction_data: self.gateway.encode_transfer(to, amount),
        };
        Ok(Draft {
            description,
            actions: vec![action],
        })
    }

    /// Delegate if needed, then submit the drafted proposal from `address`.
    pub async fn propose(
        &self,
        address: Address,
        inputs: &ComposerInputs,
    ) -> Result<Draft, ComposeError> {
        let draft = self.draft(inputs)?;
        ensure_delegation(&self.gateway, address)
            .await
            .map_err(ComposeError::Delegation)?;
        self.gateway
            .propose(address, &draft.description, &draft.actions)
            .await
            .map_err(ComposeError::Propose)?;
        info!(%address, description = %draft.description, "proposal submitted");
        Ok(draft)
    }
}
