//! Governance token balances and the member table built from them.

use std::collections::HashMap;
use std::sync::Arc;

use dao_wallet::Address;
use serde::Serialize;
use tracing::info;

use crate::amount::TokenAmount;
use crate::gateway::{ChainGateway, GatewayError};

/// A roster entry joined with its token balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub address: Address,
    pub token_amount: TokenAmount,
}

pub struct TreasuryService {
    gateway: Arc<ChainGateway>,
}

impl TreasuryService {
    pub fn new(gateway: Arc<ChainGateway>) -> Self {
        Self { gateway }
    }

    pub async fn load_balances(&self) -> Result<HashMap<Address, TokenAmount>, GatewayError> {
        let balances = self.gateway.get_all_holder_balances().await?;
        info!(holders = balances.len(), "loaded token balances");
        Ok(balances)
    }
}

/// One `Member` per roster entry, in roster order. Holders outside the
/// roster are ignored and roster entries without a balance get zero.
pub fn join(roster: &[Address], balances: &HashMap<Address, TokenAmount>) -> Vec<Member> {
    roster
        .iter()
        .map(|address| Member {
            address: *address,
            token_amount: balance_of(balances, *address),
        })
        .collect()
}

pub fn balance_of(balances: &HashMap<Address, TokenAmount>, address: Address) -> TokenAmount {
    balances.get(&address).copied().unwrap_or_default()
}
