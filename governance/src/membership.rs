use std::sync::Arc;

use dao_wallet::Address;
use tracing::{info, warn};

use crate::gateway::{ChainGateway, GatewayError, TokenId};

/// Token id of the membership credential within the drop.
pub const MEMBERSHIP_TOKEN_ID: TokenId = 0;

pub struct MembershipService {
    gateway: Arc<ChainGateway>,
    marketplace_url: Option<String>,
}

impl MembershipService {
    pub fn new(gateway: Arc<ChainGateway>, marketplace_url: Option<String>) -> Self {
        Self {
            gateway,
            marketplace_url,
        }
    }

    /// Whether `address` holds at least one membership token. Read failures
    /// are logged and count as "not a member".
    pub async fn refresh(&self, address: Address) -> bool {
        match self.gateway.drop_balance_of(address, MEMBERSHIP_TOKEN_ID).await {
            Ok(balance) => {
                let member = !balance.is_zero();
                if member {
                    info!(%address, "membership token present");
                } else {
                    info!(%address, "no membership token");
                }
                member
            }
            Err(err) => {
                warn!(%address, error = %err, "membership check failed");
                false
            }
        }
    }

    pub async fn load_roster(&self) -> Result<Vec<Address>, GatewayError> {
        let roster = self
            .gateway
            .get_all_claimer_addresses(MEMBERSHIP_TOKEN_ID)
            .await?;
        info!(members = roster.len(), "loaded membership roster");
        Ok(roster)
    }

    /// Mint one membership token to `address`.
    pub async fn claim(&self, address: Address) -> Result<(), GatewayError> {
        self.gateway.claim(address, MEMBERSHIP_TOKEN_ID, 1).await?;
        let network = self.gateway.network();
        match &self.marketplace_url {
            Some(base) => {
                let link = format!(
                    "{}/{}/{}",
                    base.trim_end_matches('/'),
                    self.gateway.drop_address(),
                    MEMBERSHIP_TOKEN_ID
                );
                info!(network, %link, "membership minted");
            }
            None => info!(network, "membership minted"),
        }
        Ok(())
    }
}
