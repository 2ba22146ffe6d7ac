//! Wires the wallet, the gateway and the services into one session.
//!
//! `DaoClient` owns the [`Session`] and is the only writer to it. Every
//! refresh captures the session epoch before going to the chain and commits
//! its result through [`Session::update_if_current`], so a result computed
//! for a previous account never lands in the current one.

use std::collections::HashMap;
use std::sync::Arc;

use dao_wallet::{Address, ConnectorKind, HttpProvider, InjectedProvider, WalletAdapter};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::composer::{ComposerInputs, Draft, ProposalComposer};
use crate::config::DaoConfig;
use crate::gateway::{ChainGateway, RpcChain};
use crate::membership::MembershipService;
use crate::orchestrator::{VoteOrchestrator, VoteReport};
use crate::proposal::{Ballot, ProposalId, VoteChoice};
use crate::state::{Session, SessionState};
use crate::store::ProposalStore;
use crate::treasury::{self, TreasuryService};
use crate::view::{self, View};
use crate::DaoError;

pub struct DaoClient {
    wallet: Arc<WalletAdapter>,
    gateway: Arc<ChainGateway>,
    membership: MembershipService,
    treasury: TreasuryService,
    store: ProposalStore,
    orchestrator: VoteOrchestrator,
    composer: ProposalComposer,
    session: Session,
}

impl DaoClient {
    pub fn new(
        wallet: Arc<WalletAdapter>,
        gateway: Arc<ChainGateway>,
        marketplace_url: Option<String>,
    ) -> Self {
        Self {
            membership: MembershipService::new(gateway.clone(), marketplace_url),
            treasury: TreasuryService::new(gateway.clone()),
            store: ProposalStore::new(gateway.clone()),
            orchestrator: VoteOrchestrator::new(gateway.clone()),
            composer: ProposalComposer::new(gateway.clone()),
            session: Session::new(),
            wallet,
            gateway,
        }
    }

    /// A client talking to the configured wallet endpoint and relay.
    pub fn from_config(config: &DaoConfig) -> Result<Self, DaoError> {
        let chain_id = config.resolved_chain_id()?;
        let contracts = config.contracts()?;
        let provider: Arc<dyn InjectedProvider> =
            Arc::new(HttpProvider::new(config.wallet_url.clone()));
        let wallet = Arc::new(WalletAdapter::new(provider, chain_id));
        let relay = Arc::new(RpcChain::new(
            config.rpc_url.clone(),
            contracts.drop,
            contracts.token,
            contracts.vote,
        ));
        let gateway = Arc::new(relay.gateway(config.network.clone()));
        Ok(Self::new(wallet, gateway, config.marketplace_url.clone()))
    }

    pub fn wallet(&self) -> &WalletAdapter {
        &self.wallet
    }

    pub fn gateway(&self) -> &ChainGateway {
        &self.gateway
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn snapshot(&self) -> SessionState {
        self.session.snapshot()
    }

    pub fn view(&self) -> View {
        view::render(&self.session.snapshot())
    }

    pub async fn connect(&self, kind: ConnectorKind) {
        self.wallet.connect(kind).await;
        self.sync_wallet().await;
    }

    /// Mirror the wallet into the gateway signer and the session, then
    /// reload account data if the address changed.
    pub async fn sync_wallet(&self) {
        let status = self.wallet.current();
        self.gateway.set_signer(status.signer);
        if self.session.apply_wallet(&status) && status.address.is_some() {
            self.refresh_membership().await;
        }
    }

    /// Follow wallet events until the adapter is dropped.
    pub fn watch_wallet(self: &Arc<Self>) -> JoinHandle<()> {
        let client = Arc::clone(self);
        let mut rx = self.wallet.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                client.sync_wallet().await;
            }
        })
    }

    pub async fn refresh_membership(&self) {
        let epoch = self.session.epoch();
        let Some(address) = self.session.snapshot().address else {
            return;
        };
        let is_member = self.membership.refresh(address).await;
        let applied = self
            .session
            .update_if_current(epoch, |s| s.has_membership = is_member);
        if applied && is_member {
            self.refresh_members().await;
            if let Err(err) = self.refresh_proposals().await {
                warn!(error = %err, "failed to load proposals");
            }
        }
    }

    /// Reload roster and balances. Each half keeps its previous value when
    /// its read fails.
    pub async fn refresh_members(&self) {
        let epoch = self.session.epoch();
        let roster = self.membership.load_roster().await;
        let balances = self.treasury.load_balances().await;
        self.session.update_if_current(epoch, |s| {
            match roster {
                Ok(roster) => s.roster = roster,
                Err(err) => warn!(error = %err, "failed to load member roster"),
            }
            match balances {
                Ok(balances) => s.balances = balances,
                Err(err) => warn!(error = %err, "failed to load token balances"),
            }
            s.members = treasury::join(&s.roster, &s.balances);
        });
    }

    pub async fn refresh_proposals(&self) -> Result<(), DaoError> {
        let epoch = self.session.epoch();
        let address = self.require_address()?;
        let buckets = self.store.refresh(address).await?;
        self.session.update_if_current(epoch, |s| s.proposals = buckets);
        Ok(())
    }

    pub async fn mint(&self) -> Result<(), DaoError> {
        let address = self.require_address()?;
        if !self.session.try_begin(|s| &mut s.is_claiming) {
            return Err(DaoError::Busy);
        }
        let epoch = self.session.epoch();
        let result = self.membership.claim(address).await;
        self.session.update(|s| s.is_claiming = false);
        if let Err(err) = result {
            warn!(%address, error = %err, "failed to claim membership");
            return Err(err.into());
        }
        if self.session.update_if_current(epoch, |s| s.has_membership = true) {
            self.refresh_members().await;
            if let Err(err) = self.refresh_proposals().await {
                warn!(error = %err, "failed to load proposals");
            }
        }
        Ok(())
    }

    /// Vote on every active proposal. Proposals missing from `choices` are
    /// submitted as abstentions.
    pub async fn submit_votes(
        &self,
        choices: &HashMap<ProposalId, VoteChoice>,
    ) -> Result<VoteReport, DaoError> {
        let address = self.require_address()?;
        if !self.session.try_begin(|s| &mut s.is_voting) {
            return Err(DaoError::Busy);
        }
        self.session.update(|s| s.has_voted = false);
        let snapshot = self.session.snapshot();
        let ballots: Vec<Ballot> = snapshot
            .proposals
            .active
            .iter()
            .map(|p| {
                let choice = choices.get(&p.id).copied().unwrap_or_default();
                Ballot::new(p.id.clone(), choice)
            })
            .collect();
        let epoch = snapshot.epoch;
        let result = self.orchestrator.submit(address, ballots).await;
        self.session.update(|s| s.is_voting = false);
        match result {
            Ok(report) => {
                info!(trace_id = %report.trace_id, "successfully voted");
                if self.session.update_if_current(epoch, |s| s.has_voted = true) {
                    if let Err(err) = self.refresh_proposals().await {
                        warn!(error = %err, "failed to reload proposals after voting");
                    }
                }
                Ok(report)
            }
            Err(err) => {
                warn!(%address, error = %err, "vote batch failed");
                Err(err.into())
            }
        }
    }

    pub fn set_composer_inputs(&self, inputs: ComposerInputs) {
        self.session.update(|s| s.composer = inputs);
    }

    /// Submit the transfer proposal described by the current composer inputs.
    pub async fn propose(&self) -> Result<Draft, DaoError> {
        let address = self.require_address()?;
        if !self.session.try_begin(|s| &mut s.is_proposing) {
            return Err(DaoError::Busy);
        }
        self.session.update(|s| s.has_proposed = false);
        let snapshot = self.session.snapshot();
        let epoch = snapshot.epoch;
        let result = self.composer.propose(address, &snapshot.composer).await;
        self.session.update(|s| s.is_proposing = false);
        match result {
            Ok(draft) => {
                if self.session.update_if_current(epoch, |s| s.has_proposed = true) {
                    if let Err(err) = self.refresh_proposals().await {
                        warn!(error = %err, "failed to reload proposals after proposing");
                    }
                }
                Ok(draft)
            }
            Err(err) => {
                warn!(%address, error = %err, "failed to create proposal");
                Err(err.into())
            }
        }
    }

    fn require_address(&self) -> Result<Address, DaoError> {
        self.session.snapshot().address.ok_or(DaoError::NotConnected)
    }
}
