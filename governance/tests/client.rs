use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dao_governance::gateway::{ops, ChainCall, GatewayError, MemoryChain, VoteModule};
use dao_governance::view::{self, View};
use dao_governance::{
    abi, ChainGateway, ComposerInputs, DaoClient, DaoError, Proposal, ProposalAction, ProposalId,
    ProposalState, TokenAmount, VoteChoice, VoteError,
};
use dao_wallet::{Address, ConnectorKind, MockProvider, Signer, WalletAdapter};
use tokio::sync::{Notify, Semaphore};

const CHAIN_ID: u64 = 4;

fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

fn me() -> Address {
    addr(0xaa)
}

fn treasury() -> Address {
    addr(3)
}

struct Harness {
    chain: Arc<MemoryChain>,
    provider: Arc<MockProvider>,
    client: DaoClient,
}

fn harness(wallet_chain: u64) -> Harness {
    let chain = Arc::new(MemoryChain::new(addr(1), addr(2), treasury()));
    let provider = Arc::new(MockProvider::new(vec![me()], wallet_chain));
    let wallet = Arc::new(WalletAdapter::new(provider.clone(), CHAIN_ID));
    let gateway = Arc::new(chain.clone().gateway("rinkeby"));
    let client = DaoClient::new(wallet, gateway, None);
    Harness {
        chain,
        provider,
        client,
    }
}

/// A connected member holding `tokens` governance tokens.
fn member(tokens: u64) -> Harness {
    let h = harness(CHAIN_ID);
    h.chain.grant_membership(me());
    h.chain.set_token_balance(me(), TokenAmount::from_tokens(tokens));
    h
}

fn active(id: &str) -> Proposal {
    Proposal::new(id, format!("proposal {id}"), ProposalState::Active)
}

fn bucket_ids(bucket: &[Proposal]) -> Vec<&str> {
    bucket.iter().map(|p| p.id.as_str()).collect()
}

#[tokio::test]
async fn minting_turns_a_visitor_into_a_member() {
    let h = harness(CHAIN_ID);
    assert_eq!(h.client.view(), View::Landing);

    h.client.connect(ConnectorKind::Injected).await;
    assert!(matches!(h.client.view(), View::Mint { claiming: false, .. }));

    h.client.mint().await.unwrap();

    assert_eq!(
        h.chain.calls(),
        vec![ChainCall::Claim {
            from: me(),
            token_id: 0,
            quantity: 1
        }]
    );
    let snap = h.client.snapshot();
    assert!(snap.has_membership);
    assert!(!snap.is_claiming);
    assert_eq!(snap.roster, vec![me()]);
    let View::Member(page) = h.client.view() else {
        panic!("expected member page");
    };
    assert_eq!(page.members.len(), 1);
    assert_eq!(page.members[0].token_amount, "0.0");
}

#[tokio::test]
async fn failed_mint_keeps_the_mint_page() {
    let h = harness(CHAIN_ID);
    h.client.connect(ConnectorKind::Injected).await;
    h.chain.reject(ops::DROP_CLAIM);

    let err = h.client.mint().await.unwrap_err();
    assert!(matches!(
        err,
        DaoError::Gateway(GatewayError::UserRejected { op: ops::DROP_CLAIM })
    ));
    assert!(matches!(h.client.view(), View::Mint { claiming: false, .. }));
}

#[tokio::test]
async fn members_join_roster_and_balances() {
    let h = member(10);
    h.chain.add_claimer(0, addr(0xbb));
    h.chain.set_token_balance(addr(0xcc), TokenAmount::from_tokens(3));
    h.client.connect(ConnectorKind::Injected).await;

    let snap = h.client.snapshot();
    let members: Vec<(Address, TokenAmount)> =
        snap.members.iter().map(|m| (m.address, m.token_amount)).collect();
    assert_eq!(
        members,
        vec![(me(), TokenAmount::from_tokens(10)), (addr(0xbb), TokenAmount::ZERO)]
    );
}

#[tokio::test]
async fn vote_batch_delegates_casts_and_executes() {
    let h = member(10);
    h.chain.insert_proposal(active("1"));
    h.chain.insert_proposal(active("2"));
    h.chain.transition_after_vote(&ProposalId::new("1"), ProposalState::Succeeded);
    h.client.connect(ConnectorKind::Injected).await;
    assert_eq!(bucket_ids(&h.client.snapshot().proposals.active), vec!["1", "2"]);

    let choices = HashMap::from([(ProposalId::new("1"), VoteChoice::For)]);
    let report = h.client.submit_votes(&choices).await.unwrap();

    assert!(report.delegated);
    assert_eq!(report.cast, vec![ProposalId::new("1"), ProposalId::new("2")]);
    assert_eq!(report.executed, vec![ProposalId::new("1")]);

    let calls = h.chain.calls();
    assert_eq!(
        calls[0],
        ChainCall::DelegateTo {
            from: me(),
            delegatee: me()
        }
    );
    assert!(calls.contains(&ChainCall::Vote {
        from: me(),
        id: ProposalId::new("1"),
        choice: VoteChoice::For
    }));
    assert!(calls.contains(&ChainCall::Vote {
        from: me(),
        id: ProposalId::new("2"),
        choice: VoteChoice::Abstain
    }));
    assert_eq!(
        calls.last(),
        Some(&ChainCall::Execute {
            from: me(),
            id: ProposalId::new("1")
        })
    );

    let snap = h.client.snapshot();
    assert!(snap.has_voted);
    assert!(!snap.is_voting);
    assert!(snap.proposals.active.is_empty());
    assert_eq!(bucket_ids(&snap.proposals.voted), vec!["2"]);
    assert_eq!(bucket_ids(&snap.proposals.executed), vec!["1"]);
    assert_eq!(
        view::tally_whole_tokens(&snap.proposals.executed[0], VoteChoice::For).as_u64(),
        10
    );
}

#[tokio::test]
async fn existing_delegation_is_not_repeated() {
    let h = member(10);
    h.chain.set_delegation(me(), addr(0xdd));
    h.chain.insert_proposal(active("1"));
    h.client.connect(ConnectorKind::Injected).await;

    let report = h.client.submit_votes(&HashMap::new()).await.unwrap();

    assert!(!report.delegated);
    assert_eq!(
        h.chain.calls(),
        vec![ChainCall::Vote {
            from: me(),
            id: ProposalId::new("1"),
            choice: VoteChoice::Abstain
        }]
    );
}

#[tokio::test]
async fn empty_batch_only_delegates() {
    let h = member(10);
    h.client.connect(ConnectorKind::Injected).await;

    let report = h.client.submit_votes(&HashMap::new()).await.unwrap();

    assert!(report.cast.is_empty() && report.executed.is_empty());
    assert_eq!(
        h.chain.calls(),
        vec![ChainCall::DelegateTo {
            from: me(),
            delegatee: me()
        }]
    );
}

#[tokio::test]
async fn proposals_that_closed_meanwhile_are_skipped() {
    let h = member(10);
    h.chain.set_delegation(me(), me());
    h.chain.insert_proposal(active("1"));
    h.chain.insert_proposal(active("2"));
    h.client.connect(ConnectorKind::Injected).await;

    h.chain.set_proposal_state(&ProposalId::new("1"), ProposalState::Defeated);
    let report = h.client.submit_votes(&HashMap::new()).await.unwrap();

    assert_eq!(report.skipped, vec![ProposalId::new("1")]);
    assert_eq!(report.cast, vec![ProposalId::new("2")]);
    assert_eq!(
        h.chain.calls(),
        vec![ChainCall::Vote {
            from: me(),
            id: ProposalId::new("2"),
            choice: VoteChoice::Abstain
        }]
    );
    let snap = h.client.snapshot();
    assert_eq!(bucket_ids(&snap.proposals.defeated), vec!["1"]);
    assert_eq!(bucket_ids(&snap.proposals.voted), vec!["2"]);
}

#[tokio::test]
async fn failed_cast_fails_the_batch_and_keeps_buckets() {
    let h = member(10);
    h.chain.set_delegation(me(), me());
    h.chain.insert_proposal(active("1"));
    h.client.connect(ConnectorKind::Injected).await;
    h.chain.fail(ops::VOTE_VOTE);

    let err = h.client.submit_votes(&HashMap::new()).await.unwrap_err();

    let DaoError::Vote(VoteError::Cast(failures)) = &err else {
        panic!("expected cast failure, got {err:?}");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].proposal, ProposalId::new("1"));
    let snap = h.client.snapshot();
    assert!(!snap.is_voting);
    assert!(!snap.has_voted);
    assert_eq!(bucket_ids(&snap.proposals.active), vec!["1"]);
}

#[tokio::test]
async fn failed_delegation_stops_before_voting() {
    let h = member(10);
    h.chain.insert_proposal(active("1"));
    h.client.connect(ConnectorKind::Injected).await;
    h.chain.reject(ops::TOKEN_DELEGATE_TO);

    let err = h.client.submit_votes(&HashMap::new()).await.unwrap_err();

    assert!(matches!(err, DaoError::Vote(VoteError::Delegation(_))));
    assert!(h.chain.calls().is_empty());
}

#[tokio::test]
async fn proposing_a_transfer_creates_an_active_proposal() {
    let h = member(10);
    h.chain.set_token_balance(treasury(), TokenAmount::from_tokens(1_000));
    h.client.connect(ConnectorKind::Injected).await;
    let View::Member(page) = h.client.view() else {
        panic!("expected member page");
    };
    assert_eq!(page.composer.map(|c| c.button), Some(view::PROPOSE_LABEL));

    h.client.set_composer_inputs(ComposerInputs {
        amount: "100".into(),
        to_address: "0x00000000000000000000000000000000000000bb".into(),
        reason: "for the garden".into(),
    });
    let draft = h.client.propose().await.unwrap();

    let description = "Should the DAO transfer 100 tokens from the treasury to \
                       0x00000000000000000000000000000000000000bb for the garden";
    assert_eq!(draft.description, description);
    let calls = h.chain.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], ChainCall::DelegateTo { .. }));
    let ChainCall::Propose {
        from,
        description: sent,
        actions,
    } = &calls[1]
    else {
        panic!("expected propose call, got {:?}", calls[1]);
    };
    assert_eq!(*from, me());
    assert_eq!(sent, description);
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].to_address, addr(2));
    assert!(actions[0].native_token_value.is_zero());
    assert_eq!(
        abi::decode_transfer(&actions[0].transaction_data),
        Some((addr(0xbb), TokenAmount::from_tokens(100)))
    );

    let snap = h.client.snapshot();
    assert!(snap.has_proposed);
    assert_eq!(snap.proposals.active.len(), 1);
    let View::Member(page) = h.client.view() else {
        panic!("expected member page");
    };
    assert_eq!(page.composer.map(|c| c.button), Some(view::PROPOSED_LABEL));
}

#[tokio::test]
async fn invalid_composer_amount_sends_nothing() {
    let h = member(10);
    h.client.connect(ConnectorKind::Injected).await;
    h.client.set_composer_inputs(ComposerInputs {
        amount: "1.".into(),
        to_address: "0x00000000000000000000000000000000000000bb".into(),
        reason: String::new(),
    });

    assert!(matches!(h.client.propose().await, Err(DaoError::Compose(_))));
    assert!(h.chain.calls().is_empty());
    assert!(!h.client.snapshot().is_proposing);
}

#[tokio::test]
async fn wrong_chain_shows_mismatch_until_switched() {
    let h = member(10);
    h.provider.set_chain_id(1);
    h.client.connect(ConnectorKind::Injected).await;

    assert_eq!(
        h.client.view(),
        View::ChainMismatch {
            expected: CHAIN_ID,
            actual: 1
        }
    );
    assert!(h.client.gateway().signer().is_none());
    let err = h.client.mint().await.unwrap_err();
    assert!(matches!(
        err,
        DaoError::Gateway(GatewayError::WalletUnavailable { .. })
    ));

    h.client.wallet().chain_changed(CHAIN_ID);
    h.client.sync_wallet().await;

    assert!(matches!(h.client.view(), View::Member(_)));
    assert_eq!(h.client.gateway().signer().map(|s| s.address()), Some(me()));
}

#[tokio::test]
async fn switching_accounts_drops_previous_proposals() {
    let h = member(10);
    h.chain.insert_proposal(active("1"));
    h.client.connect(ConnectorKind::Injected).await;
    assert_eq!(h.client.snapshot().proposals.active.len(), 1);
    let epoch = h.client.snapshot().epoch;

    h.client.wallet().accounts_changed(&[addr(0xbb)]);
    h.client.sync_wallet().await;

    let snap = h.client.snapshot();
    assert_eq!(snap.epoch, epoch + 1);
    assert_eq!(snap.address, Some(addr(0xbb)));
    assert!(!snap.has_membership);
    assert!(snap.proposals.is_empty());
    assert!(matches!(h.client.view(), View::Mint { .. }));

    h.client.wallet().accounts_changed(&[]);
    h.client.sync_wallet().await;
    assert_eq!(h.client.view(), View::Landing);
}

#[tokio::test]
async fn rejected_connection_leaves_landing() {
    let h = harness(CHAIN_ID);
    h.provider.set_reject(true);
    h.client.connect(ConnectorKind::Injected).await;
    assert_eq!(h.client.view(), View::Landing);
    assert!(h.chain.calls().is_empty());
}

#[tokio::test]
async fn watcher_follows_wallet_events() {
    let h = member(10);
    let client = Arc::new(h.client);
    let watcher = client.watch_wallet();

    client.wallet().connect(ConnectorKind::Injected).await;
    let mut rx = client.session().subscribe();
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !rx.borrow_and_update().has_membership {
            rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    assert_eq!(client.snapshot().address, Some(me()));
    watcher.abort();
}

fn member_amounts(client: &DaoClient) -> Vec<(Address, TokenAmount)> {
    client
        .snapshot()
        .members
        .iter()
        .map(|m| (m.address, m.token_amount))
        .collect()
}

#[tokio::test]
async fn failed_listing_keeps_previous_buckets() {
    let h = member(10);
    h.chain.insert_proposal(active("1"));
    h.client.connect(ConnectorKind::Injected).await;

    h.chain.insert_proposal(active("2"));
    h.chain.fail(ops::VOTE_GET_ALL);
    let err = h.client.refresh_proposals().await.unwrap_err();

    assert!(matches!(
        err,
        DaoError::Gateway(GatewayError::Read { op: ops::VOTE_GET_ALL, .. })
    ));
    assert_eq!(bucket_ids(&h.client.snapshot().proposals.active), vec!["1"]);

    h.chain.heal();
    h.client.refresh_proposals().await.unwrap();
    assert_eq!(bucket_ids(&h.client.snapshot().proposals.active), vec!["1", "2"]);
}

#[tokio::test]
async fn failed_member_reads_keep_their_half() {
    let h = member(10);
    h.chain.add_claimer(0, addr(0xbb));
    h.client.connect(ConnectorKind::Injected).await;
    assert_eq!(
        member_amounts(&h.client),
        vec![(me(), TokenAmount::from_tokens(10)), (addr(0xbb), TokenAmount::ZERO)]
    );

    h.chain.add_claimer(0, addr(0xcc));
    h.chain.set_token_balance(me(), TokenAmount::from_tokens(20));
    h.chain.fail(ops::DROP_CLAIMERS);
    h.client.refresh_members().await;
    assert_eq!(
        member_amounts(&h.client),
        vec![(me(), TokenAmount::from_tokens(20)), (addr(0xbb), TokenAmount::ZERO)]
    );

    h.chain.heal();
    h.chain.set_token_balance(me(), TokenAmount::from_tokens(30));
    h.chain.fail(ops::TOKEN_HOLDER_BALANCES);
    h.client.refresh_members().await;
    assert_eq!(
        member_amounts(&h.client),
        vec![
            (me(), TokenAmount::from_tokens(20)),
            (addr(0xbb), TokenAmount::ZERO),
            (addr(0xcc), TokenAmount::ZERO)
        ]
    );
}

/// Vote module whose `get` parks until the test opens the gate.
struct GatedVotes {
    inner: Arc<MemoryChain>,
    entered: Notify,
    gate: Semaphore,
}

impl GatedVotes {
    fn open(&self) {
        self.gate.add_permits(64);
    }
}

#[async_trait]
impl VoteModule for GatedVotes {
    fn address(&self) -> Address {
        VoteModule::address(self.inner.as_ref())
    }

    async fn get_all(&self) -> Result<Vec<Proposal>, GatewayError> {
        self.inner.get_all().await
    }

    async fn get(&self, id: &ProposalId) -> Result<Proposal, GatewayError> {
        self.entered.notify_one();
        let _permit = self.gate.acquire().await.unwrap();
        self.inner.get(id).await
    }

    async fn has_voted(&self, id: &ProposalId, voter: Address) -> Result<bool, GatewayError> {
        self.inner.has_voted(id, voter).await
    }

    async fn vote(
        &self,
        signer: &Signer,
        id: &ProposalId,
        choice: VoteChoice,
    ) -> Result<(), GatewayError> {
        self.inner.vote(signer, id, choice).await
    }

    async fn execute(&self, signer: &Signer, id: &ProposalId) -> Result<(), GatewayError> {
        self.inner.execute(signer, id).await
    }

    async fn propose(
        &self,
        signer: &Signer,
        description: &str,
        actions: &[ProposalAction],
    ) -> Result<(), GatewayError> {
        self.inner.propose(signer, description, actions).await
    }
}

struct GatedHarness {
    chain: Arc<MemoryChain>,
    votes: Arc<GatedVotes>,
    client: Arc<DaoClient>,
}

/// A connected, delegated member with one active proposal whose vote batch
/// stalls on the first proposal read.
async fn gated_member() -> GatedHarness {
    let chain = Arc::new(MemoryChain::new(addr(1), addr(2), treasury()));
    chain.grant_membership(me());
    chain.set_token_balance(me(), TokenAmount::from_tokens(10));
    chain.set_delegation(me(), me());
    chain.insert_proposal(active("1"));
    let votes = Arc::new(GatedVotes {
        inner: chain.clone(),
        entered: Notify::new(),
        gate: Semaphore::new(0),
    });
    let gateway = ChainGateway::new("rinkeby", chain.clone(), chain.clone(), votes.clone());
    let provider = Arc::new(MockProvider::new(vec![me()], CHAIN_ID));
    let wallet = Arc::new(WalletAdapter::new(provider, CHAIN_ID));
    let client = Arc::new(DaoClient::new(wallet, Arc::new(gateway), None));
    client.connect(ConnectorKind::Injected).await;
    assert_eq!(bucket_ids(&client.snapshot().proposals.active), vec!["1"]);
    GatedHarness {
        chain,
        votes,
        client,
    }
}

fn spawn_votes(client: &Arc<DaoClient>) -> tokio::task::JoinHandle<Result<(), DaoError>> {
    let client = client.clone();
    tokio::spawn(async move {
        let choices = HashMap::new();
        client.submit_votes(&choices).await.map(|_| ())
    })
}

#[tokio::test]
async fn account_switch_mid_batch_sends_nothing_from_the_new_account() {
    let h = gated_member().await;
    let batch = spawn_votes(&h.client);
    h.votes.entered.notified().await;

    h.client.wallet().accounts_changed(&[addr(0xbb)]);
    h.client.sync_wallet().await;
    assert_eq!(
        h.client.gateway().signer().map(|s| s.address()),
        Some(addr(0xbb))
    );
    h.votes.open();

    let err = batch.await.unwrap().unwrap_err();
    let DaoError::Vote(VoteError::Cast(failures)) = &err else {
        panic!("expected cast failure, got {err:?}");
    };
    assert_eq!(
        failures[0].error,
        GatewayError::WalletUnavailable { op: ops::VOTE_VOTE }
    );
    assert!(h.chain.calls().is_empty());
    let snap = h.client.snapshot();
    assert_eq!(snap.address, Some(addr(0xbb)));
    assert!(!snap.is_voting);
    assert!(!snap.has_voted);
}

#[tokio::test]
async fn second_vote_batch_is_refused_while_one_runs() {
    let h = gated_member().await;
    let batch = spawn_votes(&h.client);
    h.votes.entered.notified().await;
    assert!(h.client.snapshot().is_voting);

    let err = h.client.submit_votes(&HashMap::new()).await.unwrap_err();
    assert!(matches!(err, DaoError::Busy));

    h.votes.open();
    batch.await.unwrap().unwrap();
    assert_eq!(
        h.chain.calls(),
        vec![ChainCall::Vote {
            from: me(),
            id: ProposalId::new("1"),
            choice: VoteChoice::Abstain
        }]
    );
    assert!(!h.client.snapshot().is_voting);
}

#[tokio::test]
async fn mint_is_refused_while_a_claim_is_pending() {
    let h = harness(CHAIN_ID);
    h.client.connect(ConnectorKind::Injected).await;
    assert!(h.client.session().try_begin(|s| &mut s.is_claiming));

    assert!(matches!(h.client.mint().await, Err(DaoError::Busy)));
    assert!(h.chain.calls().is_empty());

    h.client.session().update(|s| s.is_claiming = false);
    h.client.mint().await.unwrap();
    assert!(h.client.snapshot().has_membership);
}
