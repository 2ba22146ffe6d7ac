//! Session state shared between the controller and its front-ends.
//!
//! The state lives in a `watch` channel. Writers replace whole slices inside
//! one `send_if_modified` call so readers never observe a half-applied
//! refresh. Every address change bumps `epoch`; refreshes record the epoch
//! they started under and are discarded if it has moved on.

use std::collections::HashMap;

use dao_wallet::{Address, Signer, UnsupportedChain, WalletStatus};
use tokio::sync::watch;
use tracing::debug;

use crate::amount::TokenAmount;
use crate::composer::ComposerInputs;
use crate::store::ProposalBuckets;
use crate::treasury::Member;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub epoch: u64,
    pub address: Option<Address>,
    pub signer: Option<Signer>,
    pub chain_error: Option<UnsupportedChain>,
    pub has_membership: bool,
    pub is_claiming: bool,
    pub is_voting: bool,
    pub has_voted: bool,
    pub is_proposing: bool,
    pub has_proposed: bool,
    pub roster: Vec<Address>,
    pub balances: HashMap<Address, TokenAmount>,
    pub members: Vec<Member>,
    pub proposals: ProposalBuckets,
    pub composer: ComposerInputs,
}

impl SessionState {
    /// Drop everything that belongs to the previous account.
    fn reset_account_data(&mut self) {
        self.has_membership = false;
        self.has_voted = false;
        self.has_proposed = false;
        self.roster.clear();
        self.balances.clear();
        self.members.clear();
        self.proposals = ProposalBuckets::default();
    }
}

pub struct Session {
    tx: watch::Sender<SessionState>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn epoch(&self) -> u64 {
        self.tx.borrow().epoch
    }

    /// Mirror a wallet status. Returns `true` when the address changed, in
    /// which case the epoch was bumped and account data cleared.
    pub fn apply_wallet(&self, status: &WalletStatus) -> bool {
        let mut address_changed = false;
        self.tx.send_if_modified(|state| {
            let before = state.clone();
            if state.address != status.address {
                state.epoch += 1;
                state.address = status.address;
                state.reset_account_data();
                address_changed = true;
                debug!(epoch = state.epoch, address = ?status.address, "session address changed");
            }
            state.signer = status.signer;
            state.chain_error = status.chain_error;
            *state != before
        });
        address_changed
    }

    /// Apply `f` unconditionally, notifying subscribers if anything changed.
    pub fn update(&self, f: impl FnOnce(&mut SessionState)) {
        self.tx.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        });
    }

    /// Raise the in-flight flag selected by `flag` unless it is already up.
    /// Returns whether this caller raised it.
    pub fn try_begin(&self, flag: impl FnOnce(&mut SessionState) -> &mut bool) -> bool {
        let mut started = false;
        self.tx.send_if_modified(|state| {
            let busy = flag(state);
            if *busy {
                return false;
            }
            *busy = true;
            started = true;
            true
        });
        started
    }

    /// Apply `f` only if no address change happened since `epoch` was read.
    /// Returns whether it was applied.
    pub fn update_if_current(&self, epoch: u64, f: impl FnOnce(&mut SessionState)) -> bool {
        let mut applied = false;
        self.tx.send_if_modified(|state| {
            if state.epoch != epoch {
                debug!(stale = epoch, current = state.epoch, "dropping stale refresh result");
                return false;
            }
            applied = true;
            let before = state.clone();
            f(state);
            *state != before
        });
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::{Proposal, ProposalState};

    fn status(byte: u8) -> WalletStatus {
        let address = Address::from_bytes([byte; 20]);
        WalletStatus {
            address: Some(address),
            signer: Some(Signer::new(address, 4)),
            chain_id: Some(4),
            chain_error: None,
        }
    }

    #[test]
    fn address_change_bumps_epoch_and_clears_proposals() {
        let session = Session::new();
        assert!(session.apply_wallet(&status(0xaa)));
        session.update(|s| {
            s.has_membership = true;
            s.proposals
                .active
                .push(Proposal::new("1", "fund", ProposalState::Active));
        });
        let epoch = session.epoch();

        assert!(!session.apply_wallet(&status(0xaa)));
        assert_eq!(session.epoch(), epoch);

        assert!(session.apply_wallet(&status(0xbb)));
        let snap = session.snapshot();
        assert_eq!(snap.epoch, epoch + 1);
        assert!(snap.proposals.is_empty());
        assert!(!snap.has_membership);
    }

    #[test]
    fn stale_results_are_dropped() {
        let session = Session::new();
        session.apply_wallet(&status(0xaa));
        let started = session.epoch();
        session.apply_wallet(&status(0xbb));

        let applied = update_membership(&session, started);
        assert!(!applied);
        assert!(!session.snapshot().has_membership);

        let applied = update_membership(&session, session.epoch());
        assert!(applied);
        assert!(session.snapshot().has_membership);
    }

    fn update_membership(session: &Session, epoch: u64) -> bool {
        session.update_if_current(epoch, |s| s.has_membership = true)
    }

    #[test]
    fn only_one_caller_begins() {
        let session = Session::new();
        let mut rx = session.subscribe();
        assert!(session.try_begin(|s| &mut s.is_voting));
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        assert!(!session.try_begin(|s| &mut s.is_voting));
        assert!(!rx.has_changed().unwrap());
        assert!(session.try_begin(|s| &mut s.is_proposing));

        session.update(|s| s.is_voting = false);
        assert!(session.try_begin(|s| &mut s.is_voting));
    }

    #[tokio::test]
    async fn subscribers_see_only_real_changes() {
        let session = Session::new();
        let mut rx = session.subscribe();
        session.update(|s| s.is_voting = false);
        assert!(!rx.has_changed().unwrap());
        session.update(|s| s.is_voting = true);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_voting);
    }
}
