use std::sync::Arc;

use dao_wallet::{
    Address, ConnectorKind, MockProvider, Signer, UnsupportedChain, WalletAdapter, WalletStatus,
};

const RINKEBY: u64 = 4;

fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

fn adapter_with(provider: Arc<MockProvider>) -> WalletAdapter {
    WalletAdapter::new(provider, RINKEBY)
}

#[tokio::test]
async fn connect_publishes_address_and_signer() {
    let provider = Arc::new(MockProvider::new(vec![addr(0xaa)], RINKEBY));
    let adapter = adapter_with(provider);
    let mut rx = adapter.subscribe();

    adapter.connect(ConnectorKind::Injected).await;

    assert!(rx.has_changed().unwrap());
    let status = rx.borrow_and_update().clone();
    assert_eq!(status.address, Some(addr(0xaa)));
    assert_eq!(status.signer, Some(Signer::new(addr(0xaa), RINKEBY)));
    assert_eq!(status.chain_error, None);
}

#[tokio::test]
async fn chain_mismatch_sets_error_without_signer() {
    let provider = Arc::new(MockProvider::new(vec![addr(0xaa)], 1));
    let adapter = adapter_with(provider);

    adapter.connect(ConnectorKind::Injected).await;

    let status = adapter.current();
    assert_eq!(
        status.chain_error,
        Some(UnsupportedChain {
            expected: RINKEBY,
            actual: 1
        })
    );
    assert_eq!(status.signer, None);

    adapter.chain_changed(RINKEBY);
    let status = adapter.current();
    assert_eq!(status.chain_error, None);
    assert_eq!(status.signer, Some(Signer::new(addr(0xaa), RINKEBY)));
}

#[tokio::test]
async fn rejection_leaves_status_untouched() {
    let provider = Arc::new(MockProvider::new(vec![addr(0xaa)], RINKEBY));
    provider.set_reject(true);
    let adapter = adapter_with(provider.clone());
    let rx = adapter.subscribe();

    adapter.connect(ConnectorKind::Injected).await;

    assert!(!rx.has_changed().unwrap());
    assert_eq!(adapter.current().address, None);

    provider.set_reject(false);
    adapter.connect(ConnectorKind::Injected).await;
    assert_eq!(adapter.current().address, Some(addr(0xaa)));
}

#[tokio::test]
async fn missing_provider_is_logged_not_raised() {
    let provider = Arc::new(MockProvider::new(vec![addr(0xaa)], RINKEBY));
    provider.set_unavailable(true);
    let adapter = adapter_with(provider);
    adapter.connect(ConnectorKind::Injected).await;
    assert_eq!(adapter.current().address, None);
}

#[tokio::test]
async fn account_switch_and_disconnect() {
    let provider = Arc::new(MockProvider::new(vec![addr(0xaa)], RINKEBY));
    let adapter = adapter_with(provider);
    adapter.connect(ConnectorKind::Injected).await;

    adapter.accounts_changed(&[addr(0xbb)]);
    assert_eq!(adapter.current().signer, Some(Signer::new(addr(0xbb), RINKEBY)));

    adapter.accounts_changed(&[]);
    assert_eq!(adapter.current(), WalletStatus::default());
}

#[tokio::test]
async fn identical_reconnect_does_not_notify() {
    let provider = Arc::new(MockProvider::new(vec![addr(0xaa)], RINKEBY));
    let adapter = adapter_with(provider);
    adapter.connect(ConnectorKind::Injected).await;
    let mut rx = adapter.subscribe();
    let _ = rx.borrow_and_update();

    adapter.connect(ConnectorKind::Injected).await;
    assert!(!rx.has_changed().unwrap());
}
