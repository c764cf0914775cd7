//! Wallet provider abstraction.
//!
//! The session depends only on this narrow contract: request accounts, read
//! the current chain id, and subscribe to account/chain change events.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Buffer size for provider event channels.
pub const EVENT_BUFFER: usize = 64;

/// Notification pushed by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// New account list, primary account first. Empty means locked.
    AccountsChanged(Vec<String>),
    /// Chain id as the provider reports it, e.g. `"0x89"`.
    ChainChanged(String),
}

/// An external wallet.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Whether a wallet is installed at all.
    fn is_available(&self) -> bool;

    /// Prompt the user and return the authorized accounts.
    async fn request_accounts(&self) -> Result<Vec<String>>;

    /// The chain id the wallet is currently on.
    async fn chain_id(&self) -> Result<String>;

    /// Open a new event subscription.
    fn subscribe(&self) -> mpsc::Receiver<ProviderEvent>;
}

/// An in-memory wallet for testing.
///
/// Accounts, chain and failure modes are set directly; events are pushed to
/// every open subscription.
pub mod memory {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::error::SessionError;

    #[derive(Debug, Clone)]
    struct WalletState {
        available: bool,
        accounts: Vec<String>,
        chain_id: String,
        failure: Option<SessionError>,
        delay: Option<Duration>,
    }

    /// In-memory wallet implementation.
    pub struct MemoryWallet {
        state: Mutex<WalletState>,
        subscribers: Mutex<Vec<mpsc::Sender<ProviderEvent>>>,
    }

    impl MemoryWallet {
        /// A wallet holding `accounts` on `chain_id`.
        pub fn new<I, S>(accounts: I, chain_id: u64) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                state: Mutex::new(WalletState {
                    available: true,
                    accounts: accounts.into_iter().map(Into::into).collect(),
                    chain_id: format!("{chain_id:#x}"),
                    failure: None,
                    delay: None,
                }),
                subscribers: Mutex::new(Vec::new()),
            }
        }

        /// A wallet that is not installed.
        pub fn unavailable() -> Self {
            let wallet = Self::new(Vec::<String>::new(), 1);
            wallet.set_available(false);
            wallet
        }

        /// Install or uninstall the wallet.
        pub fn set_available(&self, available: bool) {
            self.with_state(|s| s.available = available);
        }

        fn with_state<R>(&self, f: impl FnOnce(&mut WalletState) -> R) -> R {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut state)
        }

        pub fn set_accounts<I, S>(&self, accounts: I)
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            let accounts = accounts.into_iter().map(Into::into).collect();
            self.with_state(|s| s.accounts = accounts);
        }

        /// Set the raw chain id string returned by `chain_id`.
        pub fn set_raw_chain_id(&self, raw: impl Into<String>) {
            let raw = raw.into();
            self.with_state(|s| s.chain_id = raw);
        }

        /// Make `request_accounts` fail with `error` until cleared.
        pub fn fail_with(&self, error: Option<SessionError>) {
            self.with_state(|s| s.failure = error);
        }

        /// Delay every `request_accounts` answer.
        pub fn set_delay(&self, delay: Option<Duration>) {
            self.with_state(|s| s.delay = delay);
        }

        /// Push an event to every live subscription.
        pub async fn emit(&self, event: ProviderEvent) {
            let senders: Vec<_> = {
                let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
                subs.retain(|tx| !tx.is_closed());
                subs.clone()
            };
            for tx in senders {
                // Ignore errors (subscriber may have gone away)
                let _ = tx.send(event.clone()).await;
            }
        }

        /// Switch accounts and notify subscribers.
        pub async fn switch_accounts<I, S>(&self, accounts: I)
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            let accounts: Vec<String> = accounts.into_iter().map(Into::into).collect();
            self.set_accounts(accounts.clone());
            self.emit(ProviderEvent::AccountsChanged(accounts)).await;
        }

        /// Switch chain and notify subscribers.
        pub async fn switch_chain(&self, chain_id: u64) {
            let raw = format!("{chain_id:#x}");
            self.set_raw_chain_id(raw.clone());
            self.emit(ProviderEvent::ChainChanged(raw)).await;
        }
    }

    #[async_trait]
    impl WalletProvider for MemoryWallet {
        fn is_available(&self) -> bool {
            self.with_state(|s| s.available)
        }

        async fn request_accounts(&self) -> Result<Vec<String>> {
            if let Some(delay) = self.with_state(|s| s.delay) {
                tokio::time::sleep(delay).await;
            }
            self.with_state(|s| match &s.failure {
                Some(err) => Err(err.clone()),
                None => Ok(s.accounts.clone()),
            })
        }

        async fn chain_id(&self) -> Result<String> {
            Ok(self.with_state(|s| s.chain_id.clone()))
        }

        fn subscribe(&self) -> mpsc::Receiver<ProviderEvent> {
            let (tx, rx) = mpsc::channel(EVENT_BUFFER);
            self.subscribers
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(tx);
            rx
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryWallet;
    use super::*;
    use crate::error::SessionError;

    #[tokio::test]
    async fn test_memory_wallet_answers() {
        let wallet = MemoryWallet::new(["0xA11CE"], 137);
        assert!(wallet.is_available());
        assert_eq!(wallet.request_accounts().await.unwrap(), vec!["0xA11CE"]);
        assert_eq!(wallet.chain_id().await.unwrap(), "0x89");

        wallet.fail_with(Some(SessionError::UserRejected));
        assert_eq!(
            wallet.request_accounts().await,
            Err(SessionError::UserRejected)
        );
    }

    #[tokio::test]
    async fn test_memory_wallet_events() {
        let wallet = MemoryWallet::new(["0xA"], 1);
        let mut a = wallet.subscribe();
        let mut b = wallet.subscribe();

        wallet.switch_accounts(["0xB"]).await;
        wallet.switch_chain(5).await;

        for rx in [&mut a, &mut b] {
            assert_eq!(
                rx.recv().await.unwrap(),
                ProviderEvent::AccountsChanged(vec!["0xB".into()])
            );
            assert_eq!(
                rx.recv().await.unwrap(),
                ProviderEvent::ChainChanged("0x5".into())
            );
        }
        assert_eq!(wallet.request_accounts().await.unwrap(), vec!["0xB"]);
    }

    #[test]
    fn test_unavailable_wallet() {
        assert!(!MemoryWallet::unavailable().is_available());
    }
}
