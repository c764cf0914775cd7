//! The identity session.
//!
//! Owns the single active principal, the chain the wallet is on, and the
//! connect lifecycle. Dependents observe changes through
//! [`IdentitySession::subscribe`].
//!
//! # Ordering
//!
//! All state lives behind one lock together with an epoch counter. Every
//! disconnect and every provider event that changes the principal bumps the
//! epoch. A connect that was suspended on the wallet compares epochs before
//! committing. If an account event connected the session in the meantime,
//! the event's principal stands and the connect only fills in a missing
//! chain; otherwise the connect yields [`SessionError::Superseded`].

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use medvault_core::Principal;

use crate::error::{Result, SessionError};
use crate::network::{is_supported, network_name, parse_chain_id};
use crate::provider::{ProviderEvent, WalletProvider};

/// Configuration for the identity session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on waiting for the wallet during connect.
    pub connect_timeout: Duration,
    /// Capacity of the session event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            event_capacity: 64,
        }
    }
}

impl SessionConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Snapshot of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub principal: Option<Principal>,
    pub chain_id: Option<u64>,
    pub network_name: Option<String>,
    /// Last connect failure, cleared by the next successful connect or a disconnect.
    pub error: Option<SessionError>,
    pub connecting: bool,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        self.principal.is_some()
    }

    /// Whether the current chain is in the supported set.
    pub fn on_supported_network(&self) -> bool {
        self.chain_id.map_or(false, is_supported)
    }

    fn clear(&mut self) {
        self.principal = None;
        self.chain_id = None;
        self.network_name = None;
        self.error = None;
    }
}

/// A change dependents must react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected {
        principal: Principal,
        /// Unknown when an account event connected before any chain was reported.
        chain_id: Option<u64>,
    },
    /// The wallet moved to a different primary account.
    AccountSwitched {
        previous: Principal,
        principal: Principal,
    },
    Disconnected,
    NetworkChanged {
        chain_id: u64,
        /// Dependent state must be rebuilt from scratch.
        reload_required: bool,
    },
}

impl SessionEvent {
    /// Whether the acting principal changed.
    pub fn changes_principal(&self) -> bool {
        !matches!(self, SessionEvent::NetworkChanged { .. })
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: SessionState,
    epoch: u64,
}

/// Clears the `connecting` flag however the connect future ends.
struct ConnectGuard<'a> {
    inner: &'a RwLock<Inner>,
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.state.connecting = false;
    }
}

/// The wallet-backed identity session.
pub struct IdentitySession<W: WalletProvider> {
    provider: Arc<W>,
    config: SessionConfig,
    inner: RwLock<Inner>,
    events: broadcast::Sender<SessionEvent>,
}

impl<W: WalletProvider> IdentitySession<W> {
    /// Create a disconnected session over `provider`.
    pub fn new(provider: Arc<W>, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            provider,
            config,
            inner: RwLock::new(Inner::default()),
            events,
        }
    }

    pub fn provider(&self) -> &Arc<W> {
        &self.provider
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, event: SessionEvent) {
        debug!(?event, "session event");
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Receive every future session change.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.read().state.clone()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.read().state.principal.clone()
    }

    /// The acting principal, or `NotConnected`.
    pub fn require_principal(&self) -> Result<Principal> {
        self.principal().ok_or(SessionError::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.read().state.is_connected()
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.read().state.chain_id
    }

    pub fn last_error(&self) -> Option<SessionError> {
        self.read().state.error.clone()
    }

    /// Connect to the wallet.
    ///
    /// Rejects with `ConnectInProgress` while another connect is suspended.
    /// Any existing session is dropped first. On failure the session stays
    /// disconnected and the error is recorded.
    pub async fn connect(&self) -> Result<Principal> {
        {
            let mut inner = self.write();
            if inner.state.connecting {
                return Err(SessionError::ConnectInProgress);
            }
            inner.state.connecting = true;
        }
        let _guard = ConnectGuard { inner: &self.inner };

        if !self.provider.is_available() {
            self.disconnect();
            return Err(self.fail(SessionError::ProviderUnavailable, None));
        }

        self.disconnect();
        let epoch = self.read().epoch;

        let result =
            match tokio::time::timeout(self.config.connect_timeout, self.request_identity()).await
            {
                Ok(result) => result,
                Err(_) => Err(SessionError::Timeout(self.config.connect_timeout)),
            };

        let (principal, chain_id) = match result {
            Ok(identity) => identity,
            Err(e) => return Err(self.fail(e, Some(epoch))),
        };

        {
            let mut inner = self.write();
            if inner.epoch != epoch {
                return self.adopt_newer(&mut inner, chain_id);
            }
            inner.state.principal = Some(principal.clone());
            inner.state.chain_id = Some(chain_id);
            inner.state.network_name = Some(network_name(chain_id));
            inner.state.error = None;
        }

        info!(principal = %principal.short(), chain_id, "wallet connected");
        self.publish(SessionEvent::Connected {
            principal: principal.clone(),
            chain_id: Some(chain_id),
        });
        Ok(principal)
    }

    // A connect whose epoch moved on. An account event that connected the
    // session wins; the connect contributes the chain if none was reported.
    fn adopt_newer(
        &self,
        inner: &mut RwLockWriteGuard<'_, Inner>,
        chain_id: u64,
    ) -> Result<Principal> {
        let Some(principal) = inner.state.principal.clone() else {
            debug!("discarding stale connect result");
            return Err(SessionError::Superseded);
        };
        if inner.state.chain_id.is_none() {
            inner.state.chain_id = Some(chain_id);
            inner.state.network_name = Some(network_name(chain_id));
            debug!(chain_id, "connect filled in chain for event-installed account");
            self.publish(SessionEvent::NetworkChanged {
                chain_id,
                reload_required: false,
            });
        }
        Ok(principal)
    }

    async fn request_identity(&self) -> Result<(Principal, u64)> {
        let accounts = self.provider.request_accounts().await?;
        let primary = accounts.into_iter().next().ok_or(SessionError::NoAccounts)?;
        let principal =
            Principal::new(primary).map_err(|e| SessionError::ProviderMalformed(e.to_string()))?;

        let raw = self.provider.chain_id().await?;
        let chain_id =
            parse_chain_id(&raw).map_err(|e| SessionError::ProviderMalformed(e.to_string()))?;

        Ok((principal, chain_id))
    }

    // Roll back to disconnected and record `error`, unless a newer change
    // already owns the state.
    fn fail(&self, error: SessionError, epoch: Option<u64>) -> SessionError {
        let mut inner = self.write();
        if epoch.is_some_and(|e| e != inner.epoch) {
            return SessionError::Superseded;
        }
        inner.state.clear();
        inner.state.error = Some(error.clone());
        warn!(%error, "wallet connect failed");
        error
    }

    /// Clear principal, network and error. Safe to call repeatedly.
    pub fn disconnect(&self) {
        let was_connected = {
            let mut inner = self.write();
            inner.epoch += 1;
            let was_connected = inner.state.is_connected();
            inner.state.clear();
            was_connected
        };

        if was_connected {
            info!("wallet disconnected");
            self.publish(SessionEvent::Disconnected);
        }
    }

    /// Apply one provider notification.
    ///
    /// An empty account list disconnects. A primary account connects a
    /// disconnected session, or switches a connected one when it differs.
    /// A chain change requires a connected session's dependents to reload;
    /// while disconnected it is only recorded. Returns the resulting session
    /// event, if any.
    pub fn apply_event(&self, event: ProviderEvent) -> Option<SessionEvent> {
        let session_event = match event {
            ProviderEvent::AccountsChanged(accounts) => {
                let Some(primary) = accounts.into_iter().next() else {
                    let was_connected = self.is_connected();
                    self.disconnect();
                    return was_connected.then_some(SessionEvent::Disconnected);
                };
                let principal = match Principal::new(primary) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "ignoring malformed account");
                        return None;
                    }
                };

                let mut inner = self.write();
                let previous = match inner.state.principal.clone() {
                    Some(p) if p == principal => return None,
                    Some(p) => p,
                    None => {
                        inner.epoch += 1;
                        inner.state.principal = Some(principal.clone());
                        inner.state.error = None;
                        let chain_id = inner.state.chain_id;
                        drop(inner);
                        info!(
                            principal = %principal.short(),
                            ?chain_id,
                            "wallet connected by account event"
                        );
                        let event = SessionEvent::Connected {
                            principal,
                            chain_id,
                        };
                        self.publish(event.clone());
                        return Some(event);
                    }
                };
                inner.epoch += 1;
                inner.state.principal = Some(principal.clone());
                info!(
                    from = %previous.short(),
                    to = %principal.short(),
                    "wallet account switched"
                );
                SessionEvent::AccountSwitched {
                    previous,
                    principal,
                }
            }
            ProviderEvent::ChainChanged(raw) => {
                let chain_id = match parse_chain_id(&raw) {
                    Ok(id) => id,
                    Err(e) => {
                        warn!(error = %e, "ignoring malformed chain id");
                        return None;
                    }
                };

                let mut inner = self.write();
                inner.state.chain_id = Some(chain_id);
                inner.state.network_name = Some(network_name(chain_id));
                if !inner.state.is_connected() {
                    debug!(chain_id, "recorded chain while disconnected");
                    return None;
                }
                inner.epoch += 1;
                info!(chain_id, network = %network_name(chain_id), "wallet network changed");
                SessionEvent::NetworkChanged {
                    chain_id,
                    reload_required: true,
                }
            }
        };

        self.publish(session_event.clone());
        Some(session_event)
    }

    /// Apply queued events without waiting. Returns how many were applied.
    pub fn drain_events(&self, rx: &mut mpsc::Receiver<ProviderEvent>) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.apply_event(event);
            applied += 1;
        }
        applied
    }

    /// Apply events until the provider closes the channel.
    pub async fn run(&self, mut rx: mpsc::Receiver<ProviderEvent>) {
        while let Some(event) = rx.recv().await {
            self.apply_event(event);
        }
        debug!("provider event channel closed");
    }
}

impl<W: WalletProvider + 'static> IdentitySession<W> {
    /// Subscribe to the provider and apply its events on a background task.
    pub fn spawn_event_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let rx = self.provider.subscribe();
        let session = Arc::clone(self);
        tokio::spawn(async move { session.run(rx).await })
    }
}
