//! The Vault: unified API for MedVault.
//!
//! The Vault brings together the identity session, storage, the access
//! control engine, the verification ledger and the activity log behind one
//! handle. Every mutation reads its joint snapshot and writes its result
//! while holding a single write gate, so cross-entity checks (record owner
//! against access request) never interleave.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use medvault_core::{
    filter_records, now_millis, AccessRequest, AccessStatus, ActivityEntry, ActivityKind,
    LedgerError, Principal, Record, RecordId, RequestId, VaccinationEntry, VaccineId,
    ValidationError, VerificationLedger,
};
use medvault_perms::{
    AccessDuration, AccessEngine, RequestOutcome, RequestView, ShareKey, ShareLink,
};
use medvault_session::{IdentitySession, SessionError, SessionEvent, SessionState, WalletProvider};
use medvault_store::{BlobStore, MemoryBlobStore, Store, StoreExt};

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::notify::{messages, NotificationSink, Severity, TracingSink};

/// A record as seen by the acting principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordListing {
    pub record: Record,
    pub is_owner: bool,
    /// The principal has a request for this record awaiting the owner.
    pub pending_request: bool,
    /// The principal may download the payload right now.
    pub can_read: bool,
}

/// A record opened through a share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedRecord {
    pub record: Record,
    /// Unix ms after which the link stops working.
    pub expires_at: i64,
}

/// The main Vault struct.
///
/// Provides a unified API for:
/// - Connecting and disconnecting the wallet
/// - Uploading, listing and deleting records
/// - Requesting, approving, rejecting, granting and revoking access
/// - Downloading payloads and issuing share links
/// - Verifying vaccinations
pub struct Vault<S: Store, W: WalletProvider> {
    /// The storage backend.
    store: Arc<S>,
    /// The wallet-backed identity session.
    session: Arc<IdentitySession<W>>,
    /// Payload storage.
    blobs: Arc<dyn BlobStore>,
    /// User-facing notifications.
    notifier: Arc<dyn NotificationSink>,
    engine: AccessEngine,
    share_key: ShareKey,
    config: VaultConfig,
    /// Serializes every read-check-write sequence.
    gate: tokio::sync::Mutex<()>,
    /// Session changes not yet applied to the ledger.
    session_events: Mutex<broadcast::Receiver<SessionEvent>>,
}

impl<S: Store, W: WalletProvider> Vault<S, W> {
    /// Create a new vault over `store` and `wallet`.
    ///
    /// Payloads go to an in-memory blob store and notifications to tracing
    /// until replaced with the `with_*` methods.
    pub fn new(store: S, wallet: Arc<W>, config: VaultConfig) -> Self {
        let session = Arc::new(IdentitySession::new(
            wallet,
            config.session.to_session_config(),
        ));
        let session_events = Mutex::new(session.subscribe());

        Self {
            store: Arc::new(store),
            session,
            blobs: Arc::new(MemoryBlobStore::new()),
            notifier: Arc::new(TracingSink),
            engine: AccessEngine::new(config.duplicate_requests),
            share_key: ShareKey::generate(),
            config,
            gate: tokio::sync::Mutex::new(()),
            session_events,
        }
    }

    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = blobs;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Use a fixed share-link key so links survive a restart.
    pub fn with_share_key(mut self, key: ShareKey) -> Self {
        self.share_key = key;
        self
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session(&self) -> &Arc<IdentitySession<W>> {
        &self.session
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Connect the wallet and start a fresh verification ledger.
    pub async fn connect(&self) -> Result<Principal> {
        let principal = match self.session.connect().await {
            Ok(principal) => principal,
            Err(e) => {
                self.notifier.notify(&e.to_string(), Severity::Error);
                return Err(e.into());
            }
        };
        self.sync_session().await?;
        Ok(principal)
    }

    /// Drop the session. Safe to call when already disconnected.
    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Apply any session changes the vault has not seen yet.
    ///
    /// Every principal change, including the first connect, resets that
    /// principal's verification ledger to all-unverified. Called at the start
    /// of every principal-scoped operation.
    pub async fn sync_session(&self) -> Result<()> {
        let reset = {
            let mut rx = self
                .session_events
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let mut reset = false;
            loop {
                match rx.try_recv() {
                    Ok(event) => {
                        if let SessionEvent::NetworkChanged { chain_id, .. } = &event {
                            info!(chain_id, "network changed, views will be rebuilt");
                        }
                        reset |= event.changes_principal();
                    }
                    Err(TryRecvError::Lagged(skipped)) => {
                        warn!(skipped, "session events lagged");
                        reset = true;
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }
            reset
        };

        if reset {
            if let Some(principal) = self.session.principal() {
                let _gate = self.gate.lock().await;
                self.reset_ledger(&principal).await?;
            }
        }
        Ok(())
    }

    // The acting principal, or a session error.
    async fn acting(&self) -> Result<Principal> {
        self.sync_session().await?;

        let state = self.session.state();
        let principal = state.principal.clone().ok_or(SessionError::NotConnected)?;
        if self.config.require_supported_network && !state.on_supported_network() {
            let chain_id = state.chain_id.unwrap_or_default();
            return Err(SessionError::UnsupportedNetwork(chain_id).into());
        }
        Ok(principal)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Record Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a payload and register it as a record owned by the caller.
    pub async fn upload_record(
        &self,
        name: &str,
        description: &str,
        payload: Bytes,
    ) -> Result<Record> {
        let owner = self.acting().await?;
        if name.trim().is_empty() {
            return Err(ValidationError::Empty { field: "name" }.into());
        }
        if payload.is_empty() {
            return Err(ValidationError::Empty { field: "file" }.into());
        }

        let _gate = self.gate.lock().await;
        let locator = self.blobs.put(name, payload).await?;
        let record = Record::new(name, description, locator, owner.clone(), now_millis())?;
        self.store.insert_record(&record).await?;
        self.log_activity(ActivityKind::Upload, &record.name, None).await?;

        info!(record_id = %record.id, owner = %owner.short(), "record uploaded");
        self.notifier.notify(messages::RECORD_UPLOADED, Severity::Success);
        Ok(record)
    }

    /// Delete a record. Only its owner may do this.
    ///
    /// Access requests that reference the record are left in place.
    pub async fn delete_record(&self, id: &RecordId) -> Result<Record> {
        let actor = self.acting().await?;
        let _gate = self.gate.lock().await;

        let record = self
            .store
            .get_record(id)
            .await?
            .ok_or(VaultError::RecordNotFound(*id))?;
        self.engine.authorize_owner(&actor, Some(&record), id)?;

        self.store.delete_record(id).await?;
        self.log_activity(ActivityKind::Delete, &record.name, None).await?;

        info!(record_id = %id, "record deleted");
        self.notifier.notify(messages::RECORD_DELETED, Severity::Success);
        Ok(record)
    }

    /// All records matching `query`, annotated for the caller.
    pub async fn records(&self, query: &str) -> Result<Vec<RecordListing>> {
        let principal = self.acting().await?;
        let _gate = self.gate.lock().await;

        let records = self.store.list_records().await?;
        let mine = self.store.requests_by_address(&principal).await?;
        let now = now_millis();

        Ok(filter_records(&records, query)
            .into_iter()
            .map(|record| RecordListing {
                is_owner: record.is_owned_by(&principal),
                pending_request: mine
                    .iter()
                    .any(|r| r.record_id == record.id && r.is_pending()),
                can_read: self.engine.can_read(&principal, record, &mine, now),
                record: record.clone(),
            })
            .collect())
    }

    /// Records owned by the caller matching `query`.
    pub async fn my_records(&self, query: &str) -> Result<Vec<Record>> {
        let owner = self.acting().await?;
        let records = self.store.records_by_owner(&owner).await?;
        Ok(filter_records(&records, query).into_iter().cloned().collect())
    }

    /// Name of a record, or `"Unknown Record"`.
    pub async fn record_name(&self, id: &RecordId) -> Result<String> {
        Ok(self.store.record_name(id).await?)
    }

    /// Fetch a record's payload.
    ///
    /// The caller must own the record or hold an unexpired grant.
    pub async fn download(&self, id: &RecordId) -> Result<Bytes> {
        let principal = self.acting().await?;

        let record = {
            let _gate = self.gate.lock().await;
            let record = self
                .store
                .get_record(id)
                .await?
                .ok_or(VaultError::RecordNotFound(*id))?;
            let requests = self.store.requests_for_record(id).await?;
            self.engine
                .authorize_read(&principal, &record, &requests, now_millis())?;
            record
        };

        let bytes = self.blobs.get(&record.file_url).await?;
        self.log_activity(ActivityKind::Download, &record.name, None).await?;
        debug!(
            record_id = %id,
            principal = %principal.short(),
            size = bytes.len(),
            "record downloaded"
        );
        Ok(bytes)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Ask the owner of `record_id` for access.
    ///
    /// A no-op for unknown records and for records the caller owns.
    pub async fn request_access(&self, record_id: &RecordId) -> Result<RequestOutcome> {
        let principal = self.acting().await?;
        let _gate = self.gate.lock().await;

        let record = self.store.get_record(record_id).await?;
        let existing = match &record {
            Some(r) => self.store.requests_for_record(&r.id).await?,
            None => Vec::new(),
        };

        let outcome =
            self.engine
                .request_access(&principal, record.as_ref(), &existing, now_millis())?;

        match &outcome {
            RequestOutcome::Created(request) => {
                self.store.insert_request(request).await?;
                let name = Record::display_name(record.as_ref());
                self.log_activity(ActivityKind::RequestAccess, name, None).await?;

                info!(
                    request_id = %request.id,
                    record_id = %record_id,
                    from = %principal.short(),
                    "access requested"
                );
                self.notifier.notify(messages::ACCESS_REQUEST_SENT, Severity::Info);
                self.notifier
                    .notify(&messages::new_access_request(name, &principal), Severity::Info);
            }
            RequestOutcome::Existing(request) => {
                debug!(request_id = %request.id, "pending request already exists");
            }
            RequestOutcome::Ignored(reason) => {
                debug!(?reason, record_id = %record_id, "request access ignored");
            }
        }
        Ok(outcome)
    }

    /// Move a request to `desired`.
    ///
    /// This is the only way a request changes status. The caller must own
    /// the target record and the move must be in the transition table.
    pub async fn transition(
        &self,
        request_id: &RequestId,
        desired: AccessStatus,
    ) -> Result<AccessRequest> {
        let actor = self.acting().await?;
        let _gate = self.gate.lock().await;

        let request = self
            .store
            .get_request(request_id)
            .await?
            .ok_or(VaultError::RequestNotFound(*request_id))?;
        let record = self.store.get_record(&request.record_id).await?;

        let updated = self.engine.transition(
            &actor,
            record.as_ref(),
            &request,
            desired,
            None,
            now_millis(),
        )?;
        self.store.update_request(&updated).await?;

        info!(
            request_id = %request_id,
            from = %request.status,
            to = %updated.status,
            "access request updated"
        );
        Ok(updated)
    }

    /// Approve a pending request.
    pub async fn approve_access(
        &self,
        request_id: &RequestId,
    ) -> Result<AccessRequest> {
        let updated = self.transition(request_id, AccessStatus::Granted).await?;
        self.notifier.notify(messages::ACCESS_APPROVED, Severity::Success);
        Ok(updated)
    }

    /// Reject a pending request.
    pub async fn reject_access(
        &self,
        request_id: &RequestId,
    ) -> Result<AccessRequest> {
        let updated = self.transition(request_id, AccessStatus::Rejected).await?;
        self.notifier.notify(messages::ACCESS_REJECTED, Severity::Info);
        Ok(updated)
    }

    /// Revoke a granted request.
    pub async fn revoke_access(
        &self,
        request_id: &RequestId,
    ) -> Result<AccessRequest> {
        let updated = self.transition(request_id, AccessStatus::Revoked).await?;
        self.notifier.notify(messages::ACCESS_REVOKED, Severity::Info);
        Ok(updated)
    }

    /// Grant `recipient` access to one of the caller's records directly.
    pub async fn grant_access(
        &self,
        recipient: &str,
        record_id: &RecordId,
        duration: AccessDuration,
    ) -> Result<AccessRequest> {
        let actor = self.acting().await?;
        let _gate = self.gate.lock().await;

        let record = self.store.get_record(record_id).await?;
        let grant = self.engine.manual_grant(
            &actor,
            record.as_ref(),
            record_id,
            recipient,
            duration,
            now_millis(),
        )?;
        self.store.insert_request(&grant).await?;

        info!(
            request_id = %grant.id,
            record_id = %record_id,
            to = %grant.address.short(),
            %duration,
            "access granted"
        );
        self.notifier.notify(messages::ACCESS_GRANTED, Severity::Success);
        Ok(grant)
    }

    /// Pending requests on the caller's records, newest first.
    pub async fn pending_requests(&self) -> Result<Vec<RequestView>> {
        let owner = self.acting().await?;
        let _gate = self.gate.lock().await;

        let records = self.store.records_by_owner(&owner).await?;
        let requests = self.store.list_requests().await?;
        Ok(self.engine.pending_inbox(&owner, &records, &requests))
    }

    /// Unexpired grants on the caller's records, newest first.
    pub async fn active_grants(&self) -> Result<Vec<RequestView>> {
        let owner = self.acting().await?;
        let _gate = self.gate.lock().await;

        let records = self.store.records_by_owner(&owner).await?;
        let requests = self.store.list_requests().await?;
        Ok(self
            .engine
            .active_grants(&owner, &records, &requests, now_millis()))
    }

    /// Requests the caller has made, newest first.
    pub async fn my_requests(&self) -> Result<Vec<RequestView>> {
        let principal = self.acting().await?;
        let _gate = self.gate.lock().await;

        let records = self.store.list_records().await?;
        let requests = self.store.requests_by_address(&principal).await?;
        Ok(self.engine.outgoing(&principal, &records, &requests))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Share Links
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue a signed, expiring link to one of the caller's records.
    pub async fn share_link(&self, record_id: &RecordId) -> Result<ShareLink> {
        let actor = self.acting().await?;
        let _gate = self.gate.lock().await;

        let record = self
            .store
            .get_record(record_id)
            .await?
            .ok_or(VaultError::RecordNotFound(*record_id))?;
        self.engine
            .authorize_owner(&actor, Some(&record), record_id)?;

        let link = self.share_key.issue(
            record.id,
            &self.config.share_base_url,
            self.config.share_link_ttl_ms,
            now_millis(),
        )?;
        self.log_activity(ActivityKind::Share, &record.name, Some(link.url.clone()))
            .await?;

        info!(record_id = %record_id, expires_at = link.expires_at, "share link issued");
        Ok(link)
    }

    /// Resolve a share link. No wallet session is needed.
    pub async fn open_share_link(&self, url: &str) -> Result<SharedRecord> {
        let (record_id, token) = ShareLink::parse_url(url)?;
        let expires_at = self.share_key.verify(record_id, &token, now_millis())?;

        let record = self
            .store
            .get_record(&record_id)
            .await?
            .ok_or(VaultError::RecordNotFound(record_id))?;
        Ok(SharedRecord { record, expires_at })
    }

    /// Fetch the payload behind a share link.
    pub async fn download_shared(&self, url: &str) -> Result<Bytes> {
        let shared = self.open_share_link(url).await?;
        let bytes = self.blobs.get(&shared.record.file_url).await?;
        self.log_activity(
            ActivityKind::Download,
            &shared.record.name,
            Some("via share link".to_string()),
        )
        .await?;
        Ok(bytes)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification Ledger
    // ─────────────────────────────────────────────────────────────────────────

    /// The caller's verification ledger.
    pub async fn vaccinations(&self) -> Result<VerificationLedger> {
        let principal = self.acting().await?;
        self.load_ledger(&principal).await
    }

    /// Catalog entries whose name contains `term`.
    pub async fn search_vaccinations(&self, term: &str) -> Result<Vec<VaccinationEntry>> {
        let ledger = self.vaccinations().await?;
        Ok(ledger.search(term).into_iter().cloned().collect())
    }

    pub async fn verified_count(&self) -> Result<usize> {
        Ok(self.vaccinations().await?.verified_count())
    }

    /// True iff every catalog entry is verified.
    pub async fn is_fully_verified(&self) -> Result<bool> {
        Ok(self.vaccinations().await?.is_fully_verified())
    }

    /// Verify one catalog entry, keeping `document` as evidence.
    ///
    /// A blank `issuer` falls back to the configured default.
    pub async fn verify_vaccination(
        &self,
        id: &VaccineId,
        issuer: Option<&str>,
        document_name: &str,
        document: Bytes,
    ) -> Result<VaccinationEntry> {
        let principal = self.acting().await?;
        if document.is_empty() {
            self.notifier.notify(messages::DOCUMENT_REQUIRED, Severity::Error);
            return Err(ValidationError::Empty { field: "document" }.into());
        }

        let _gate = self.gate.lock().await;
        let mut ledger = self.load_ledger(&principal).await?;
        match ledger.get(id) {
            None => return Err(LedgerError::UnknownEntry(id.clone()).into()),
            Some(entry) if entry.verified => {
                return Err(LedgerError::AlreadyVerified(id.clone()).into())
            }
            Some(_) => {}
        }

        let evidence = self.blobs.put(document_name, document).await?;
        let issuer = issuer
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.config.default_issuer.as_str());
        let entry = ledger
            .verify(id, Some(issuer), Some(evidence), now_millis())?
            .clone();
        self.store.put_ledger(&principal, ledger.entries()).await?;

        info!(
            vaccine = %entry.name,
            issuer,
            principal = %principal.short(),
            "vaccination verified"
        );
        self.notifier.notify(messages::VACCINATION_VERIFIED, Severity::Success);
        Ok(entry)
    }

    async fn load_ledger(&self, principal: &Principal) -> Result<VerificationLedger> {
        Ok(match self.store.get_ledger(principal).await? {
            Some(entries) => VerificationLedger::from_parts(principal.clone(), entries),
            None => VerificationLedger::for_principal(principal.clone()),
        })
    }

    async fn reset_ledger(&self, principal: &Principal) -> Result<()> {
        let ledger = VerificationLedger::for_principal(principal.clone());
        self.store.put_ledger(principal, ledger.entries()).await?;
        debug!(principal = %principal.short(), "verification ledger reset");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Activity
    // ─────────────────────────────────────────────────────────────────────────

    /// The newest `limit` activity entries.
    pub async fn activity(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        // The store keeps at least one entry whatever the capacity.
        let limit = limit.min(self.config.activity_capacity.max(1));
        Ok(self.store.recent_activity(limit).await?)
    }

    async fn log_activity(
        &self,
        kind: ActivityKind,
        record_name: &str,
        details: Option<String>,
    ) -> Result<()> {
        let entry = ActivityEntry::new(kind, record_name, details, now_millis());
        self.store
            .append_activity(&entry, self.config.activity_capacity)
            .await?;
        Ok(())
    }
}

impl<S: Store, W: WalletProvider + 'static> Vault<S, W> {
    /// Apply wallet account/chain events on a background task.
    pub fn spawn_session_events(&self) -> JoinHandle<()> {
        self.session.spawn_event_loop()
    }
}
