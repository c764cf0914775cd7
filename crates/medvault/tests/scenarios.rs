//! End-to-end vault scenarios over the in-memory wallet.
//!
//! Two principals share one vault; switching the wallet's account and
//! reconnecting changes who is acting.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;

use medvault::session::memory::MemoryWallet;
use medvault::session::ProviderEvent;
use medvault::store::{MemoryStore, SqliteStore, Store};
use medvault::{
    messages, AccessDuration, AccessStatus, ActivityKind, ErrorKind, MemorySink, RequestOutcome,
    SessionError, Vault, VaultConfig, VaultError, VaccineId,
};

const ALICE: &str = "0xA11CE00000000000000000000000000000000001";
const BOB: &str = "0xB0B0000000000000000000000000000000000002";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

type MemoryVault = Vault<MemoryStore, MemoryWallet>;

fn memory_vault(config: VaultConfig) -> (Arc<MemoryWallet>, Arc<MemorySink>, MemoryVault) {
    init_tracing();
    let wallet = Arc::new(MemoryWallet::new([ALICE], 1));
    let sink = Arc::new(MemorySink::new());
    let vault =
        Vault::new(MemoryStore::new(), Arc::clone(&wallet), config).with_notifier(sink.clone());
    (wallet, sink, vault)
}

async fn act_as<S: Store>(
    vault: &Vault<S, MemoryWallet>,
    wallet: &MemoryWallet,
    address: &str,
) -> Result<()> {
    wallet.set_accounts([address]);
    vault.connect().await?;
    Ok(())
}

#[tokio::test]
async fn bloodtest_request_approve_revoke() -> Result<()> {
    let (wallet, sink, vault) = memory_vault(VaultConfig::default());

    act_as(&vault, &wallet, ALICE).await?;
    let record = vault
        .upload_record("bloodtest.pdf", "annual panel", Bytes::from_static(b"%PDF-1.7"))
        .await?;

    act_as(&vault, &wallet, BOB).await?;
    assert!(vault.download(&record.id).await.is_err());

    let outcome = vault.request_access(&record.id).await?;
    let request = outcome.request().cloned().expect("request created");
    assert!(outcome.is_created());
    assert_eq!(request.status, AccessStatus::Pending);
    assert!(sink.contains(messages::ACCESS_REQUEST_SENT));

    let listing = vault.records("blood").await?;
    assert_eq!(listing.len(), 1);
    assert!(listing[0].pending_request);
    assert!(!listing[0].can_read);

    act_as(&vault, &wallet, ALICE).await?;
    let inbox = vault.pending_requests().await?;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].record_name, "bloodtest.pdf");

    let granted = vault.approve_access(&request.id).await?;
    assert_eq!(granted.status, AccessStatus::Granted);
    assert!(vault.pending_requests().await?.is_empty());
    assert_eq!(vault.active_grants().await?.len(), 1);

    act_as(&vault, &wallet, BOB).await?;
    assert_eq!(vault.download(&record.id).await?.as_ref(), b"%PDF-1.7");

    act_as(&vault, &wallet, ALICE).await?;
    let revoked = vault.revoke_access(&request.id).await?;
    assert_eq!(revoked.status, AccessStatus::Revoked);
    assert!(sink.contains(messages::ACCESS_REVOKED));

    act_as(&vault, &wallet, BOB).await?;
    let err = vault.download(&record.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let mine = vault.my_requests().await?;
    assert_eq!(mine[0].request.status, AccessStatus::Revoked);
    Ok(())
}

#[tokio::test]
async fn revoked_request_cannot_be_regranted() -> Result<()> {
    let (wallet, _, vault) = memory_vault(VaultConfig::default());

    act_as(&vault, &wallet, ALICE).await?;
    let record = vault
        .upload_record("scan.png", "", Bytes::from_static(b"png"))
        .await?;

    act_as(&vault, &wallet, BOB).await?;
    let request = vault
        .request_access(&record.id)
        .await?
        .request()
        .cloned()
        .expect("request created");

    act_as(&vault, &wallet, ALICE).await?;
    vault.reject_access(&request.id).await?;
    let err = vault.approve_access(&request.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // A fresh request is the way back in.
    act_as(&vault, &wallet, BOB).await?;
    assert!(vault.request_access(&record.id).await?.is_created());
    Ok(())
}

#[tokio::test]
async fn non_owner_cannot_decide() -> Result<()> {
    let (wallet, _, vault) = memory_vault(VaultConfig::default());

    act_as(&vault, &wallet, ALICE).await?;
    let record = vault
        .upload_record("a.pdf", "", Bytes::from_static(b"pdf"))
        .await?;

    act_as(&vault, &wallet, BOB).await?;
    let request = vault
        .request_access(&record.id)
        .await?
        .request()
        .cloned()
        .expect("request created");

    let err = vault.approve_access(&request.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    let err = vault.delete_record(&record.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    let err = vault
        .grant_access(BOB, &record.id, AccessDuration::Permanent)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    act_as(&vault, &wallet, ALICE).await?;
    assert_eq!(vault.pending_requests().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn duplicate_requests_are_deduplicated() -> Result<()> {
    let (wallet, _, vault) = memory_vault(VaultConfig::default());

    act_as(&vault, &wallet, ALICE).await?;
    let record = vault
        .upload_record("a.pdf", "", Bytes::from_static(b"pdf"))
        .await?;
    assert!(matches!(
        vault.request_access(&record.id).await?,
        RequestOutcome::Ignored(_)
    ));

    act_as(&vault, &wallet, BOB).await?;
    let first = vault.request_access(&record.id).await?;
    let second = vault.request_access(&record.id).await?;
    assert!(first.is_created());
    assert!(matches!(second, RequestOutcome::Existing(_)));
    assert_eq!(first.request(), second.request());

    act_as(&vault, &wallet, ALICE).await?;
    assert_eq!(vault.pending_requests().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn manual_grant_carries_duration() -> Result<()> {
    let (wallet, sink, vault) = memory_vault(VaultConfig::default());

    act_as(&vault, &wallet, ALICE).await?;
    let record = vault
        .upload_record("a.pdf", "", Bytes::from_static(b"pdf"))
        .await?;

    let err = vault
        .grant_access("   ", &record.id, AccessDuration::Day)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = vault
        .grant_access(ALICE, &record.id, AccessDuration::Day)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let grant = vault
        .grant_access(BOB, &record.id, AccessDuration::Week)
        .await?;
    assert_eq!(grant.status, AccessStatus::Granted);
    let expires_at = grant
        .conditions
        .and_then(|c| c.expires_at)
        .expect("week grant expires");
    assert_eq!(expires_at - grant.updated_at, 7 * 24 * 60 * 60 * 1000);
    assert!(sink.contains(messages::ACCESS_GRANTED));

    act_as(&vault, &wallet, BOB).await?;
    assert!(vault.download(&record.id).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn deleted_record_leaves_dangling_requests() -> Result<()> {
    let (wallet, sink, vault) = memory_vault(VaultConfig::default());

    act_as(&vault, &wallet, ALICE).await?;
    let record = vault
        .upload_record("old.pdf", "", Bytes::from_static(b"pdf"))
        .await?;

    act_as(&vault, &wallet, BOB).await?;
    vault.request_access(&record.id).await?;

    act_as(&vault, &wallet, ALICE).await?;
    vault.delete_record(&record.id).await?;
    assert!(sink.contains(messages::RECORD_DELETED));
    assert!(vault.my_records("").await?.is_empty());
    assert_eq!(vault.record_name(&record.id).await?, "Unknown Record");

    act_as(&vault, &wallet, BOB).await?;
    let mine = vault.my_requests().await?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].record_name, "Unknown Record");

    // Requests for missing records are silently dropped.
    assert!(matches!(
        vault.request_access(&record.id).await?,
        RequestOutcome::Ignored(_)
    ));
    Ok(())
}

#[tokio::test]
async fn connect_failures_leave_session_disconnected() -> Result<()> {
    init_tracing();
    let wallet = Arc::new(MemoryWallet::new(Vec::<String>::new(), 1));
    let sink = Arc::new(MemorySink::new());
    let vault = Vault::new(MemoryStore::new(), Arc::clone(&wallet), VaultConfig::default())
        .with_notifier(sink.clone());

    let err = vault.connect().await.unwrap_err();
    assert!(matches!(err, VaultError::Session(SessionError::NoAccounts)));
    assert!(!vault.session_state().is_connected());
    assert_eq!(vault.session_state().error, Some(SessionError::NoAccounts));
    assert_eq!(sink.messages().len(), 1);

    wallet.fail_with(Some(SessionError::UserRejected));
    wallet.set_accounts([ALICE]);
    assert!(vault.connect().await.is_err());
    assert!(!vault.session_state().is_connected());

    wallet.fail_with(None);
    vault.connect().await?;
    assert!(vault.session_state().is_connected());

    vault.disconnect();
    vault.disconnect();
    assert!(!vault.session_state().is_connected());
    assert!(vault.my_records("").await.is_err());
    Ok(())
}

#[tokio::test]
async fn ledger_resets_when_account_changes() -> Result<()> {
    let (wallet, sink, vault) = memory_vault(VaultConfig::default());
    act_as(&vault, &wallet, ALICE).await?;

    let polio = VaccineId::derive("Polio");
    let entry = vault
        .verify_vaccination(&polio, Some("City Clinic"), "polio.jpg", Bytes::from_static(b"jpg"))
        .await?;
    assert_eq!(entry.issuer.as_deref(), Some("City Clinic"));
    assert_eq!(vault.verified_count().await?, 1);
    assert!(!vault.is_fully_verified().await?);
    assert!(sink.contains(messages::VACCINATION_VERIFIED));

    let hits = vault.search_vaccinations("hep").await?;
    assert_eq!(hits.len(), 2);

    vault
        .session()
        .apply_event(ProviderEvent::AccountsChanged(vec![BOB.to_string()]));
    assert_eq!(vault.verified_count().await?, 0);

    vault
        .session()
        .apply_event(ProviderEvent::AccountsChanged(vec![ALICE.to_string()]));
    assert_eq!(vault.verified_count().await?, 0);

    // A network change keeps the principal and its ledger.
    vault
        .verify_vaccination(&polio, None, "polio.jpg", Bytes::from_static(b"jpg"))
        .await?;
    vault
        .session()
        .apply_event(ProviderEvent::ChainChanged("0x89".into()));
    assert_eq!(vault.verified_count().await?, 1);
    assert_eq!(vault.session_state().chain_id, Some(137));
    Ok(())
}

#[tokio::test]
async fn account_event_connects_idle_vault() -> Result<()> {
    let (_, _, vault) = memory_vault(VaultConfig::default());
    assert!(vault.my_records("").await.is_err());

    vault
        .session()
        .apply_event(ProviderEvent::ChainChanged("0x89".into()));
    vault
        .session()
        .apply_event(ProviderEvent::AccountsChanged(vec![ALICE.to_string()]));

    let state = vault.session_state();
    assert_eq!(
        state.principal.map(|p| p.as_str().to_string()),
        Some(ALICE.to_string())
    );
    assert_eq!(state.network_name.as_deref(), Some("Polygon"));
    assert!(vault.my_records("").await?.is_empty());
    assert_eq!(vault.verified_count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn full_catalog_verification() -> Result<()> {
    let (wallet, _, vault) = memory_vault(VaultConfig::default());
    act_as(&vault, &wallet, ALICE).await?;

    let ids: Vec<_> = vault
        .vaccinations()
        .await?
        .entries()
        .iter()
        .map(|e| e.id.clone())
        .collect();
    assert_eq!(ids.len(), 21);

    for id in &ids {
        vault
            .verify_vaccination(id, None, "card.jpg", Bytes::from_static(b"jpg"))
            .await?;
    }
    assert!(vault.is_fully_verified().await?);
    Ok(())
}

#[tokio::test]
async fn wallet_events_flow_through_background_loop() -> Result<()> {
    let (wallet, _, vault) = memory_vault(VaultConfig::default());
    act_as(&vault, &wallet, ALICE).await?;
    let handle = vault.spawn_session_events();
    tokio::task::yield_now().await;

    wallet.switch_accounts([BOB]).await;
    for _ in 0..100 {
        if vault.session_state().principal.as_ref().map(|p| p.as_str()) == Some(BOB) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(
        vault.session_state().principal.map(|p| p.as_str().to_string()),
        Some(BOB.to_string())
    );

    wallet.switch_accounts(Vec::<String>::new()).await;
    for _ in 0..100 {
        if !vault.session_state().is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!vault.session_state().is_connected());

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn activity_log_is_capped() -> Result<()> {
    let (wallet, _, vault) = memory_vault(VaultConfig::default());
    act_as(&vault, &wallet, ALICE).await?;

    for i in 0..51 {
        vault
            .upload_record(&format!("r{i}.pdf"), "", Bytes::from_static(b"pdf"))
            .await?;
    }

    let activity = vault.activity(100).await?;
    assert_eq!(activity.len(), 50);
    assert_eq!(activity[0].record_name, "r50.pdf");
    assert_eq!(activity[49].record_name, "r1.pdf");
    assert!(activity.iter().all(|e| e.kind == ActivityKind::Upload));
    Ok(())
}

#[tokio::test]
async fn share_links_verify_and_expire() -> Result<()> {
    let (wallet, _, vault) = memory_vault(VaultConfig::default());
    act_as(&vault, &wallet, ALICE).await?;
    let record = vault
        .upload_record("a.pdf", "", Bytes::from_static(b"pdf"))
        .await?;

    let link = vault.share_link(&record.id).await?;
    assert!(link.url.starts_with("http://localhost:3000/share/"));

    vault.disconnect();
    let shared = vault.open_share_link(&link.url).await?;
    assert_eq!(shared.record.name, "a.pdf");
    assert_eq!(vault.download_shared(&link.url).await?.as_ref(), b"pdf");

    let mut tampered = link.url.clone();
    let last = tampered.pop().expect("non-empty url");
    tampered.push(if last == '0' { '1' } else { '0' });
    let err = vault.open_share_link(&tampered).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = vault
        .open_share_link("http://localhost:3000/records")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    // Links are bound to the issuing vault's key.
    let (other_wallet, _, other) = memory_vault(VaultConfig::default());
    act_as(&other, &other_wallet, ALICE).await?;
    assert!(other.open_share_link(&link.url).await.is_err());
    Ok(())
}

#[tokio::test]
async fn expired_share_link_is_refused() -> Result<()> {
    let config = VaultConfig::default().with_share_link_ttl(Duration::ZERO);
    let (wallet, _, vault) = memory_vault(config);
    act_as(&vault, &wallet, ALICE).await?;
    let record = vault
        .upload_record("a.pdf", "", Bytes::from_static(b"pdf"))
        .await?;

    let link = vault.share_link(&record.id).await?;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let err = vault.open_share_link(&link.url).await.unwrap_err();
    assert!(matches!(
        err,
        VaultError::Permission(medvault::perms::PermsError::ShareLinkExpired(_))
    ));
    Ok(())
}

#[tokio::test]
async fn sqlite_vault_survives_reopen() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("vault.db");
    let wallet = Arc::new(MemoryWallet::new([ALICE], 1));

    let record_id = {
        let store = SqliteStore::open(&path)?;
        let vault = Vault::new(store, Arc::clone(&wallet), VaultConfig::default());
        vault.connect().await?;
        let record = vault
            .upload_record("bloodtest.pdf", "", Bytes::from_static(b"pdf"))
            .await?;
        vault
            .grant_access(BOB, &record.id, AccessDuration::Permanent)
            .await?;
        record.id
    };

    let store = SqliteStore::open(&path)?;
    let vault = Vault::new(store, Arc::clone(&wallet), VaultConfig::default());
    vault.connect().await?;
    let records = vault.my_records("blood").await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, record_id);

    let grants = vault.active_grants().await?;
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].request.address.as_str(), BOB);
    assert_eq!(vault.activity(10).await?[0].kind, ActivityKind::Upload);
    Ok(())
}
