//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use rand::RngCore;

use medvault::{MemorySink, Vault, VaultConfig};
use medvault_core::{now_millis, AccessRequest, Principal, Record};
use medvault_perms::{AccessDuration, AccessEngine};
use medvault_session::memory::MemoryWallet;
use medvault_store::{locator_for, MemoryStore, Store};

/// Deterministic wallet address for party `index`.
pub fn address(index: u8) -> String {
    format!("0x{}", hex::encode([index; 20]))
}

/// A principal with a memory store, for building rows by hand.
pub struct TestFixture {
    pub principal: Principal,
    pub store: MemoryStore,
}

impl TestFixture {
    /// Create a new test fixture with a random address.
    pub fn new() -> Self {
        let mut bytes = [0u8; 20];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::with_address(format!("0x{}", hex::encode(bytes)))
    }

    /// Create with a fixed address.
    ///
    /// # Panics
    ///
    /// Panics if `address` is not a valid principal.
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            principal: Principal::new(address).expect("fixture address is valid"),
            store: MemoryStore::new(),
        }
    }

    /// A record owned by this fixture's principal.
    pub fn make_record(&self, name: &str, payload: &[u8]) -> Record {
        Record::new(
            name,
            "",
            locator_for(payload),
            self.principal.clone(),
            now_millis(),
        )
        .expect("fixture record name is valid")
    }

    /// A pending request from this fixture's principal.
    pub fn make_request(&self, record: &Record) -> AccessRequest {
        AccessRequest::pending(self.principal.clone(), record.id, now_millis())
    }

    /// A grant from this fixture's principal to `recipient`.
    pub fn make_grant(
        &self,
        record: &Record,
        recipient: &Principal,
        duration: AccessDuration,
    ) -> AccessRequest {
        AccessEngine::default()
            .manual_grant(
                &self.principal,
                Some(record),
                &record.id,
                recipient.as_str(),
                duration,
                now_millis(),
            )
            .expect("fixture owns the record")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple test fixtures for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| TestFixture::with_address(address(i as u8 + 1)))
        .collect()
}

/// A vault wired to an in-memory wallet and a recording notifier.
pub struct VaultFixture<S: Store = MemoryStore> {
    pub wallet: Arc<MemoryWallet>,
    pub sink: Arc<MemorySink>,
    pub vault: Vault<S, MemoryWallet>,
}

impl VaultFixture<MemoryStore> {
    /// A memory-backed vault with default configuration.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new(), VaultConfig::default())
    }
}

impl Default for VaultFixture<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Store> VaultFixture<S> {
    /// A vault over `store`. The wallet starts on chain 1 with no accounts.
    pub fn with_store(store: S, config: VaultConfig) -> Self {
        let wallet = Arc::new(MemoryWallet::new(Vec::<String>::new(), 1));
        let sink = Arc::new(MemorySink::new());
        let vault = Vault::new(store, Arc::clone(&wallet), config).with_notifier(sink.clone());
        Self {
            wallet,
            sink,
            vault,
        }
    }

    /// Point the wallet at `address` and reconnect.
    pub async fn act_as(&self, address: &str) -> medvault::Result<Principal> {
        self.wallet.set_accounts([address]);
        self.vault.connect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvault_core::AccessStatus;
    use medvault_store::SqliteStore;

    #[test]
    fn test_fixture_rows() {
        let owner = TestFixture::new();
        let other = TestFixture::new();

        let record = owner.make_record("xray.png", b"png");
        assert!(record.is_owned_by(&owner.principal));
        assert_eq!(record.file_url, locator_for(b"png"));

        let request = other.make_request(&record);
        assert_eq!(request.status, AccessStatus::Pending);
        assert_eq!(request.address, other.principal);

        let grant = owner.make_grant(&record, &other.principal, AccessDuration::Permanent);
        assert_eq!(grant.status, AccessStatus::Granted);
        assert!(grant.is_active(i64::MAX));
    }

    #[test]
    fn test_multi_party() {
        let parties = multi_party_fixtures(3);

        // Each party has a unique address
        let addrs: Vec<_> = parties.iter().map(|p| p.principal.clone()).collect();
        assert_ne!(addrs[0], addrs[1]);
        assert_ne!(addrs[1], addrs[2]);
        assert_eq!(addrs[0].as_str(), address(1));
    }

    #[tokio::test]
    async fn test_fixture_store() {
        let fixture = TestFixture::new();
        let record = fixture.make_record("a.pdf", b"pdf");
        fixture.store.insert_record(&record).await.unwrap();

        let owned = fixture
            .store
            .records_by_owner(&fixture.principal)
            .await
            .unwrap();
        assert_eq!(owned, vec![record]);
    }

    #[tokio::test]
    async fn test_vault_fixture_over_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("vault.db")).unwrap();
        let fixture = VaultFixture::with_store(store, VaultConfig::default());

        assert!(fixture.vault.connect().await.is_err());
        let alice = fixture.act_as(&address(1)).await.unwrap();
        assert_eq!(alice.as_str(), address(1));

        fixture
            .vault
            .upload_record("a.pdf", "", b"pdf".to_vec().into())
            .await
            .unwrap();
        assert!(fixture.sink.contains(medvault::messages::RECORD_UPLOADED));

        fixture.act_as(&address(2)).await.unwrap();
        assert_eq!(fixture.vault.records("").await.unwrap().len(), 1);
        assert!(fixture.vault.my_records("").await.unwrap().is_empty());
    }
}
