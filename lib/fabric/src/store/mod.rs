//! Credential storage - identities keyed by principal name

pub mod file;
pub mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use async_trait::async_trait;

use crate::{error::FabricError, types::Identity};

/// Durable identity storage. An identity, once stored, is never overwritten:
/// `put` on an existing principal fails with `DuplicateIdentity`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn has(&self, principal: &str) -> Result<bool, FabricError> {
        Ok(self.get(principal).await?.is_some())
    }

    /// Returns None if not found.
    async fn get(&self, principal: &str) -> Result<Option<Identity>, FabricError>;

    async fn put(&self, identity: &Identity) -> Result<(), FabricError>;

    /// Stored principal names, sorted.
    async fn list(&self) -> Result<Vec<String>, FabricError>;

    /// Like `get`, but a missing identity is an error.
    async fn require(&self, principal: &str) -> Result<Identity, FabricError> {
        self.get(principal)
            .await?
            .ok_or_else(|| FabricError::IdentityNotFound(principal.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Enrollment;

    fn identity(principal: &str) -> Identity {
        Identity::new(
            principal,
            Enrollment {
                certificate: format!("cert-{}", principal),
                private_key: format!("key-{}", principal),
            },
            "Org1MSP",
        )
    }

    async fn exercise_store(store: &dyn CredentialStore) {
        assert!(!store.has("admin").await.unwrap());
        assert!(store.get("admin").await.unwrap().is_none());
        assert!(matches!(
            store.require("admin").await,
            Err(FabricError::IdentityNotFound(_))
        ));

        store.put(&identity("admin")).await.unwrap();
        assert!(store.has("admin").await.unwrap());
        assert_eq!(store.require("admin").await.unwrap(), identity("admin"));

        // Second put never overwrites
        let mut replacement = identity("admin").to_wallet_entry();
        replacement.credentials.certificate = "other".to_string();
        let replacement = Identity::from_wallet_entry("admin", replacement).unwrap();
        assert!(matches!(
            store.put(&replacement).await,
            Err(FabricError::DuplicateIdentity(_))
        ));
        assert_eq!(
            store.get("admin").await.unwrap().unwrap().certificate(),
            "cert-admin"
        );

        store.put(&identity("appUser")).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["admin", "appUser"]);
    }

    #[tokio::test]
    async fn test_memory_store_contract() {
        exercise_store(&MemoryCredentialStore::new()).await;
    }

    #[tokio::test]
    async fn test_file_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("wallet")).unwrap();
        exercise_store(&store).await;
    }
}
