//! In-memory credential store

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::FabricError;
use crate::store::CredentialStore;
use crate::types::Identity;

#[derive(Default)]
pub struct MemoryCredentialStore {
    identities: RwLock<HashMap<String, Identity>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, principal: &str) -> Result<Option<Identity>, FabricError> {
        let identities = self
            .identities
            .read()
            .map_err(|_| FabricError::Storage("Credential store lock poisoned".to_string()))?;
        Ok(identities.get(principal).cloned())
    }

    async fn put(&self, identity: &Identity) -> Result<(), FabricError> {
        let mut identities = self
            .identities
            .write()
            .map_err(|_| FabricError::Storage("Credential store lock poisoned".to_string()))?;
        if identities.contains_key(identity.principal()) {
            return Err(FabricError::DuplicateIdentity(
                identity.principal().to_string(),
            ));
        }
        identities.insert(identity.principal().to_string(), identity.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, FabricError> {
        let identities = self
            .identities
            .read()
            .map_err(|_| FabricError::Storage("Credential store lock poisoned".to_string()))?;
        let mut principals: Vec<String> = identities.keys().cloned().collect();
        principals.sort();
        Ok(principals)
    }
}
