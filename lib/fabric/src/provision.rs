//! Startup identity provisioning.
//!
//! Guarantees the admin identity exists (enrolled with the bootstrap secret),
//! then guarantees the application user exists (registered under admin and
//! enrolled). Each step is skipped when its identity is already stored, so
//! running provisioning again never re-issues credentials.
//!
//! The application user is registered with a secret derived from the admin's
//! stored key. If a run registers the user but dies before the identity is
//! stored, the next run finds the principal already registered and enrolls
//! with the same secret instead of failing.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::ca::CertificateAuthority;
use crate::error::FabricError;
use crate::store::CredentialStore;
use crate::types::{Identity, RegistrationRequest};

const SECRET_CONTEXT: &[u8] = b"fabric-provisioning-secret";

/// Who to provision and with which bootstrap material.
#[derive(Clone)]
pub struct ProvisioningPlan {
    pub admin_id: String,
    pub admin_secret: String,
    pub app_user_id: String,
    pub app_user_affiliation: String,
    pub msp_id: String,
}

impl std::fmt::Debug for ProvisioningPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningPlan")
            .field("admin_id", &self.admin_id)
            .field("app_user_id", &self.app_user_id)
            .field("app_user_affiliation", &self.app_user_affiliation)
            .field("msp_id", &self.msp_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningReport {
    pub admin: ProvisionOutcome,
    pub app_user: ProvisionOutcome,
}

pub struct IdentityProvisioner {
    ca: Arc<dyn CertificateAuthority>,
    store: Arc<dyn CredentialStore>,
    plan: ProvisioningPlan,
}

impl IdentityProvisioner {
    pub fn new(
        ca: Arc<dyn CertificateAuthority>,
        store: Arc<dyn CredentialStore>,
        plan: ProvisioningPlan,
    ) -> Self {
        Self { ca, store, plan }
    }

    /// Run both steps in order. Any failure is a `Provisioning` error naming the principal.
    pub async fn provision(&self) -> Result<ProvisioningReport, FabricError> {
        let admin = self
            .ensure_admin()
            .await
            .map_err(|e| FabricError::provisioning(&self.plan.admin_id, e))?;

        let app_user = self
            .ensure_app_user()
            .await
            .map_err(|e| FabricError::provisioning(&self.plan.app_user_id, e))?;

        Ok(ProvisioningReport { admin, app_user })
    }

    async fn ensure_admin(&self) -> Result<ProvisionOutcome, FabricError> {
        let admin_id = &self.plan.admin_id;
        if self.store.has(admin_id).await? {
            tracing::info!("Identity {} already present in credential store", admin_id);
            return Ok(ProvisionOutcome::AlreadyPresent);
        }

        tracing::info!("Enrolling admin identity {}", admin_id);
        let enrollment = self.ca.enroll(admin_id, &self.plan.admin_secret).await?;
        let identity = Identity::new(admin_id.as_str(), enrollment, self.plan.msp_id.as_str());
        self.store.put(&identity).await?;

        tracing::info!("Enrolled admin {} and stored it", admin_id);
        Ok(ProvisionOutcome::Created)
    }

    async fn ensure_app_user(&self) -> Result<ProvisionOutcome, FabricError> {
        let user_id = &self.plan.app_user_id;
        if self.store.has(user_id).await? {
            tracing::info!("Identity {} already present in credential store", user_id);
            return Ok(ProvisionOutcome::AlreadyPresent);
        }

        let admin = self.store.require(&self.plan.admin_id).await?;

        tracing::info!(
            "Registering {} under {} in affiliation {}",
            user_id,
            admin.principal(),
            self.plan.app_user_affiliation
        );
        let request = RegistrationRequest {
            secret: Some(enrollment_secret(&admin, user_id)),
            ..RegistrationRequest::client(
                user_id.as_str(),
                self.plan.app_user_affiliation.as_str(),
            )
        };
        let secret = match self.ca.register(&request, &admin).await {
            Ok(issued) => issued.secret,
            Err(FabricError::DuplicatePrincipal(_)) => {
                tracing::warn!(
                    "{} is registered but not in the credential store; enrolling with its provisioning secret",
                    user_id
                );
                request.secret.unwrap_or_default()
            }
            Err(e) => return Err(e),
        };

        let enrollment = self.ca.enroll(user_id, &secret).await?;
        let identity = Identity::new(user_id.as_str(), enrollment, self.plan.msp_id.as_str());
        self.store.put(&identity).await?;

        tracing::info!("Registered and enrolled {} and stored it", user_id);
        Ok(ProvisionOutcome::Created)
    }
}

/// Secret a registrar hands out for `principal`: stable for as long as the
/// registrar keeps its key, unguessable without it.
fn enrollment_secret(registrar: &Identity, principal: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(SECRET_CONTEXT);
    hasher.update(registrar.private_key().as_bytes());
    hasher.update(principal.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}
