//! Fabric identity and asset ledger library
//!
//! Credential storage, Fabric CA enrollment, startup provisioning, the ledger
//! gateway session and the asset transaction router.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

pub mod ca;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod proto;
pub mod provision;
pub mod router;
pub mod store;
pub mod types;

pub use ca::{CertificateAuthority, FabricCaClient};
pub use config::{Config, ConnectionProfile};
pub use error::{FabricError, InvocationFailure};
pub use gateway::{
    Contract, Gateway, GatewayOptions, GrpcTransport, LedgerTransport, Network, Session,
};
#[cfg(any(test, feature = "testing"))]
pub use gateway::InMemoryLedger;
pub use provision::{IdentityProvisioner, ProvisionOutcome, ProvisioningPlan, ProvisioningReport};
pub use router::{AssetRouter, ID_PARAM, classify};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use types::{
    AssetOperation, AssetRecord, AssetUpdate, Enrollment, EnrollmentSecret, ErrorBody, Identity,
    InvocationKind, OperationRequest, OperationResult, RegistrationRequest, ResultBody,
    StatusClass, TransferRequest,
};
