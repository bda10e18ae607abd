//! Shared types: identities, assets, and router operations

mod asset;
mod identity;
mod operation;

pub use asset::{AssetRecord, AssetUpdate, TransferRequest};
pub use identity::{
    Enrollment, EnrollmentSecret, Identity, RegistrationRequest, WalletCredentials, WalletEntry,
    X509_IDENTITY_TYPE,
};
pub use operation::{
    AssetOperation, ErrorBody, InvocationKind, OperationRequest, OperationResult, ResultBody,
    StatusClass,
};
