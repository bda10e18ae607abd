//! Asset Transaction Router
//!
//! Maps logical asset operations onto contract invocations and turns the
//! outcome into a transport-agnostic [`OperationResult`]. Every request is
//! one invocation: no retries, no fan-out.

use serde::de::DeserializeOwned;

use crate::error::{FabricError, InvocationFailure};
use crate::gateway::Contract;
use crate::types::{
    AssetOperation, AssetRecord, AssetUpdate, InvocationKind, OperationRequest, OperationResult,
    StatusClass, TransferRequest,
};

/// Path parameter carrying the asset ID.
pub const ID_PARAM: &str = "ID";

#[derive(Clone)]
pub struct AssetRouter {
    contract: Contract,
}

impl AssetRouter {
    pub fn new(contract: Contract) -> Self {
        Self { contract }
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Validate, invoke and classify a request.
    pub async fn dispatch(&self, request: OperationRequest) -> OperationResult {
        let operation = request.operation;
        match operation {
            AssetOperation::CreateAsset => match body::<AssetRecord>(&request) {
                Ok(asset) => self.create_asset(asset).await,
                Err(result) => result,
            },
            AssetOperation::ReadAsset => match path_id(&request) {
                Ok(id) => self.read_asset(id).await,
                Err(result) => result,
            },
            AssetOperation::UpdateAsset => {
                let parsed = path_id(&request)
                    .and_then(|id| body::<AssetUpdate>(&request).map(|update| (id, update)));
                match parsed {
                    Ok((id, update)) => self.update_asset(id, update).await,
                    Err(result) => result,
                }
            }
            AssetOperation::DeleteAsset => match path_id(&request) {
                Ok(id) => self.delete_asset(id).await,
                Err(result) => result,
            },
            AssetOperation::GetAllAssets => self.get_all_assets().await,
            AssetOperation::TransferAsset => match body::<TransferRequest>(&request) {
                Ok(transfer) => self.transfer_asset(transfer).await,
                Err(result) => result,
            },
        }
    }

    pub async fn create_asset(&self, asset: AssetRecord) -> OperationResult {
        if let Err(result) = require_id(&asset.id) {
            return result;
        }
        self.invoke(AssetOperation::CreateAsset, asset.to_args())
            .await
    }

    pub async fn read_asset(&self, id: &str) -> OperationResult {
        if let Err(result) = require_id(id) {
            return result;
        }
        self.invoke(AssetOperation::ReadAsset, vec![id.to_string()])
            .await
    }

    /// The ID comes from the caller; any ID in the update body is ignored.
    pub async fn update_asset(&self, id: &str, update: AssetUpdate) -> OperationResult {
        if let Err(result) = require_id(id) {
            return result;
        }
        self.invoke(AssetOperation::UpdateAsset, update.into_record(id).to_args())
            .await
    }

    pub async fn delete_asset(&self, id: &str) -> OperationResult {
        if let Err(result) = require_id(id) {
            return result;
        }
        self.invoke(AssetOperation::DeleteAsset, vec![id.to_string()])
            .await
    }

    pub async fn get_all_assets(&self) -> OperationResult {
        self.invoke(AssetOperation::GetAllAssets, Vec::new()).await
    }

    pub async fn transfer_asset(&self, transfer: TransferRequest) -> OperationResult {
        if let Err(result) = require_id(&transfer.id) {
            return result;
        }
        if transfer.owner.trim().is_empty() {
            return OperationResult::error(StatusClass::BadRequest, "Owner must not be empty");
        }
        self.invoke(
            AssetOperation::TransferAsset,
            vec![transfer.id, transfer.owner],
        )
        .await
    }

    async fn invoke(&self, operation: AssetOperation, args: Vec<String>) -> OperationResult {
        let function = operation.function();
        let outcome = match operation.kind() {
            InvocationKind::Submit => self.contract.submit(function, &args).await,
            InvocationKind::Evaluate => self.contract.evaluate(function, &args).await,
        };

        match outcome {
            Ok(payload) => OperationResult::payload(operation.success_status(), payload),
            Err(e) => {
                let (status, message) = classify(&e);
                tracing::warn!(
                    "{} failed ({:?}): {}",
                    operation.name(),
                    status,
                    e
                );
                OperationResult::error(status, message)
            }
        }
    }
}

/// Status class and caller-facing message for a failed invocation.
pub fn classify(error: &FabricError) -> (StatusClass, String) {
    match error {
        FabricError::Invocation { failure, .. } => {
            let message = failure.message();
            let status = match failure {
                InvocationFailure::Contract(msg) if msg.contains("does not exist") => {
                    StatusClass::NotFound
                }
                InvocationFailure::Contract(msg) if msg.contains("already exists") => {
                    StatusClass::Conflict
                }
                InvocationFailure::Contract(_) => StatusClass::BadRequest,
                InvocationFailure::Endorsement(_)
                | InvocationFailure::Commit(_)
                | InvocationFailure::Transport(_) => StatusClass::Unavailable,
                InvocationFailure::Timeout(_) => StatusClass::Timeout,
            };
            (status, message)
        }
        FabricError::SessionClosed | FabricError::Session(_) => {
            (StatusClass::Unavailable, error.to_string())
        }
        other => (StatusClass::Internal, other.to_string()),
    }
}

fn require_id(id: &str) -> Result<(), OperationResult> {
    if id.trim().is_empty() {
        return Err(OperationResult::error(
            StatusClass::BadRequest,
            "ID must not be empty",
        ));
    }
    Ok(())
}

fn path_id(request: &OperationRequest) -> Result<&str, OperationResult> {
    request
        .path_params
        .get(ID_PARAM)
        .map(String::as_str)
        .ok_or_else(|| {
            OperationResult::error(
                StatusClass::BadRequest,
                format!("Missing path parameter {}", ID_PARAM),
            )
        })
}

fn body<T: DeserializeOwned>(request: &OperationRequest) -> Result<T, OperationResult> {
    let value = request.body.clone().ok_or_else(|| {
        OperationResult::error(StatusClass::BadRequest, "Missing request body")
    })?;
    serde_json::from_value(value).map_err(|e| {
        OperationResult::error(
            StatusClass::BadRequest,
            format!("Invalid request body: {}", e),
        )
    })
}
