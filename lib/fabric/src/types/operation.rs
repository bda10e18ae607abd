//! Transport-agnostic operation requests and results

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Whether an invocation goes through ordering or just queries a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationKind {
    /// Endorse, order and commit. Mutates ledger state.
    Submit,
    /// Query a single peer's current state.
    Evaluate,
}

/// Logical asset operations exposed by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetOperation {
    CreateAsset,
    ReadAsset,
    UpdateAsset,
    DeleteAsset,
    GetAllAssets,
    TransferAsset,
}

impl AssetOperation {
    pub const ALL: [AssetOperation; 6] = [
        AssetOperation::CreateAsset,
        AssetOperation::ReadAsset,
        AssetOperation::UpdateAsset,
        AssetOperation::DeleteAsset,
        AssetOperation::GetAllAssets,
        AssetOperation::TransferAsset,
    ];

    /// Operation name as used in routes.
    pub fn name(&self) -> &'static str {
        match self {
            AssetOperation::CreateAsset => "createAsset",
            AssetOperation::ReadAsset => "readAsset",
            AssetOperation::UpdateAsset => "updateAsset",
            AssetOperation::DeleteAsset => "deleteAsset",
            AssetOperation::GetAllAssets => "getAllAssets",
            AssetOperation::TransferAsset => "transferAsset",
        }
    }

    /// Contract function invoked for this operation.
    pub fn function(&self) -> &'static str {
        match self {
            AssetOperation::CreateAsset => "CreateAsset",
            AssetOperation::ReadAsset => "ReadAsset",
            AssetOperation::UpdateAsset => "UpdateAsset",
            AssetOperation::DeleteAsset => "DeleteAsset",
            AssetOperation::GetAllAssets => "GetAllAssets",
            AssetOperation::TransferAsset => "TransferAsset",
        }
    }

    pub fn kind(&self) -> InvocationKind {
        match self {
            AssetOperation::ReadAsset | AssetOperation::GetAllAssets => InvocationKind::Evaluate,
            AssetOperation::CreateAsset
            | AssetOperation::UpdateAsset
            | AssetOperation::DeleteAsset
            | AssetOperation::TransferAsset => InvocationKind::Submit,
        }
    }

    /// Media type of the contract's success payload. Reads and creates
    /// return asset JSON; the other functions return bare text or nothing.
    pub fn payload_content_type(&self) -> &'static str {
        match self {
            AssetOperation::CreateAsset
            | AssetOperation::ReadAsset
            | AssetOperation::GetAllAssets => "application/json",
            AssetOperation::UpdateAsset
            | AssetOperation::DeleteAsset
            | AssetOperation::TransferAsset => "text/plain; charset=utf-8",
        }
    }

    pub fn success_status(&self) -> StatusClass {
        match self {
            AssetOperation::CreateAsset => StatusClass::Created,
            _ => StatusClass::Success,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

/// Inbound request as handed over by the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub operation: AssetOperation,
    pub path_params: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
}

impl OperationRequest {
    pub fn new(operation: AssetOperation) -> Self {
        Self {
            operation,
            path_params: HashMap::new(),
            body: None,
        }
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Outcome classification, independent of any transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Created,
    Success,
    BadRequest,
    NotFound,
    Conflict,
    /// Endorsement, ordering or connectivity failure; may succeed if retried later.
    Unavailable,
    Timeout,
    Internal,
}

impl StatusClass {
    /// HTTP status code conventionally used for this class.
    pub fn http_status(&self) -> u16 {
        match self {
            StatusClass::Created => 201,
            StatusClass::Success => 200,
            StatusClass::BadRequest => 400,
            StatusClass::NotFound => 404,
            StatusClass::Conflict => 409,
            StatusClass::Unavailable => 503,
            StatusClass::Timeout => 504,
            StatusClass::Internal => 500,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StatusClass::Created | StatusClass::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultBody {
    /// Raw bytes returned by the contract.
    Payload(Vec<u8>),
    Error(String),
}

/// Error payload shape: `{"Error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "Error")]
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub status: StatusClass,
    pub body: ResultBody,
}

impl OperationResult {
    pub fn payload(status: StatusClass, payload: Vec<u8>) -> Self {
        Self {
            status,
            body: ResultBody::Payload(payload),
        }
    }

    pub fn error(status: StatusClass, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ResultBody::Error(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.body {
            ResultBody::Error(msg) => Some(msg),
            ResultBody::Payload(_) => None,
        }
    }

    /// Body bytes as they go on the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        match &self.body {
            ResultBody::Payload(bytes) => bytes.clone(),
            ResultBody::Error(msg) => serde_json::to_vec(&ErrorBody { error: msg.clone() })
                .unwrap_or_else(|_| br#"{"Error":"unserializable error"}"#.to_vec()),
        }
    }
}
