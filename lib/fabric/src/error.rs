//! Fabric Error Types

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Why a contract invocation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationFailure {
    /// The contract itself rejected the call; carries its message.
    Contract(String),
    /// Endorsement policy could not be satisfied.
    Endorsement(String),
    /// Ordering or commit did not produce a valid transaction.
    Commit(String),
    /// The peer could not be reached or answered garbage.
    Transport(String),
    /// No answer within the configured per-call timeout.
    Timeout(Duration),
}

impl InvocationFailure {
    /// The message a caller should see.
    pub fn message(&self) -> String {
        match self {
            InvocationFailure::Contract(msg)
            | InvocationFailure::Endorsement(msg)
            | InvocationFailure::Commit(msg)
            | InvocationFailure::Transport(msg) => msg.clone(),
            InvocationFailure::Timeout(after) => {
                format!("no response after {}ms", after.as_millis())
            }
        }
    }
}

impl fmt::Display for InvocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationFailure::Contract(msg) => write!(f, "contract error: {}", msg),
            InvocationFailure::Endorsement(msg) => write!(f, "endorsement failed: {}", msg),
            InvocationFailure::Commit(msg) => write!(f, "commit failed: {}", msg),
            InvocationFailure::Transport(msg) => write!(f, "transport error: {}", msg),
            InvocationFailure::Timeout(after) => {
                write!(f, "timed out after {}ms", after.as_millis())
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum FabricError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Identity already exists: {0}")]
    DuplicateIdentity(String),

    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    #[error("Enrollment failed: {0}")]
    Enrollment(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Principal already registered: {0}")]
    DuplicatePrincipal(String),

    #[error("Provisioning of {principal} failed: {source}")]
    Provisioning {
        principal: String,
        #[source]
        source: Box<FabricError>,
    },

    #[error("Gateway session error: {0}")]
    Session(String),

    #[error("Gateway session is closed")]
    SessionClosed,

    #[error("Invocation of {function} failed: {failure}")]
    Invocation {
        function: String,
        failure: InvocationFailure,
    },

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Invalid proposal: {0}")]
    Proposal(String),

    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FabricError {
    pub(crate) fn provisioning(principal: &str, source: FabricError) -> Self {
        FabricError::Provisioning {
            principal: principal.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn invocation(function: &str, failure: InvocationFailure) -> Self {
        FabricError::Invocation {
            function: function.to_string(),
            failure,
        }
    }
}

impl From<p256::pkcs8::Error> for FabricError {
    fn from(e: p256::pkcs8::Error) -> Self {
        FabricError::Crypto(e.to_string())
    }
}

impl From<rcgen::Error> for FabricError {
    fn from(e: rcgen::Error) -> Self {
        FabricError::Crypto(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FabricError::DuplicateIdentity("admin".to_string());
        assert_eq!(err.to_string(), "Identity already exists: admin");

        let err = FabricError::SessionClosed;
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn test_provisioning_wraps_source() {
        use std::error::Error;

        let err = FabricError::provisioning(
            "appUser",
            FabricError::Authorization("caller is not a registrar".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("appUser"));
        assert!(msg.contains("caller is not a registrar"));
        let source = err.source().unwrap();
        assert!(source.to_string().starts_with("Not authorized"));
    }

    #[test]
    fn test_invocation_display() {
        let err = FabricError::invocation(
            "ReadAsset",
            InvocationFailure::Contract("the asset asset9 does not exist".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("ReadAsset"));
        assert!(msg.contains("the asset asset9 does not exist"));
    }

    #[test]
    fn test_failure_message_strips_kind() {
        let failure = InvocationFailure::Endorsement("policy not satisfied".to_string());
        assert_eq!(failure.message(), "policy not satisfied");
        assert!(failure.to_string().starts_with("endorsement failed"));

        let failure = InvocationFailure::Timeout(Duration::from_millis(1500));
        assert_eq!(failure.message(), "no response after 1500ms");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FabricError = io_err.into();
        assert!(matches!(err, FabricError::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: Result<String, serde_json::Error> = serde_json::from_str("invalid json");
        let err: FabricError = json_result.unwrap_err().into();
        assert!(matches!(err, FabricError::Json(_)));
    }
}
