//! Certificate Authority Client
//!
//! HTTP client for a Fabric CA server, implementing the CertificateAuthority trait.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;

use crate::config::ConnectionProfile;
use crate::crypto::{self, CertificateInfo};
use crate::error::FabricError;
use crate::types::{Enrollment, EnrollmentSecret, Identity, RegistrationRequest};

const ENROLL_PATH: &str = "/api/v1/enroll";
const REGISTER_PATH: &str = "/api/v1/register";

/// Enrollment authority operations.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Exchange a principal's secret for a certificate over a freshly generated key.
    async fn enroll(&self, principal: &str, secret: &str) -> Result<Enrollment, FabricError>;

    /// Register a new principal under `registrar`'s authority, returning its one-time secret.
    async fn register(
        &self,
        request: &RegistrationRequest,
        registrar: &Identity,
    ) -> Result<EnrollmentSecret, FabricError>;
}

// ==================== CA API Types ====================

#[derive(Debug, Serialize, Deserialize)]
struct EnrollRequest {
    certificate_request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    caname: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EnrollResult {
    #[serde(rename = "Cert")]
    cert: String, // base64 encoded PEM
}

#[derive(Debug, Serialize, Deserialize)]
struct RegisterRequest {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    affiliation: String,
    max_enrollments: i32,
    attrs: Vec<RegisterAttribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    caname: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegisterAttribute {
    name: String,
    value: String,
    ecert: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegisterResult {
    secret: String,
}

#[derive(Debug, Deserialize)]
struct CaResponse<T> {
    #[serde(default)]
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<CaMessage>,
}

#[derive(Debug, Deserialize)]
struct CaMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaOperation {
    Enroll,
    Register,
}

// ==================== Fabric CA Client ====================

/// HTTP client for a Fabric CA.
pub struct FabricCaClient {
    client: Client,
    base_url: String,
    ca_name: Option<String>,
}

impl FabricCaClient {
    /// Client using the platform's default TLS roots.
    pub fn new(
        base_url: &str,
        ca_name: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FabricError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FabricError::Config(format!("Failed to build CA client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            ca_name,
        })
    }

    /// Client for the CA named `ca_key` in the profile, trusting only its TLS roots.
    pub fn from_profile(
        profile: &ConnectionProfile,
        ca_key: &str,
        timeout: Duration,
    ) -> Result<Self, FabricError> {
        let ca = profile.certificate_authority(ca_key)?;

        let mut builder = Client::builder()
            .timeout(timeout)
            .tls_built_in_root_certs(false);

        if let Some(certs) = &ca.tls_ca_certs {
            for pem in certs.pems()? {
                let root = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(|e| {
                    FabricError::Config(format!("Invalid TLS root for {}: {}", ca_key, e))
                })?;
                builder = builder.add_root_certificate(root);
            }
        }

        if !ca.verify_tls() {
            tracing::warn!(
                "TLS verification disabled for CA {} by connection profile; do not run this way in production",
                ca_key
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| FabricError::Config(format!("Failed to build CA client: {}", e)))?;

        Ok(Self {
            client,
            base_url: ca.url.trim_end_matches('/').to_string(),
            ca_name: ca.ca_name.clone(),
        })
    }

    fn request_failed(operation: CaOperation, e: reqwest::Error) -> FabricError {
        FabricError::Enrollment(format!("CA {:?} request failed: {}", operation, e))
    }

    /// Decode the CA envelope, turning unsuccessful responses into typed errors.
    async fn read_result<T: DeserializeOwned>(
        operation: CaOperation,
        principal: &str,
        response: reqwest::Response,
    ) -> Result<T, FabricError> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::request_failed(operation, e))?;

        let envelope: Option<CaResponse<T>> = serde_json::from_slice(&body).ok();

        match envelope {
            Some(CaResponse {
                success: true,
                result: Some(result),
                ..
            }) if status.is_success() => Ok(result),
            Some(envelope) => Err(classify_failure(
                operation,
                principal,
                status,
                &envelope.errors,
            )),
            None => Err(classify_failure(operation, principal, status, &[])),
        }
    }

    /// `Authorization` header value for a token-authenticated request.
    pub fn auth_token(
        registrar: &Identity,
        method: &str,
        path: &str,
        body: &[u8],
    ) -> Result<String, FabricError> {
        let key = crypto::signing_key(registrar.private_key())?;
        let cert_b64 = STANDARD.encode(registrar.certificate());
        let payload = format!(
            "{}.{}.{}.{}",
            method,
            STANDARD.encode(path),
            STANDARD.encode(body),
            cert_b64
        );
        let signature = crypto::sign(&key, payload.as_bytes());
        Ok(format!("{}.{}", cert_b64, STANDARD.encode(signature)))
    }
}

fn classify_failure(
    operation: CaOperation,
    principal: &str,
    status: StatusCode,
    errors: &[CaMessage],
) -> FabricError {
    let detail = if errors.is_empty() {
        format!("CA responded with {}", status)
    } else {
        errors
            .iter()
            .map(|e| format!("[{}] {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    };

    match operation {
        CaOperation::Enroll => FabricError::Enrollment(format!("{}: {}", principal, detail)),
        CaOperation::Register => {
            let lower = detail.to_ascii_lowercase();
            if lower.contains("already registered") {
                FabricError::DuplicatePrincipal(principal.to_string())
            } else if status == StatusCode::UNAUTHORIZED
                || status == StatusCode::FORBIDDEN
                || lower.contains("authoriz")
                || lower.contains("registrar")
            {
                FabricError::Authorization(detail)
            } else {
                FabricError::Enrollment(format!("register {}: {}", principal, detail))
            }
        }
    }
}

/// Enrolled certificate must name the principal and carry our key.
fn check_enrolled_certificate(
    principal: &str,
    certificate: &str,
    private_key_pem: &str,
) -> Result<(), FabricError> {
    let info = CertificateInfo::from_pem(certificate)
        .map_err(|e| FabricError::Enrollment(format!("CA returned unusable certificate: {}", e)))?;

    if info.common_name.as_deref() != Some(principal) {
        return Err(FabricError::Enrollment(format!(
            "CA issued certificate for {:?}, expected {}",
            info.common_name, principal
        )));
    }

    let key = crypto::signing_key(private_key_pem)?;
    if info.public_key != crypto::public_key_bytes(&key) {
        return Err(FabricError::Enrollment(
            "CA issued certificate for a different key".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl CertificateAuthority for FabricCaClient {
    async fn enroll(&self, principal: &str, secret: &str) -> Result<Enrollment, FabricError> {
        let url = format!("{}{}", self.base_url, ENROLL_PATH);

        let key_pair = crypto::generate_key_pair()?;
        let request = EnrollRequest {
            certificate_request: crypto::certificate_request(principal, &key_pair)?,
            caname: self.ca_name.clone(),
        };

        tracing::debug!("Enrolling {} at {}", principal, url);

        let response = self
            .client
            .post(&url)
            .basic_auth(principal, Some(secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::request_failed(CaOperation::Enroll, e))?;

        let result: EnrollResult =
            Self::read_result(CaOperation::Enroll, principal, response).await?;

        let certificate = STANDARD
            .decode(&result.cert)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| FabricError::Enrollment("CA returned malformed Cert".to_string()))?;

        let private_key = key_pair.serialize_pem();
        check_enrolled_certificate(principal, &certificate, &private_key)?;

        Ok(Enrollment {
            certificate,
            private_key,
        })
    }

    async fn register(
        &self,
        request: &RegistrationRequest,
        registrar: &Identity,
    ) -> Result<EnrollmentSecret, FabricError> {
        let url = format!("{}{}", self.base_url, REGISTER_PATH);

        let body = serde_json::to_vec(&RegisterRequest {
            id: request.principal.clone(),
            kind: request.role.clone(),
            affiliation: request.affiliation.clone(),
            max_enrollments: request.max_enrollments,
            attrs: request
                .attributes
                .iter()
                .map(|(name, value)| RegisterAttribute {
                    name: name.clone(),
                    value: value.clone(),
                    ecert: false,
                })
                .collect(),
            secret: request.secret.clone(),
            caname: self.ca_name.clone(),
        })?;

        let token = Self::auth_token(registrar, "POST", REGISTER_PATH, &body)?;

        tracing::debug!(
            "Registering {} as {} under {}",
            request.principal,
            request.role,
            registrar.principal()
        );

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| Self::request_failed(CaOperation::Register, e))?;

        let result: RegisterResult =
            Self::read_result(CaOperation::Register, &request.principal, response).await?;

        Ok(EnrollmentSecret {
            principal: request.principal.clone(),
            secret: result.secret,
        })
    }
}
