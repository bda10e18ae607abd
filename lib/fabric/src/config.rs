//! Service configuration and the network connection profile.
//!
//! Everything is read once at startup into [`Config`]; nothing below the
//! service entry point touches the environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FabricError;
use crate::provision::ProvisioningPlan;

const DEFAULT_PROFILE_PATH: &str =
    "../test-network/organizations/peerOrganizations/org1.example.com/connection-org1.json";

/// Immutable startup configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub profile_path: PathBuf,
    pub wallet_path: PathBuf,
    /// Key of the CA entry in the profile's `certificateAuthorities`
    pub ca_name: String,
    pub msp_id: String,
    pub admin_id: String,
    pub admin_secret: String,
    pub app_user_id: String,
    pub app_user_affiliation: String,
    /// Principal the gateway session runs under
    pub gateway_identity: String,
    pub channel: String,
    pub chaincode: String,
    pub discovery: bool,
    pub as_localhost: bool,
    pub ca_timeout: Duration,
    pub evaluate_timeout: Duration,
    pub submit_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, FabricError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FabricError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("PORT", "3000")
            .parse()
            .map_err(|e| FabricError::Config(format!("PORT must be a valid number: {}", e)))?;

        Ok(Self {
            port,
            profile_path: PathBuf::from(var("CONNECTION_PROFILE", DEFAULT_PROFILE_PATH)),
            wallet_path: PathBuf::from(var("WALLET_PATH", "./wallet")),
            ca_name: var("CA_NAME", "ca.org1.example.com"),
            msp_id: var("MSP_ID", "Org1MSP"),
            admin_id: var("ADMIN_ID", "admin"),
            admin_secret: var("ADMIN_SECRET", "adminpw"),
            app_user_id: var("APP_USER_ID", "appUser"),
            app_user_affiliation: var("APP_USER_AFFILIATION", "org1.department1"),
            gateway_identity: var("GATEWAY_IDENTITY", "admin"),
            channel: var("CHANNEL_NAME", "mychannel"),
            chaincode: var("CHAINCODE_NAME", "basic"),
            discovery: parse_bool("DISCOVERY_ENABLED", &var("DISCOVERY_ENABLED", "true"))?,
            as_localhost: parse_bool(
                "DISCOVERY_AS_LOCALHOST",
                &var("DISCOVERY_AS_LOCALHOST", "true"),
            )?,
            ca_timeout: parse_secs("CA_TIMEOUT_SECS", &var("CA_TIMEOUT_SECS", "10"))?,
            evaluate_timeout: parse_secs(
                "EVALUATE_TIMEOUT_SECS",
                &var("EVALUATE_TIMEOUT_SECS", "5"),
            )?,
            submit_timeout: parse_secs("SUBMIT_TIMEOUT_SECS", &var("SUBMIT_TIMEOUT_SECS", "30"))?,
        })
    }

    pub fn load_profile(&self) -> Result<ConnectionProfile, FabricError> {
        ConnectionProfile::from_file(&self.profile_path)
    }

    pub fn provisioning_plan(&self) -> ProvisioningPlan {
        ProvisioningPlan {
            admin_id: self.admin_id.clone(),
            admin_secret: self.admin_secret.clone(),
            app_user_id: self.app_user_id.clone(),
            app_user_affiliation: self.app_user_affiliation.clone(),
            msp_id: self.msp_id.clone(),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, FabricError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(FabricError::Config(format!(
            "{} must be a boolean, got {:?}",
            key, other
        ))),
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, FabricError> {
    let secs: u64 = value
        .trim()
        .parse()
        .map_err(|e| FabricError::Config(format!("{} must be a number of seconds: {}", key, e)))?;
    if secs == 0 {
        return Err(FabricError::Config(format!("{} must be positive", key)));
    }
    Ok(Duration::from_secs(secs))
}

// ==================== Connection Profile ====================

/// Common connection profile describing the client's organization, its
/// peers and certificate authorities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    #[serde(default)]
    pub name: String,
    pub client: ClientSection,
    pub organizations: HashMap<String, OrganizationSection>,
    #[serde(default)]
    pub peers: HashMap<String, PeerSection>,
    #[serde(default)]
    pub certificate_authorities: HashMap<String, CertificateAuthoritySection>,
    /// Optional; when present, channel lookups are checked against it
    #[serde(default)]
    pub channels: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSection {
    pub organization: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSection {
    pub mspid: String,
    #[serde(default)]
    pub peers: Vec<String>,
    #[serde(default)]
    pub certificate_authorities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSection {
    pub url: String,
    #[serde(default, rename = "tlsCACerts")]
    pub tls_ca_certs: Option<TlsCaCerts>,
    #[serde(default)]
    pub grpc_options: Option<GrpcOptions>,
}

impl PeerSection {
    /// Host name the peer's TLS certificate is issued for, when it differs from the URL.
    pub fn ssl_target_name(&self) -> Option<&str> {
        self.grpc_options
            .as_ref()
            .and_then(|o| o.ssl_target_name_override.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrpcOptions {
    #[serde(default, rename = "ssl-target-name-override")]
    pub ssl_target_name_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAuthoritySection {
    pub url: String,
    #[serde(default)]
    pub ca_name: Option<String>,
    #[serde(default, rename = "tlsCACerts")]
    pub tls_ca_certs: Option<TlsCaCerts>,
    #[serde(default)]
    pub http_options: Option<HttpOptions>,
}

impl CertificateAuthoritySection {
    /// Whether server certificates are verified. Defaults to true.
    pub fn verify_tls(&self) -> bool {
        self.http_options
            .as_ref()
            .and_then(|o| o.verify)
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpOptions {
    #[serde(default)]
    pub verify: Option<bool>,
}

/// TLS roots, either inline PEM (one or many) or a path to a PEM file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsCaCerts {
    #[serde(default)]
    pub pem: Option<PemList>,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PemList {
    One(String),
    Many(Vec<String>),
}

impl TlsCaCerts {
    /// All root certificates in PEM form.
    pub fn pems(&self) -> Result<Vec<String>, FabricError> {
        let mut pems = match &self.pem {
            Some(PemList::One(pem)) => vec![pem.clone()],
            Some(PemList::Many(pems)) => pems.clone(),
            None => Vec::new(),
        };
        if let Some(path) = &self.path {
            let pem = std::fs::read_to_string(path).map_err(|e| {
                FabricError::Config(format!("Failed to read {}: {}", path.display(), e))
            })?;
            pems.push(pem);
        }
        Ok(pems)
    }
}

impl ConnectionProfile {
    pub fn from_file(path: &Path) -> Result<Self, FabricError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FabricError::Config(format!(
                "Failed to read connection profile {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, FabricError> {
        serde_json::from_str(json)
            .map_err(|e| FabricError::Config(format!("Invalid connection profile: {}", e)))
    }

    /// The organization this client belongs to.
    pub fn client_organization(&self) -> Result<&OrganizationSection, FabricError> {
        self.organizations
            .get(&self.client.organization)
            .ok_or_else(|| {
                FabricError::Config(format!(
                    "Client organization {} not found in profile",
                    self.client.organization
                ))
            })
    }

    pub fn certificate_authority(
        &self,
        name: &str,
    ) -> Result<&CertificateAuthoritySection, FabricError> {
        self.certificate_authorities
            .get(name)
            .ok_or_else(|| FabricError::Config(format!("CA {} not found in profile", name)))
    }

    /// Peers of the client organization, in profile order.
    pub fn organization_peers(&self) -> Result<Vec<(&str, &PeerSection)>, FabricError> {
        let org = self.client_organization()?;
        org.peers
            .iter()
            .map(|name| {
                self.peers
                    .get(name)
                    .map(|peer| (name.as_str(), peer))
                    .ok_or_else(|| {
                        FabricError::Config(format!("Peer {} not found in profile", name))
                    })
            })
            .collect()
    }

    pub fn declares_channel(&self, channel: &str) -> bool {
        match &self.channels {
            Some(channels) => channels.contains_key(channel),
            None => true,
        }
    }
}
