//! Fabric Gateway gRPC transport
//!
//! Talks to the `gateway.Gateway` service a peer exposes on its `grpcs://`
//! listener:
//!
//! - `Evaluate` runs a proposal on one peer and returns the contract response
//! - `Endorse` collects endorsements and returns the prepared transaction
//! - `Submit` sends the client-signed transaction to ordering
//! - `CommitStatus` waits for the validation code of the committed transaction
//!
//! Failures carry `gateway.ErrorDetail` entries, one per peer, in the status details.

use std::time::Duration;

use async_trait::async_trait;
use prost::Message;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tonic::{Code, Status};

use crate::config::ConnectionProfile;
use crate::error::{FabricError, InvocationFailure};
use crate::gateway::GatewayOptions;
use crate::gateway::proposal::{SignedProposal, Signer};
use crate::gateway::transport::LedgerTransport;
use crate::proto::gateway::{
    CommitStatusRequest, EndorseRequest, ErrorDetail, EvaluateRequest, SignedCommitStatusRequest,
    SubmitRequest, gateway_client::GatewayClient,
};
use crate::proto::{common, google, protos};

const ERROR_DETAIL_TYPE: &str = "gateway.ErrorDetail";

/// Chaincode responses at or above this status are errors.
const CHAINCODE_ERROR_THRESHOLD: i32 = 400;

pub struct GrpcTransport {
    client: GatewayClient<Channel>,
    address: String,
    /// Organizations endorsement and evaluation are pinned to. Empty leaves
    /// the choice to the gateway peer's discovery.
    organizations: Vec<String>,
    evaluate_timeout: Duration,
    submit_timeout: Duration,
}

impl GrpcTransport {
    /// Connect to the client organization's first peer, which acts as the gateway.
    pub async fn connect(
        profile: &ConnectionProfile,
        options: &GatewayOptions,
    ) -> Result<Self, FabricError> {
        let org = profile.client_organization()?;
        let peers = profile.organization_peers()?;
        let (gateway_name, gateway_peer) = peers.first().ok_or_else(|| {
            FabricError::Config(format!(
                "Organization {} has no peers in profile",
                profile.client.organization
            ))
        })?;

        let target = peer_target(&gateway_peer.url, options.as_localhost)?;
        let mut endpoint = Endpoint::from_shared(target.uri.clone())
            .map_err(|e| {
                FabricError::Config(format!("Invalid peer endpoint {}: {}", target.uri, e))
            })?
            .connect_timeout(options.evaluate_timeout);

        if target.tls {
            let roots = match &gateway_peer.tls_ca_certs {
                Some(certs) => certs.pems()?,
                None => Vec::new(),
            };
            if roots.is_empty() {
                return Err(FabricError::Config(format!(
                    "Peer {} uses TLS but the profile has no tlsCACerts for it",
                    gateway_name
                )));
            }

            // Certificates name the peer, not the rewritten localhost address
            let domain = gateway_peer
                .ssl_target_name()
                .unwrap_or(&target.host)
                .to_string();
            let mut tls = ClientTlsConfig::new().domain_name(domain);
            for pem in roots {
                tls = tls.ca_certificate(Certificate::from_pem(pem));
            }
            endpoint = endpoint.tls_config(tls).map_err(|e| {
                FabricError::Config(format!("Invalid peer TLS settings: {}", e))
            })?;
        }

        tracing::info!("Connecting to gateway peer {} at {}", gateway_name, target.uri);
        let channel = endpoint.connect().await.map_err(|e| {
            FabricError::Session(format!("Gateway peer {} unreachable: {}", target.uri, e))
        })?;

        let organizations = if options.discovery {
            Vec::new()
        } else {
            vec![org.mspid.clone()]
        };
        if organizations.is_empty() {
            tracing::info!("Endorsers resolved by gateway discovery");
        } else {
            tracing::info!("Endorsement pinned to {}", organizations.join(", "));
        }

        Ok(Self {
            client: GatewayClient::new(channel),
            address: target.uri,
            organizations,
            evaluate_timeout: options.evaluate_timeout,
            submit_timeout: options.submit_timeout,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn organizations(&self) -> &[String] {
        &self.organizations
    }
}

#[async_trait]
impl LedgerTransport for GrpcTransport {
    async fn evaluate(&self, proposal: &SignedProposal) -> Result<Vec<u8>, InvocationFailure> {
        let limit = self.evaluate_timeout;
        let request = EvaluateRequest {
            transaction_id: proposal.tx_id.clone(),
            channel_id: proposal.channel.clone(),
            proposed_transaction: Some(proposal.to_proto()),
            target_organizations: self.organizations.clone(),
        };

        let response = self
            .client
            .clone()
            .evaluate(with_timeout(request, limit))
            .await
            .map_err(|status| classify_status(Phase::Evaluate, &status, limit))?
            .into_inner();

        let result = response.result.ok_or_else(|| {
            InvocationFailure::Transport("evaluate response carried no result".to_string())
        })?;
        if result.status >= CHAINCODE_ERROR_THRESHOLD {
            return Err(InvocationFailure::Contract(result.message));
        }
        Ok(result.payload)
    }

    async fn submit(
        &self,
        proposal: &SignedProposal,
        signer: &Signer,
    ) -> Result<Vec<u8>, InvocationFailure> {
        let limit = self.submit_timeout;
        let mut client = self.client.clone();

        let endorse = EndorseRequest {
            transaction_id: proposal.tx_id.clone(),
            channel_id: proposal.channel.clone(),
            proposed_transaction: Some(proposal.to_proto()),
            endorsing_organizations: self.organizations.clone(),
        };
        let mut envelope = client
            .endorse(with_timeout(endorse, limit))
            .await
            .map_err(|status| classify_status(Phase::Endorse, &status, limit))?
            .into_inner()
            .prepared_transaction
            .ok_or_else(|| {
                InvocationFailure::Transport(
                    "endorse response carried no prepared transaction".to_string(),
                )
            })?;

        let result = transaction_result(&envelope.payload).map_err(|e| {
            InvocationFailure::Transport(format!("Invalid prepared transaction: {}", e))
        })?;
        envelope.signature = signer.sign_bytes(&envelope.payload);

        let submit = SubmitRequest {
            transaction_id: proposal.tx_id.clone(),
            channel_id: proposal.channel.clone(),
            prepared_transaction: Some(envelope),
        };
        client
            .submit(with_timeout(submit, limit))
            .await
            .map_err(|status| classify_status(Phase::Submit, &status, limit))?;

        let request = CommitStatusRequest {
            transaction_id: proposal.tx_id.clone(),
            channel_id: proposal.channel.clone(),
            identity: signer.identity_bytes().to_vec(),
        }
        .encode_to_vec();
        let signature = signer.sign_bytes(&request);
        let status = client
            .commit_status(with_timeout(
                SignedCommitStatusRequest { request, signature },
                limit,
            ))
            .await
            .map_err(|status| classify_status(Phase::CommitStatus, &status, limit))?
            .into_inner();

        if status.result != protos::TxValidationCode::Valid as i32 {
            let code = protos::TxValidationCode::try_from(status.result)
                .map(|code| code.as_str_name().to_string())
                .unwrap_or_else(|_| status.result.to_string());
            return Err(InvocationFailure::Commit(format!(
                "transaction {} failed to commit with status code {}",
                proposal.tx_id, code
            )));
        }

        tracing::debug!(
            "Transaction {} committed in block {}",
            proposal.tx_id,
            status.block_number
        );
        Ok(result)
    }

    async fn close(&self) {
        tracing::debug!("Releasing gateway channel to {}", self.address);
    }
}

fn with_timeout<T>(message: T, limit: Duration) -> tonic::Request<T> {
    let mut request = tonic::Request::new(message);
    request.set_timeout(limit);
    request
}

/// Contract response carried inside a prepared transaction envelope.
fn transaction_result(payload: &[u8]) -> Result<Vec<u8>, prost::DecodeError> {
    let payload = common::Payload::decode(payload)?;
    let transaction = protos::Transaction::decode(payload.data.as_slice())?;
    let Some(action) = transaction.actions.first() else {
        return Ok(Vec::new());
    };
    let action_payload = protos::ChaincodeActionPayload::decode(action.payload.as_slice())?;
    let endorsed = action_payload.action.unwrap_or_default();
    let response_payload =
        protos::ProposalResponsePayload::decode(endorsed.proposal_response_payload.as_slice())?;
    let chaincode_action = protos::ChaincodeAction::decode(response_payload.extension.as_slice())?;
    Ok(chaincode_action
        .response
        .map(|response| response.payload)
        .unwrap_or_default())
}

// ==================== Failure Classification ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Evaluate,
    Endorse,
    Submit,
    CommitStatus,
}

/// Per-peer details attached to a failed gateway call.
fn error_details(status: &Status) -> Vec<ErrorDetail> {
    let Ok(rpc_status) = google::rpc::Status::decode(status.details()) else {
        return Vec::new();
    };
    rpc_status
        .details
        .iter()
        .filter(|any| any.type_url.ends_with(ERROR_DETAIL_TYPE))
        .filter_map(|any| ErrorDetail::decode(any.value.as_slice()).ok())
        .collect()
}

/// Peers prefix chaincode errors with `chaincode response <status>, `.
fn chaincode_message(message: &str) -> Option<&str> {
    message
        .strip_prefix("chaincode response ")
        .and_then(|rest| rest.split_once(", "))
        .map(|(_, message)| message)
}

fn classify_status(phase: Phase, status: &Status, limit: Duration) -> InvocationFailure {
    let details = error_details(status);
    let first = details.first().map(|detail| detail.message.as_str());
    let contract = first.and_then(chaincode_message);
    let message = contract
        .or(first)
        .unwrap_or_else(|| status.message())
        .to_string();

    match (status.code(), phase) {
        (Code::DeadlineExceeded, _) => InvocationFailure::Timeout(limit),
        (Code::Unavailable, _) => InvocationFailure::Transport(message),
        _ if contract.is_some() => InvocationFailure::Contract(message),
        (Code::Unknown | Code::Aborted, Phase::Evaluate) => InvocationFailure::Contract(message),
        (_, Phase::Endorse) => InvocationFailure::Endorsement(message),
        (_, Phase::Submit | Phase::CommitStatus) => InvocationFailure::Commit(message),
        _ => InvocationFailure::Transport(message),
    }
}

// ==================== Endpoints ====================

/// Where and how to dial a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerTarget {
    pub uri: String,
    /// Host from the profile, before any localhost rewrite
    pub host: String,
    pub tls: bool,
}

/// Map a profile endpoint to a dialable URI.
///
/// `grpcs://` dials with TLS and `grpc://` without. Bare `host:port` is
/// treated as TLS. With `as_localhost` the host is replaced by `localhost`
/// and the port kept.
pub fn peer_target(endpoint: &str, as_localhost: bool) -> Result<PeerTarget, FabricError> {
    let converted = if let Some(rest) = endpoint.strip_prefix("grpcs://") {
        format!("https://{}", rest)
    } else if let Some(rest) = endpoint.strip_prefix("grpc://") {
        format!("http://{}", rest)
    } else if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    };

    let mut url =
        reqwest::Url::parse(&converted).map_err(|e| invalid_endpoint(endpoint, e))?;
    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| invalid_endpoint(endpoint, "missing host"))?
        .to_string();

    if as_localhost {
        url.set_host(Some("localhost"))
            .map_err(|e| invalid_endpoint(endpoint, e))?;
    }

    Ok(PeerTarget {
        uri: url.as_str().trim_end_matches('/').to_string(),
        host,
        tls: url.scheme() == "https",
    })
}

fn invalid_endpoint(endpoint: &str, reason: impl std::fmt::Display) -> FabricError {
    FabricError::Config(format!("Invalid peer endpoint {}: {}", endpoint, reason))
}
