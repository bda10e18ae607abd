//! Ledger gateway session
//!
//! A [`Session`] is opened once under one identity and shared by every
//! request handler. Contracts resolved from it sign each proposal with that
//! identity and hand it to a [`LedgerTransport`], bounded by a per-call timeout.

pub mod grpc;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod proposal;
pub mod transport;

pub use grpc::GrpcTransport;
#[cfg(any(test, feature = "testing"))]
pub use memory::InMemoryLedger;
pub use proposal::{Creator, Proposal, SignedProposal, Signer};
pub use transport::LedgerTransport;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::{Config, ConnectionProfile};
use crate::error::{FabricError, InvocationFailure};
use crate::types::{Identity, InvocationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayOptions {
    /// Let the gateway peer discover endorsers. When off, endorsement and
    /// evaluation are pinned to the client organization.
    pub discovery: bool,
    /// Rewrite peer host names to `localhost`.
    pub as_localhost: bool,
    pub evaluate_timeout: Duration,
    pub submit_timeout: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            discovery: true,
            as_localhost: true,
            evaluate_timeout: Duration::from_secs(5),
            submit_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for GatewayOptions {
    fn from(config: &Config) -> Self {
        Self {
            discovery: config.discovery,
            as_localhost: config.as_localhost,
            evaluate_timeout: config.evaluate_timeout,
            submit_timeout: config.submit_timeout,
        }
    }
}

pub struct Gateway;

impl Gateway {
    /// Connect to the client organization's gateway peer as `identity`.
    pub async fn open(
        profile: &ConnectionProfile,
        identity: &Identity,
        options: GatewayOptions,
    ) -> Result<Session, FabricError> {
        let transport = GrpcTransport::connect(profile, &options).await?;
        let channels = profile
            .channels
            .as_ref()
            .map(|channels| channels.keys().cloned().collect());
        Session::new(identity, Arc::new(transport), options, channels)
    }
}

struct SessionInner {
    signer: Signer,
    transport: Arc<dyn LedgerTransport>,
    options: GatewayOptions,
    /// Channels the profile declares; None accepts any channel.
    channels: Option<HashSet<String>>,
    closed: AtomicBool,
}

/// Long-lived authenticated connection. Cheap to share behind an `Arc`.
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Session over an already connected transport.
    pub fn new(
        identity: &Identity,
        transport: Arc<dyn LedgerTransport>,
        options: GatewayOptions,
        channels: Option<HashSet<String>>,
    ) -> Result<Self, FabricError> {
        let signer = Signer::from_identity(identity)?;
        tracing::info!(
            "Gateway session opened as {} ({})",
            signer.principal(),
            signer.creator().msp_id
        );
        Ok(Self {
            inner: Arc::new(SessionInner {
                signer,
                transport,
                options,
                channels,
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn identity(&self) -> &str {
        self.inner.signer.principal()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn network(&self, channel: &str) -> Result<Network, FabricError> {
        if self.is_closed() {
            return Err(FabricError::SessionClosed);
        }
        if let Some(channels) = &self.inner.channels
            && !channels.contains(channel)
        {
            return Err(FabricError::Session(format!(
                "Channel {} not declared in connection profile",
                channel
            )));
        }
        Ok(Network {
            channel: channel.to_string(),
            inner: self.inner.clone(),
        })
    }

    /// `network(channel)?.contract(name)`
    pub fn resolve_contract(&self, channel: &str, name: &str) -> Result<Contract, FabricError> {
        Ok(self.network(channel)?.contract(name))
    }

    /// Stop accepting invocations and release the transport. Safe to call more than once.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.transport.close().await;
        tracing::info!("Gateway session for {} closed", self.identity());
    }
}

pub struct Network {
    channel: String,
    inner: Arc<SessionInner>,
}

impl Network {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn contract(&self, name: &str) -> Contract {
        Contract {
            channel: self.channel.clone(),
            name: name.to_string(),
            inner: self.inner.clone(),
        }
    }
}

/// Handle on one chaincode in one channel.
#[derive(Clone)]
pub struct Contract {
    channel: String,
    name: String,
    inner: Arc<SessionInner>,
}

impl Contract {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mutating invocation: endorsed, ordered and committed before returning.
    pub async fn submit(&self, function: &str, args: &[String]) -> Result<Vec<u8>, FabricError> {
        self.invoke(InvocationKind::Submit, function, args).await
    }

    /// Read-only invocation answered by a single peer.
    pub async fn evaluate(&self, function: &str, args: &[String]) -> Result<Vec<u8>, FabricError> {
        self.invoke(InvocationKind::Evaluate, function, args).await
    }

    async fn invoke(
        &self,
        kind: InvocationKind,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, FabricError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(FabricError::SessionClosed);
        }

        let proposal = Proposal::new(
            self.inner.signer.creator().clone(),
            &self.channel,
            &self.name,
            function,
            args,
        );
        let signed = self.inner.signer.sign(&proposal);

        let transport = &self.inner.transport;
        let (limit, outcome) = match kind {
            InvocationKind::Submit => {
                let limit = self.inner.options.submit_timeout;
                let submitted = transport.submit(&signed, &self.inner.signer);
                (limit, tokio::time::timeout(limit, submitted).await)
            }
            InvocationKind::Evaluate => {
                let limit = self.inner.options.evaluate_timeout;
                (limit, tokio::time::timeout(limit, transport.evaluate(&signed)).await)
            }
        };

        match outcome {
            Ok(Ok(payload)) => {
                tracing::debug!("{:?} {} succeeded (tx {})", kind, function, signed.tx_id);
                Ok(payload)
            }
            Ok(Err(failure)) => Err(FabricError::invocation(function, failure)),
            Err(_) => Err(FabricError::invocation(
                function,
                InvocationFailure::Timeout(limit),
            )),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::crypto;
    use crate::types::{Enrollment, Identity};

    /// Identity with a real P-256 key and a self-signed certificate.
    pub(crate) fn identity(principal: &str) -> Identity {
        let key_pair = crypto::generate_key_pair().unwrap();
        let certificate = crypto::self_signed_certificate(principal, &key_pair).unwrap();
        Identity::new(
            principal,
            Enrollment {
                certificate,
                private_key: key_pair.serialize_pem(),
            },
            "Org1MSP",
        )
    }
}
