use async_trait::async_trait;

use crate::error::InvocationFailure;
use crate::gateway::proposal::{SignedProposal, Signer};

/// Carries signed proposals to the ledger.
///
/// Implementations only move messages and classify failures; proposal
/// signing, timeouts and session state live in the session. Submits get the
/// signer because the prepared transaction and the commit status request are
/// signed again after endorsement.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Query one peer. Nothing is ordered or committed.
    async fn evaluate(&self, proposal: &SignedProposal) -> Result<Vec<u8>, InvocationFailure>;

    /// Endorse, order and wait for the commit status.
    async fn submit(
        &self,
        proposal: &SignedProposal,
        signer: &Signer,
    ) -> Result<Vec<u8>, InvocationFailure>;

    /// Release connections. Called once when the owning session closes.
    async fn close(&self) {}
}
