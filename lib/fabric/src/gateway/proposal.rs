//! Transaction proposals and their signatures
//!
//! Proposals are encoded as Fabric `protos.Proposal` messages for an endorser
//! transaction and signed with the creator's P-256 key over the exact bytes.

use chrono::{DateTime, Utc};
use p256::ecdsa::SigningKey;
use prost::Message;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::crypto;
use crate::error::FabricError;
use crate::proto::{common, msp, protos};
use crate::types::Identity;

const NONCE_LENGTH: usize = 24;

/// Who is proposing: the MSP and the X.509 certificate of the signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creator {
    pub msp_id: String,
    pub certificate: String,
}

impl Creator {
    /// `msp.SerializedIdentity` bytes, as carried in signature headers.
    pub fn serialize(&self) -> Vec<u8> {
        msp::SerializedIdentity {
            mspid: self.msp_id.clone(),
            id_bytes: self.certificate.as_bytes().to_vec(),
        }
        .encode_to_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub tx_id: String,
    pub nonce: Vec<u8>,
    pub channel: String,
    pub chaincode: String,
    pub function: String,
    pub args: Vec<String>,
    pub creator: Creator,
    pub timestamp: DateTime<Utc>,
}

impl Proposal {
    pub fn new(
        creator: Creator,
        channel: &str,
        chaincode: &str,
        function: &str,
        args: &[String],
    ) -> Self {
        let mut nonce = vec![0u8; NONCE_LENGTH];
        rand::thread_rng().fill_bytes(&mut nonce);

        Self {
            tx_id: transaction_id(&nonce, &creator.serialize()),
            nonce,
            channel: channel.to_string(),
            chaincode: chaincode.to_string(),
            function: function.to_string(),
            args: args.to_vec(),
            creator,
            timestamp: Utc::now(),
        }
    }

    /// Encode as a `protos.Proposal` carrying a chaincode invocation.
    pub fn encode(&self) -> Vec<u8> {
        let chaincode_id = protos::ChaincodeId {
            name: self.chaincode.clone(),
            ..Default::default()
        };

        let channel_header = common::ChannelHeader {
            r#type: common::HeaderType::EndorserTransaction as i32,
            timestamp: Some(prost_types::Timestamp {
                seconds: self.timestamp.timestamp(),
                nanos: self.timestamp.timestamp_subsec_nanos() as i32,
            }),
            channel_id: self.channel.clone(),
            tx_id: self.tx_id.clone(),
            extension: protos::ChaincodeHeaderExtension {
                chaincode_id: Some(chaincode_id.clone()),
            }
            .encode_to_vec(),
            ..Default::default()
        };
        let header = common::Header {
            channel_header: channel_header.encode_to_vec(),
            signature_header: common::SignatureHeader {
                creator: self.creator.serialize(),
                nonce: self.nonce.clone(),
            }
            .encode_to_vec(),
        };

        // Fabric passes the function name as the first argument
        let args = std::iter::once(&self.function)
            .chain(&self.args)
            .map(|arg| arg.as_bytes().to_vec())
            .collect();
        let invocation = protos::ChaincodeInvocationSpec {
            chaincode_spec: Some(protos::ChaincodeSpec {
                chaincode_id: Some(chaincode_id),
                input: Some(protos::ChaincodeInput {
                    args,
                    ..Default::default()
                }),
                ..Default::default()
            }),
        };
        let payload = protos::ChaincodeProposalPayload {
            input: invocation.encode_to_vec(),
            ..Default::default()
        };

        protos::Proposal {
            header: header.encode_to_vec(),
            payload: payload.encode_to_vec(),
            extension: Vec::new(),
        }
        .encode_to_vec()
    }

    /// Decode an encoded `protos.Proposal` back into its invocation.
    pub fn decode(bytes: &[u8]) -> Result<Self, FabricError> {
        let proposal = protos::Proposal::decode(bytes)?;
        let header = common::Header::decode(proposal.header.as_slice())?;
        let channel_header = common::ChannelHeader::decode(header.channel_header.as_slice())?;
        let signature_header =
            common::SignatureHeader::decode(header.signature_header.as_slice())?;
        let identity = msp::SerializedIdentity::decode(signature_header.creator.as_slice())?;
        let extension =
            protos::ChaincodeHeaderExtension::decode(channel_header.extension.as_slice())?;
        let payload = protos::ChaincodeProposalPayload::decode(proposal.payload.as_slice())?;
        let invocation = protos::ChaincodeInvocationSpec::decode(payload.input.as_slice())?;

        let mut args = invocation
            .chaincode_spec
            .and_then(|spec| spec.input)
            .unwrap_or_default()
            .args
            .into_iter()
            .map(String::from_utf8)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FabricError::Proposal(format!("argument is not UTF-8: {}", e)))?;
        if args.is_empty() {
            return Err(FabricError::Proposal("no function named".to_string()));
        }
        let function = args.remove(0);

        let timestamp = channel_header
            .timestamp
            .and_then(|ts| DateTime::from_timestamp(ts.seconds, ts.nanos.max(0) as u32))
            .ok_or_else(|| FabricError::Proposal("missing or invalid timestamp".to_string()))?;
        let certificate = String::from_utf8(identity.id_bytes)
            .map_err(|e| FabricError::Proposal(format!("creator is not PEM: {}", e)))?;

        Ok(Self {
            tx_id: channel_header.tx_id,
            nonce: signature_header.nonce,
            channel: channel_header.channel_id,
            chaincode: extension.chaincode_id.map(|id| id.name).unwrap_or_default(),
            function,
            args,
            creator: Creator {
                msp_id: identity.mspid,
                certificate,
            },
            timestamp,
        })
    }

    /// Decode, check the signature against the creator certificate and the
    /// transaction id against the nonce.
    pub fn verify(proposal_bytes: &[u8], signature: &[u8]) -> Result<Self, FabricError> {
        let proposal = Self::decode(proposal_bytes)?;

        crypto::verify(&proposal.creator.certificate, proposal_bytes, signature)?;

        if transaction_id(&proposal.nonce, &proposal.creator.serialize()) != proposal.tx_id {
            return Err(FabricError::Crypto(
                "Transaction id does not match nonce and creator".to_string(),
            ));
        }

        Ok(proposal)
    }
}

/// `hex(sha256(nonce || serialized creator))`
pub fn transaction_id(nonce: &[u8], creator: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator);
    hex::encode(hasher.finalize())
}

/// An encoded proposal plus the creator's signature over exactly those bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedProposal {
    pub tx_id: String,
    pub channel: String,
    pub proposal_bytes: Vec<u8>,
    /// DER ECDSA signature
    pub signature: Vec<u8>,
}

impl SignedProposal {
    /// Verify and check the envelope fields agree with the signed proposal.
    pub fn verify(&self) -> Result<Proposal, FabricError> {
        let proposal = Proposal::verify(&self.proposal_bytes, &self.signature)?;
        if proposal.tx_id != self.tx_id || proposal.channel != self.channel {
            return Err(FabricError::Proposal(
                "transaction id or channel differs from signed proposal".to_string(),
            ));
        }
        Ok(proposal)
    }

    pub fn to_proto(&self) -> protos::SignedProposal {
        protos::SignedProposal {
            proposal_bytes: self.proposal_bytes.clone(),
            signature: self.signature.clone(),
        }
    }
}

/// Signs proposals and gateway messages on behalf of one identity.
pub struct Signer {
    principal: String,
    creator: Creator,
    serialized: Vec<u8>,
    key: SigningKey,
}

impl Signer {
    pub fn from_identity(identity: &Identity) -> Result<Self, FabricError> {
        let key = crypto::signing_key(identity.private_key())?;
        let creator = Creator {
            msp_id: identity.msp_id().to_string(),
            certificate: identity.certificate().to_string(),
        };
        Ok(Self {
            principal: identity.principal().to_string(),
            serialized: creator.serialize(),
            creator,
            key,
        })
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn creator(&self) -> &Creator {
        &self.creator
    }

    /// Serialized `msp.SerializedIdentity` of the signer.
    pub fn identity_bytes(&self) -> &[u8] {
        &self.serialized
    }

    pub fn sign(&self, proposal: &Proposal) -> SignedProposal {
        let proposal_bytes = proposal.encode();
        let signature = self.sign_bytes(&proposal_bytes);
        SignedProposal {
            tx_id: proposal.tx_id.clone(),
            channel: proposal.channel.clone(),
            proposal_bytes,
            signature,
        }
    }

    /// DER signature over arbitrary bytes, used for envelopes and commit status requests.
    pub fn sign_bytes(&self, data: &[u8]) -> Vec<u8> {
        crypto::sign(&self.key, data)
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("principal", &self.principal)
            .field("msp_id", &self.creator.msp_id)
            .finish_non_exhaustive()
    }
}
