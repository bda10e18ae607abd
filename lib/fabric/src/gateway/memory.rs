//! In-process ledger running the asset-transfer-basic contract
//!
//! Stands in for a peer network in this crate's tests and, behind the
//! `testing` feature, in downstream test suites. Proposals are signature-checked
//! like a peer would, evaluations run against a scratch copy of world state,
//! and submits commit atomically.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::InvocationFailure;
use crate::gateway::proposal::{SignedProposal, Signer};
use crate::gateway::transport::LedgerTransport;
use crate::types::AssetRecord;

#[derive(Default)]
struct LedgerState {
    assets: BTreeMap<String, AssetRecord>,
    committed: HashSet<String>,
    endorsement_failure: Option<String>,
    latency: Option<Duration>,
}

#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger holding the six assets `InitLedger` creates.
    pub fn seeded() -> Self {
        let ledger = Self::new();
        if let Ok(mut state) = ledger.state.lock() {
            init_ledger(&mut state.assets);
        }
        ledger
    }

    /// While set, every submit fails endorsement with `message`.
    pub fn fail_endorsements(&self, message: Option<&str>) {
        if let Ok(mut state) = self.state.lock() {
            state.endorsement_failure = message.map(str::to_string);
        }
    }

    /// Delay applied before every invocation is answered.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut state) = self.state.lock() {
            state.latency = latency;
        }
    }

    /// Snapshot of world state, ordered by ID.
    pub fn assets(&self) -> Vec<AssetRecord> {
        self.state
            .lock()
            .map(|state| state.assets.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of committed transactions.
    pub fn committed(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.committed.len())
            .unwrap_or_default()
    }

    fn latency(&self) -> Result<Option<Duration>, InvocationFailure> {
        Ok(self.lock()?.latency)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LedgerState>, InvocationFailure> {
        self.state
            .lock()
            .map_err(|_| InvocationFailure::Transport("ledger state poisoned".to_string()))
    }
}

#[async_trait]
impl LedgerTransport for InMemoryLedger {
    async fn evaluate(&self, proposal: &SignedProposal) -> Result<Vec<u8>, InvocationFailure> {
        if let Some(latency) = self.latency()? {
            tokio::time::sleep(latency).await;
        }
        let proposal = proposal
            .verify()
            .map_err(|e| InvocationFailure::Endorsement(format!("access denied: {}", e)))?;

        // Simulate only; nothing an evaluation does is kept
        let mut scratch = self.lock()?.assets.clone();
        execute(&mut scratch, &proposal.function, &proposal.args)
            .map_err(InvocationFailure::Contract)
    }

    async fn submit(
        &self,
        proposal: &SignedProposal,
        _signer: &Signer,
    ) -> Result<Vec<u8>, InvocationFailure> {
        if let Some(latency) = self.latency()? {
            tokio::time::sleep(latency).await;
        }
        let proposal = proposal
            .verify()
            .map_err(|e| InvocationFailure::Endorsement(format!("access denied: {}", e)))?;

        let mut state = self.lock()?;
        if let Some(message) = &state.endorsement_failure {
            return Err(InvocationFailure::Endorsement(message.clone()));
        }
        if state.committed.contains(&proposal.tx_id) {
            return Err(InvocationFailure::Commit(format!(
                "transaction {} failed to commit with status code DUPLICATE_TXID",
                proposal.tx_id
            )));
        }

        let mut next = state.assets.clone();
        let payload = execute(&mut next, &proposal.function, &proposal.args)
            .map_err(InvocationFailure::Contract)?;

        state.assets = next;
        state.committed.insert(proposal.tx_id);
        Ok(payload)
    }
}

// ==================== Contract ====================

fn execute(
    assets: &mut BTreeMap<String, AssetRecord>,
    function: &str,
    args: &[String],
) -> Result<Vec<u8>, String> {
    match function {
        "InitLedger" => {
            expect_args(args, 0)?;
            init_ledger(assets);
            Ok(Vec::new())
        }
        "CreateAsset" => {
            expect_args(args, 5)?;
            let asset = parse_asset(args)?;
            if assets.contains_key(&asset.id) {
                return Err(format!("the asset {} already exists", asset.id));
            }
            let payload = to_json(&asset)?;
            assets.insert(asset.id.clone(), asset);
            Ok(payload)
        }
        "ReadAsset" => {
            expect_args(args, 1)?;
            to_json(existing(assets, &args[0])?)
        }
        "UpdateAsset" => {
            expect_args(args, 5)?;
            let asset = parse_asset(args)?;
            existing(assets, &asset.id)?;
            assets.insert(asset.id.clone(), asset);
            Ok(Vec::new())
        }
        "DeleteAsset" => {
            expect_args(args, 1)?;
            existing(assets, &args[0])?;
            assets.remove(&args[0]);
            Ok(Vec::new())
        }
        "AssetExists" => {
            expect_args(args, 1)?;
            Ok(assets.contains_key(&args[0]).to_string().into_bytes())
        }
        "TransferAsset" => {
            expect_args(args, 2)?;
            let asset = assets
                .get_mut(&args[0])
                .ok_or_else(|| format!("the asset {} does not exist", args[0]))?;
            let old_owner = std::mem::replace(&mut asset.owner, args[1].clone());
            Ok(old_owner.into_bytes())
        }
        "GetAllAssets" => {
            expect_args(args, 0)?;
            let all: Vec<&AssetRecord> = assets.values().collect();
            to_json(&all)
        }
        other => Err(format!("Received unknown function invocation: {}", other)),
    }
}

fn expect_args(args: &[String], expected: usize) -> Result<(), String> {
    if args.len() != expected {
        return Err(format!(
            "Incorrect number of params. Expected {}, received {}",
            expected,
            args.len()
        ));
    }
    Ok(())
}

fn existing<'a>(
    assets: &'a BTreeMap<String, AssetRecord>,
    id: &str,
) -> Result<&'a AssetRecord, String> {
    assets
        .get(id)
        .ok_or_else(|| format!("the asset {} does not exist", id))
}

fn parse_asset(args: &[String]) -> Result<AssetRecord, String> {
    let number = |name: &str, value: &str| {
        value
            .parse::<u64>()
            .map_err(|_| format!("{} must be a non-negative integer, got {:?}", name, value))
    };
    Ok(AssetRecord {
        id: args[0].clone(),
        color: args[1].clone(),
        size: number("Size", &args[2])?,
        owner: args[3].clone(),
        appraised_value: number("AppraisedValue", &args[4])?,
    })
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, String> {
    serde_json::to_vec(value).map_err(|e| format!("failed to marshal: {}", e))
}

fn init_ledger(assets: &mut BTreeMap<String, AssetRecord>) {
    let seed = [
        ("asset1", "blue", 5, "Tomoko", 300),
        ("asset2", "red", 5, "Brad", 400),
        ("asset3", "green", 10, "Jin Soo", 500),
        ("asset4", "yellow", 10, "Max", 600),
        ("asset5", "black", 15, "Adriana", 700),
        ("asset6", "white", 15, "Michel", 800),
    ];
    for (id, color, size, owner, appraised_value) in seed {
        assets.insert(
            id.to_string(),
            AssetRecord {
                id: id.to_string(),
                color: color.to_string(),
                size,
                owner: owner.to_string(),
                appraised_value,
            },
        );
    }
}
