//--------------------------------------------------------------------------------------------------
// STRUCTS & ENUMS
//--------------------------------------------------------------------------------------------------
// | Name                | Description                                      | Stream          |
// |---------------------|--------------------------------------------------|-----------------|
// | StreamEvent         | Tagged union of every pushed event               | see `stream()`  |
// | LedgerClosed        | A ledger closed                                  | ledger          |
// | TransactionEvent    | A validated or proposed transaction              | transactions    |
// | ValidationReceived  | A validation message from a validator            | validations     |
// | ManifestReceived    | A validator manifest                             | manifests       |
// | PeerStatusChange    | A peer changed state                             | peer_status     |
// | ConsensusPhase      | The local consensus phase changed                | consensus       |
//--------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::StreamKind;

/// Events pushed to streaming clients. Serialized with a `type` tag whose
/// value matches the field naming of existing clients of the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "ledgerClosed")]
    LedgerClosed(LedgerClosed),
    #[serde(rename = "transaction")]
    Transaction(TransactionEvent),
    #[serde(rename = "validationReceived")]
    ValidationReceived(ValidationReceived),
    #[serde(rename = "manifestReceived")]
    ManifestReceived(ManifestReceived),
    #[serde(rename = "peerStatusChange")]
    PeerStatusChange(PeerStatusChange),
    #[serde(rename = "consensusPhase")]
    ConsensusPhase(ConsensusPhase),
}

impl StreamEvent {
    /// The stream this event is published on.
    pub fn stream(&self) -> StreamKind {
        match self {
            Self::LedgerClosed(_) => StreamKind::Ledger,
            Self::Transaction(_) => StreamKind::Transactions,
            Self::ValidationReceived(_) => StreamKind::Validations,
            Self::ManifestReceived(_) => StreamKind::Manifests,
            Self::PeerStatusChange(_) => StreamKind::PeerStatus,
            Self::ConsensusPhase(_) => StreamKind::Consensus,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerClosed {
    pub ledger_index: u32,
    pub ledger_hash: String,
    pub ledger_time: u32,
    pub fee_base: u64,
    pub fee_ref: u64,
    pub reserve_base: u64,
    pub reserve_inc: u64,
    pub txn_count: u32,
    /// Range string such as `"32570-62000000"`.
    pub validated_ledgers: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub engine_result: String,
    pub engine_result_code: i32,
    pub engine_result_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_hash: Option<String>,
    /// Set instead of `ledger_index` for proposed transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_current_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_time_iso: Option<String>,
    /// Transaction body, passed through verbatim.
    pub transaction: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    pub validated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReceived {
    pub ledger_hash: String,
    pub ledger_index: String,
    pub signature: String,
    pub validation_public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_key: Option<String>,
    pub flags: u32,
    pub full: bool,
    pub signing_time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_fee: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestReceived {
    pub master_key: String,
    pub signing_key: String,
    pub seq: u32,
    pub signature: String,
    pub master_signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Peer state transitions reported on the `peer_status` stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerAction {
    ClosingLedger,
    AcceptedLedger,
    SwitchedLedger,
    LostSync,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatusChange {
    pub action: PeerAction,
    pub date: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_index_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_index_max: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusStage {
    Open,
    Establish,
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusPhase {
    pub consensus: ConsensusStage,
}
