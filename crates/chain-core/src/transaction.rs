// chain-core/src/transaction.rs

use crate::{epoch::EpochId, types::*};
use serde::{Deserialize, Serialize};

/// Kind of transaction the receipt describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Contract deployment
    ContractDeployment { contract: String },
    /// Public function call
    ContractCall { contract: String, function: String },
}

/// Final status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Included and succeeded
    Success,
    /// Included, fee charged, effects discarded
    Failed,
    /// Never made it into a block
    Excluded,
}

/// Transaction receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub kind: TransactionKind,
    pub sender: AccountId,
    pub block_number: BlockNumber,
    pub epoch: EpochId,
    pub status: TxStatus,
    pub fee_charged: Amount,
    /// Rendered result value for successful or committed-failure calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Rendered error for rejected transactions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.status == TxStatus::Success
    }
}
