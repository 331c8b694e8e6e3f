// chain-core/src/admission.rs

use crate::epoch::EpochId;
use serde::{Deserialize, Serialize};

/// Admission configuration for contract deployments that fail validation.
///
/// Some epochs drop an invalid deployment from the block entirely instead of
/// including it as a failed (fee-paying) transaction. Which epochs do so is a
/// network parameter, not something the contract engine decides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionPolicy {
    /// Epochs in which invalid deployments are silently excluded
    #[serde(default)]
    pub exclude_invalid_deployments_in: Vec<EpochId>,
}

/// Outcome of admitting a transaction into a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionDecision {
    /// Included in the block; the fee is charged either way
    Include { success: bool },
    /// Dropped from the block; no fee, no state change
    Exclude,
}

impl AdmissionDecision {
    pub fn is_included(&self) -> bool {
        matches!(self, AdmissionDecision::Include { .. })
    }
}

impl AdmissionPolicy {
    pub fn new(exclude_invalid_deployments_in: Vec<EpochId>) -> Self {
        Self {
            exclude_invalid_deployments_in,
        }
    }

    /// Decide inclusion of a deployment that validated (`valid`) or not
    pub fn decide_deployment(&self, epoch: EpochId, valid: bool) -> AdmissionDecision {
        if valid {
            return AdmissionDecision::Include { success: true };
        }

        if self.exclude_invalid_deployments_in.contains(&epoch) {
            tracing::warn!("Excluding invalid deployment from block in epoch {}", epoch);
            AdmissionDecision::Exclude
        } else {
            AdmissionDecision::Include { success: false }
        }
    }

    /// Calls are always included; failures still pay
    pub fn decide_call(&self, success: bool) -> AdmissionDecision {
        AdmissionDecision::Include { success }
    }
}
