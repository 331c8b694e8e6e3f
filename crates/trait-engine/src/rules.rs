// trait-engine/src/rules.rs

use crate::types::LanguageVersion;
use crate::DeployError;
use chain_core::EpochId;
use serde::{Deserialize, Serialize};

/// What to do with a trait that declares the same method name twice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateMethodPolicy {
    Permit,
    Reject,
}

/// How calls through trait-typed values behave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Trait values are dispatched to whatever contract they name
    Direct,
    /// A trait value forwarded through a contract call cannot be dispatched
    Broken,
    /// Forwarded trait values dispatch like direct ones
    Fixed,
}

/// Rule record in force for one (epoch, language version) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    pub epoch: EpochId,
    pub language_version: LanguageVersion,
    pub duplicate_method_definition_policy: DuplicateMethodPolicy,
    pub versioned_deployment_supported: bool,
    pub circular_trait_reference_allowed: bool,
    pub forward_reference_allowed: bool,
    pub trait_typed_dispatch_mode: DispatchMode,
}

/// Pure mapping from epoch and language version to [`Rules`]
pub struct EpochRuleSet;

impl EpochRuleSet {
    pub fn rules(epoch: EpochId, version: LanguageVersion) -> Rules {
        let duplicate_method_definition_policy = match version {
            LanguageVersion::V1 => DuplicateMethodPolicy::Permit,
            LanguageVersion::V2 => DuplicateMethodPolicy::Reject,
        };

        let trait_typed_dispatch_mode = match epoch {
            EpochId::Epoch20 | EpochId::Epoch2_05 => DispatchMode::Direct,
            EpochId::Epoch21 | EpochId::Epoch22 | EpochId::Epoch23 => DispatchMode::Broken,
            EpochId::Epoch24 | EpochId::Epoch25 | EpochId::Epoch30 => DispatchMode::Fixed,
        };

        Rules {
            epoch,
            language_version: version,
            duplicate_method_definition_policy,
            versioned_deployment_supported: epoch >= EpochId::Epoch21,
            // Observed behaviour rejects both at every epoch
            circular_trait_reference_allowed: false,
            forward_reference_allowed: false,
            trait_typed_dispatch_mode,
        }
    }

    /// Rules for the epoch's default language version
    pub fn default_rules(epoch: EpochId) -> Rules {
        Self::rules(epoch, LanguageVersion::default_for_epoch(epoch))
    }

    /// Rules for a deployment that may request an explicit language version
    pub fn for_deployment(epoch: EpochId, requested: Option<LanguageVersion>) -> Result<Rules, DeployError> {
        let default = Self::default_rules(epoch);
        match requested {
            None => Ok(default),
            Some(version) if default.versioned_deployment_supported => Ok(Self::rules(epoch, version)),
            Some(version) => Err(DeployError::VersionedDeploymentUnsupported { epoch, version }),
        }
    }
}
