// trait-engine/src/lib.rs

//! Trait conformance and dispatch for epoch-gated contracts
//!
//! This crate provides:
//! - Contract source parsing (`define-trait`, `use-trait`, `impl-trait`, functions)
//! - Per-epoch rule selection
//! - The append-only trait catalog with cycle and forward-reference checks
//! - Alias resolution across contracts
//! - Structural conformance checking
//! - Dispatch through trait-typed parameters with fee-before-outcome

pub mod catalog;
pub mod conformance;
pub mod dispatch;
pub mod engine;
pub mod registry;
pub mod resolver;
pub mod rules;
pub mod syntax;
pub mod types;
pub mod value;

pub use catalog::{CatalogEntry, PendingCatalog, PinnedCatalog, TraitCatalog, TraitLookup};
pub use conformance::{ConformanceChecker, ConformanceResult};
pub use dispatch::{CallArg, DispatchCall, DispatchOutcome, DispatchPhase, DispatchRouter, ExecutionStatus};
pub use engine::{BlockContext, DeployOutcome, DeployRequest, Engine, EngineConfig, PreparedDeployment};
pub use registry::{ContractFunction, ContractLookup, ContractRecord, ContractRegistry, RegistryView};
pub use resolver::{
    AliasLookup, AliasTarget, RawAliasDecl, ReferenceResolver, ResolutionPath, ResolverConfig, Scope,
    TraitReference,
};
pub use rules::{DispatchMode, DuplicateMethodPolicy, EpochRuleSet, Rules};
pub use syntax::{parse_contract, parse_type_str, ParseError};
pub use types::*;
pub use value::{ResponseValue, Value};

use chain_core::{EpochId, InsufficientFunds};

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

fn format_cycle(cycle: &[TraitIdentity]) -> String {
    cycle.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(" -> ")
}

fn format_chain(chain: &[ContractId]) -> String {
    chain.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(" -> ")
}

/// Rejections raised while defining traits
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("trait {trait_id} declares method `{method}` more than once")]
    DuplicateNamePolicyViolation { trait_id: TraitIdentity, method: Symbol },

    #[error("trait {trait_id} references {referenced} before it is defined")]
    ForwardReference {
        trait_id: TraitIdentity,
        referenced: TraitIdentity,
    },

    #[error("circular trait reference: {}", format_cycle(.cycle))]
    CircularReference {
        trait_id: TraitIdentity,
        cycle: Vec<TraitIdentity>,
    },

    #[error("trait {0} is already defined")]
    AlreadyDefined(TraitIdentity),

    #[error("unknown trait {0}")]
    UnknownTrait(TraitIdentity),
}

/// Rejections raised while resolving trait references
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("{declaring}: cannot resolve trait reference `{target}`")]
    UnresolvedTarget { declaring: ContractId, target: String },

    #[error("{declaring}: circular alias chain {}", format_chain(.chain))]
    CircularAlias {
        declaring: ContractId,
        chain: Vec<ContractId>,
    },
}

/// Conformance verdicts that reject a contract against a trait
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConformanceError {
    #[error("missing method `{method}` required by {trait_id}")]
    MissingMethod { trait_id: TraitIdentity, method: Symbol },

    #[error("method `{method}` does not match {trait_id}: expected {expected}, found {found}")]
    SignatureMismatch {
        trait_id: TraitIdentity,
        method: Symbol,
        expected: String,
        found: String,
    },

    #[error("trait {trait_id} declares overloaded methods and cannot be used as a type")]
    AmbiguousTraitUse { trait_id: TraitIdentity },

    #[error("every overload of `{method}` in {trait_id} is implemented")]
    AmbiguousTraitFullImplementation { trait_id: TraitIdentity, method: Symbol },
}

/// Failures of a dispatched call. The fee is never refunded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("conformance failed: {0}")]
    ConformanceFailed(#[from] ConformanceError),

    #[error("no such contract {contract} (trait value forwarded through a contract call)")]
    RegressionWindowNoSuchContract { contract: ContractId },

    #[error(transparent)]
    InsufficientFunds(#[from] InsufficientFunds),

    #[error("no such contract {0}")]
    NoSuchContract(ContractId),

    #[error("no public function `{function}` in {contract}")]
    NoSuchFunction { contract: ContractId, function: Symbol },

    #[error("unknown trait {0}")]
    UnknownTrait(TraitIdentity),

    #[error("argument mismatch: {0}")]
    ArgumentMismatch(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("call depth exceeded ({0})")]
    CallDepthExceeded(usize),
}

/// Rejections of a contract deployment. The fee is never refunded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Conformance(#[from] ConformanceError),

    #[error("epoch {epoch} does not support versioned deployment (requested {version})")]
    VersionedDeploymentUnsupported { epoch: EpochId, version: LanguageVersion },

    #[error("contract {0} already exists")]
    ContractAlreadyExists(ContractId),

    #[error("{kind} `{name}` is defined more than once")]
    NameConflict { kind: &'static str, name: Symbol },

    #[error(transparent)]
    InsufficientFunds(#[from] InsufficientFunds),
}

/// Umbrella error for the engine façade
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Conformance(#[from] ConformanceError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("contract not found: {0}")]
    ContractNotFound(ContractId),

    #[error("trait not found: {0}")]
    TraitNotFound(TraitIdentity),
}
