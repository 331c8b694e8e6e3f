// trait-engine/src/registry.rs

use crate::resolver::{AliasLookup, AliasTarget, TraitReference};
use crate::syntax::{Expr, FunctionAccess};
use crate::types::{ContractId, LanguageVersion, MethodSignature, Symbol, TraitIdentity};
use crate::value::Value;
use crate::DeployError;
use chain_core::{BlockNumber, EpochId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A function of a deployed contract, with canonical types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFunction {
    pub access: FunctionAccess,
    pub signature: MethodSignature,
    pub param_names: Vec<Symbol>,
    pub body: Expr,
}

impl ContractFunction {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    /// Arity and per-argument type check
    pub fn accepts(&self, args: &[Value]) -> bool {
        args.len() == self.signature.parameter_types.len()
            && args
                .iter()
                .zip(&self.signature.parameter_types)
                .all(|(arg, ty)| arg.conforms_to(ty))
    }
}

/// Immutable record of a deployed contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: ContractId,
    pub deployed_at_epoch: EpochId,
    pub deployed_at_height: BlockNumber,
    pub language_version: LanguageVersion,
    /// Signatures of public and read-only functions
    pub public_interface: Vec<MethodSignature>,
    pub declared_trait_aliases: IndexMap<Symbol, TraitReference>,
    pub implemented_traits: BTreeSet<TraitIdentity>,
    pub defined_traits: Vec<TraitIdentity>,
    pub functions: Vec<ContractFunction>,
}

impl ContractRecord {
    /// Functions named `name`; more than one only for contracts deployed
    /// under a permissive duplicate policy
    pub fn functions_named(&self, name: &str) -> Vec<&ContractFunction> {
        self.functions.iter().filter(|f| f.name() == name).collect()
    }

    /// Public or read-only function callable with `args`. The latest
    /// definition wins when several accept them.
    pub fn callable(&self, name: &str, args: &[Value]) -> Option<&ContractFunction> {
        self.functions
            .iter()
            .rev()
            .find(|f| f.name() == name && f.access.is_exposed() && f.accepts(args))
    }

    /// Latest function named `name`, of any access
    pub fn function(&self, name: &str) -> Option<&ContractFunction> {
        self.functions.iter().rev().find(|f| f.name() == name)
    }

    pub fn implements(&self, trait_id: &TraitIdentity) -> bool {
        self.implemented_traits.contains(trait_id)
    }
}

/// Read access to deployed contracts
pub trait ContractLookup {
    fn contract(&self, id: &ContractId) -> Option<&ContractRecord>;
}

/// Append-only store of contract records
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    records: IndexMap<ContractId, ContractRecord>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &ContractId) -> bool {
        self.records.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContractRecord> {
        self.records.values()
    }

    pub fn insert(&mut self, record: ContractRecord) -> Result<(), DeployError> {
        if self.records.contains_key(&record.id) {
            return Err(DeployError::ContractAlreadyExists(record.id));
        }

        tracing::info!(
            "Registered contract {} at height {} ({} functions)",
            record.id,
            record.deployed_at_height,
            record.functions.len()
        );
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    /// Read view containing only contracts deployed at or below `height`
    pub fn view_at(&self, height: BlockNumber) -> RegistryView<'_> {
        RegistryView { registry: self, height }
    }
}

impl ContractLookup for ContractRegistry {
    fn contract(&self, id: &ContractId) -> Option<&ContractRecord> {
        self.records.get(id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RegistryView<'a> {
    registry: &'a ContractRegistry,
    height: BlockNumber,
}

impl ContractLookup for RegistryView<'_> {
    fn contract(&self, id: &ContractId) -> Option<&ContractRecord> {
        self.registry
            .records
            .get(id)
            .filter(|record| record.deployed_at_height <= self.height)
    }
}

fn declared_alias(lookup: &dyn ContractLookup, contract: &ContractId, alias: &str) -> Option<AliasTarget> {
    lookup
        .contract(contract)?
        .declared_trait_aliases
        .get(alias)
        .map(|reference| reference.declared.clone())
}

impl AliasLookup for ContractRegistry {
    fn contract_exists(&self, id: &ContractId) -> bool {
        self.contract(id).is_some()
    }

    fn alias_decl(&self, contract: &ContractId, alias: &str) -> Option<AliasTarget> {
        declared_alias(self, contract, alias)
    }
}

impl AliasLookup for RegistryView<'_> {
    fn contract_exists(&self, id: &ContractId) -> bool {
        self.contract(id).is_some()
    }

    fn alias_decl(&self, contract: &ContractId, alias: &str) -> Option<AliasTarget> {
        declared_alias(self, contract, alias)
    }
}
