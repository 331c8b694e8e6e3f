// trait-engine/src/catalog.rs

//! Append-only catalog of trait definitions.
//!
//! The catalog exclusively owns every [`TraitDefinition`]; contracts and
//! references hold identities only. Definitions are validated as a batch per
//! declaring contract (cycles first, then forward references) and are
//! committed only once the whole deployment has been accepted.

use crate::rules::{DuplicateMethodPolicy, Rules};
use crate::types::{ContractId, MethodSignature, Symbol, TraitDefinition, TraitIdentity};
use crate::DefinitionError;
use chain_core::BlockNumber;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Read access to trait definitions
pub trait TraitLookup {
    fn lookup(&self, id: &TraitIdentity) -> Option<&TraitDefinition>;

    fn contains(&self, id: &TraitIdentity) -> bool {
        self.lookup(id).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub definition: TraitDefinition,
    pub defined_at_height: BlockNumber,
}

#[derive(Debug, Clone, Default)]
pub struct TraitCatalog {
    entries: IndexMap<TraitIdentity, CatalogEntry>,
}

impl TraitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, id: &TraitIdentity) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    /// Entries in definition order
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    /// Validate and insert a single trait
    pub fn define(
        &mut self,
        origin: &ContractId,
        name: &str,
        methods: Vec<MethodSignature>,
        rules: &Rules,
        height: BlockNumber,
    ) -> Result<TraitIdentity, DefinitionError> {
        let identity = TraitIdentity::new(origin.clone(), name);
        let definitions = self.prepare_batch(origin, vec![(name.to_string(), methods)], rules)?;
        self.commit(definitions, height);
        Ok(identity)
    }

    /// Validate every trait one contract declares, without inserting.
    ///
    /// Traits may reference catalog entries and traits declared earlier in
    /// the same batch. Cycles (including self-references) are reported
    /// before forward references.
    pub fn prepare_batch(
        &self,
        origin: &ContractId,
        traits: Vec<(Symbol, Vec<MethodSignature>)>,
        rules: &Rules,
    ) -> Result<Vec<TraitDefinition>, DefinitionError> {
        let mut pending: IndexMap<TraitIdentity, TraitDefinition> = IndexMap::new();

        for (name, methods) in traits {
            let identity = TraitIdentity::new(origin.clone(), name);
            if self.entries.contains_key(&identity) || pending.contains_key(&identity) {
                return Err(DefinitionError::AlreadyDefined(identity));
            }

            let methods = apply_duplicate_policy(&identity, methods, rules.duplicate_method_definition_policy)?;
            pending.insert(
                identity.clone(),
                TraitDefinition {
                    identity,
                    methods,
                    defined_at_epoch: rules.epoch,
                },
            );
        }

        self.check_cycles(&pending)?;

        for (position, definition) in pending.values().enumerate() {
            for referenced in definition.referenced_traits() {
                let declared_earlier = pending
                    .get_index_of(referenced)
                    .map_or(false, |index| index < position);

                if !declared_earlier && !self.entries.contains_key(referenced) {
                    tracing::debug!("Trait {} references {} before its definition", definition.identity, referenced);
                    return Err(DefinitionError::ForwardReference {
                        trait_id: definition.identity.clone(),
                        referenced: referenced.clone(),
                    });
                }
            }
        }

        Ok(pending.into_values().collect())
    }

    /// Insert validated definitions. Existing entries are never replaced.
    pub fn commit(&mut self, definitions: Vec<TraitDefinition>, height: BlockNumber) {
        for definition in definitions {
            let identity = definition.identity.clone();
            if self.entries.contains_key(&identity) {
                tracing::warn!("Ignoring redefinition of trait {}", identity);
                continue;
            }

            tracing::info!(
                "Defined trait {} ({} methods) at height {}",
                identity,
                definition.methods.len(),
                height
            );
            self.entries.insert(
                identity,
                CatalogEntry {
                    definition,
                    defined_at_height: height,
                },
            );
        }
    }

    /// Return `(origin, name)` if it already holds `source`'s methods,
    /// otherwise define it as a copy of them. An existing trait with other
    /// methods is `AlreadyDefined`.
    pub fn get_or_copy(
        &mut self,
        source: &TraitIdentity,
        origin: &ContractId,
        name: &str,
        rules: &Rules,
        height: BlockNumber,
    ) -> Result<TraitIdentity, DefinitionError> {
        let methods = self
            .lookup(source)
            .ok_or_else(|| DefinitionError::UnknownTrait(source.clone()))?
            .methods
            .clone();

        let identity = TraitIdentity::new(origin.clone(), name);
        if let Some(existing) = self.lookup(&identity) {
            if existing.methods != methods {
                tracing::debug!("{} already exists with methods other than {}", identity, source);
                return Err(DefinitionError::AlreadyDefined(identity));
            }
            return Ok(identity);
        }

        self.define(origin, name, methods, rules, height)
    }

    /// Read view containing only traits defined at or below `height`
    pub fn view_at(&self, height: BlockNumber) -> PinnedCatalog<'_> {
        PinnedCatalog { catalog: self, height }
    }

    fn check_cycles(&self, pending: &IndexMap<TraitIdentity, TraitDefinition>) -> Result<(), DefinitionError> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();

        for identity in pending.keys() {
            if visited.contains(identity) {
                continue;
            }

            if let Some(cycle) = self.detect_cycle(identity, pending, &mut visited, &mut on_stack, Vec::new()) {
                tracing::debug!("Rejecting cyclic trait definition {}", identity);
                return Err(DefinitionError::CircularReference {
                    trait_id: identity.clone(),
                    cycle,
                });
            }
        }

        Ok(())
    }

    fn edges<'a>(
        &'a self,
        identity: &TraitIdentity,
        pending: &'a IndexMap<TraitIdentity, TraitDefinition>,
    ) -> Vec<&'a TraitIdentity> {
        pending
            .get(identity)
            .or_else(|| self.lookup(identity))
            .map(|definition| definition.referenced_traits())
            .unwrap_or_default()
    }

    fn detect_cycle(
        &self,
        current: &TraitIdentity,
        pending: &IndexMap<TraitIdentity, TraitDefinition>,
        visited: &mut HashSet<TraitIdentity>,
        on_stack: &mut HashSet<TraitIdentity>,
        mut path: Vec<TraitIdentity>,
    ) -> Option<Vec<TraitIdentity>> {
        visited.insert(current.clone());
        on_stack.insert(current.clone());
        path.push(current.clone());

        let mut found = None;
        for next in self.edges(current, pending) {
            if on_stack.contains(next) {
                let start = path.iter().position(|id| id == next).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(next.clone());
                found = Some(cycle);
                break;
            }

            if !visited.contains(next) {
                if let Some(cycle) = self.detect_cycle(next, pending, visited, on_stack, path.clone()) {
                    found = Some(cycle);
                    break;
                }
            }
        }

        on_stack.remove(current);
        found
    }
}

impl TraitLookup for TraitCatalog {
    fn lookup(&self, id: &TraitIdentity) -> Option<&TraitDefinition> {
        self.entries.get(id).map(|entry| &entry.definition)
    }
}

fn apply_duplicate_policy(
    identity: &TraitIdentity,
    methods: Vec<MethodSignature>,
    policy: DuplicateMethodPolicy,
) -> Result<Vec<MethodSignature>, DefinitionError> {
    let mut kept: Vec<MethodSignature> = Vec::with_capacity(methods.len());

    for method in methods {
        if kept.iter().any(|existing| existing.name == method.name) {
            match policy {
                DuplicateMethodPolicy::Reject => {
                    return Err(DefinitionError::DuplicateNamePolicyViolation {
                        trait_id: identity.clone(),
                        method: method.name,
                    })
                }
                // Exact repeats collapse; differing overloads are kept
                DuplicateMethodPolicy::Permit if kept.contains(&method) => continue,
                DuplicateMethodPolicy::Permit => {}
            }
        }
        kept.push(method);
    }

    Ok(kept)
}

/// Catalog restricted to a finalized height
#[derive(Debug, Clone, Copy)]
pub struct PinnedCatalog<'a> {
    catalog: &'a TraitCatalog,
    height: BlockNumber,
}

impl TraitLookup for PinnedCatalog<'_> {
    fn lookup(&self, id: &TraitIdentity) -> Option<&TraitDefinition> {
        self.catalog
            .entries
            .get(id)
            .filter(|entry| entry.defined_at_height <= self.height)
            .map(|entry| &entry.definition)
    }
}

/// Catalog overlaid with definitions validated but not yet committed
pub struct PendingCatalog<'a> {
    base: &'a dyn TraitLookup,
    pending: &'a [TraitDefinition],
}

impl<'a> PendingCatalog<'a> {
    pub fn new(base: &'a dyn TraitLookup, pending: &'a [TraitDefinition]) -> Self {
        Self { base, pending }
    }
}

impl TraitLookup for PendingCatalog<'_> {
    fn lookup(&self, id: &TraitIdentity) -> Option<&TraitDefinition> {
        self.pending
            .iter()
            .find(|definition| &definition.identity == id)
            .or_else(|| self.base.lookup(id))
    }
}
