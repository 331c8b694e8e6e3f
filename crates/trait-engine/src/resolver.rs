// trait-engine/src/resolver.rs

//! Trait reference resolution.
//!
//! A `use-trait` declaration names a trait either directly by the contract
//! that defines it, or through another contract's alias. Aliases are followed
//! transitively until a definition is reached. The path taken is recorded
//! because it is observable: going through a contract *by name* finds that
//! contract's own definition first, while following its alias finds whatever
//! the alias points at.

use crate::catalog::TraitLookup;
use crate::syntax::{MethodSyntax, TypeSyntax};
use crate::types::{ContractId, MethodSignature, Symbol, TraitIdentity, TypeExpr};
use crate::ResolutionError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// What a `use-trait` declaration points at
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AliasTarget {
    /// The trait `contract` defines under `name`; if it defines none, the
    /// alias `contract` declares under that name
    Trait { contract: ContractId, name: Symbol },
    /// Strictly the alias `contract` declares
    Alias { contract: ContractId, alias: Symbol },
}

impl AliasTarget {
    pub fn contract(&self) -> &ContractId {
        match self {
            AliasTarget::Trait { contract, .. } | AliasTarget::Alias { contract, .. } => contract,
        }
    }
}

impl fmt::Display for AliasTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasTarget::Trait { contract, name } => write!(f, "{}.{}", contract, name),
            AliasTarget::Alias { contract, alias } => write!(f, "{}.{} (alias)", contract, alias),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAliasDecl {
    pub alias: Symbol,
    pub target: AliasTarget,
}

/// How a reference reached its definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionPath {
    /// The first contract named defines the trait
    ByName,
    /// Contracts whose aliases were followed, in order
    AliasChain(Vec<ContractId>),
}

/// A resolved `use-trait` declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitReference {
    pub alias: Symbol,
    pub target: TraitIdentity,
    pub declared: AliasTarget,
    pub path: ResolutionPath,
}

/// Read access to contracts' alias declarations
pub trait AliasLookup {
    fn contract_exists(&self, id: &ContractId) -> bool;

    /// Declared target of `contract`'s alias `alias`
    fn alias_decl(&self, contract: &ContractId, alias: &str) -> Option<AliasTarget>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Longest alias chain followed before giving up
    pub max_alias_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { max_alias_depth: 16 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    config: ResolverConfig,
}

impl ReferenceResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve one declaration made by `declaring`
    pub fn resolve_alias(
        &self,
        declaring: &ContractId,
        decl: &RawAliasDecl,
        traits: &dyn TraitLookup,
        aliases: &dyn AliasLookup,
    ) -> Result<TraitReference, ResolutionError> {
        let unresolved = || ResolutionError::UnresolvedTarget {
            declaring: declaring.clone(),
            target: decl.target.to_string(),
        };

        let mut seen: HashSet<(ContractId, Symbol)> = HashSet::new();
        seen.insert((declaring.clone(), decl.alias.clone()));
        let mut hops: Vec<ContractId> = Vec::new();
        let mut current = decl.target.clone();

        loop {
            let contract = current.contract().clone();
            if !aliases.contract_exists(&contract) {
                return Err(unresolved());
            }

            let alias_name = match &current {
                AliasTarget::Trait { name, .. } => {
                    let identity = TraitIdentity::new(contract.clone(), name.clone());
                    if traits.contains(&identity) {
                        let path = if hops.is_empty() {
                            ResolutionPath::ByName
                        } else {
                            ResolutionPath::AliasChain(hops)
                        };
                        tracing::debug!("Resolved {} alias `{}` to {} ({:?})", declaring, decl.alias, identity, path);
                        return Ok(TraitReference {
                            alias: decl.alias.clone(),
                            target: identity,
                            declared: decl.target.clone(),
                            path,
                        });
                    }
                    name.clone()
                }
                AliasTarget::Alias { alias, .. } => alias.clone(),
            };

            let next = aliases.alias_decl(&contract, &alias_name).ok_or_else(unresolved)?;

            let revisited = !seen.insert((contract.clone(), alias_name));
            hops.push(contract);
            if revisited || hops.len() > self.config.max_alias_depth {
                let mut chain = vec![declaring.clone()];
                chain.extend(hops);
                tracing::debug!("Alias chain from {} does not terminate", declaring);
                return Err(ResolutionError::CircularAlias {
                    declaring: declaring.clone(),
                    chain,
                });
            }

            current = next;
        }
    }

    /// Resolve every declaration of a contract being deployed. Declarations
    /// may follow each other's aliases within the same contract.
    pub fn resolve_all(
        &self,
        declaring: &ContractId,
        decls: &[RawAliasDecl],
        traits: &dyn TraitLookup,
        aliases: &dyn AliasLookup,
    ) -> Result<IndexMap<Symbol, TraitReference>, ResolutionError> {
        let overlay = PendingAliases::new(aliases, declaring, decls);
        let mut resolved = IndexMap::new();
        for decl in decls {
            let reference = self.resolve_alias(declaring, decl, traits, &overlay)?;
            resolved.insert(decl.alias.clone(), reference);
        }
        Ok(resolved)
    }
}

/// Alias lookup overlaid with the declarations of a contract being deployed
pub struct PendingAliases<'a> {
    base: &'a dyn AliasLookup,
    contract: &'a ContractId,
    decls: &'a [RawAliasDecl],
}

impl<'a> PendingAliases<'a> {
    pub fn new(base: &'a dyn AliasLookup, contract: &'a ContractId, decls: &'a [RawAliasDecl]) -> Self {
        Self { base, contract, decls }
    }
}

impl AliasLookup for PendingAliases<'_> {
    fn contract_exists(&self, id: &ContractId) -> bool {
        id == self.contract || self.base.contract_exists(id)
    }

    fn alias_decl(&self, contract: &ContractId, alias: &str) -> Option<AliasTarget> {
        if contract == self.contract {
            return self
                .decls
                .iter()
                .find(|decl| decl.alias == alias)
                .map(|decl| decl.target.clone());
        }
        self.base.alias_decl(contract, alias)
    }
}

/// Trait names visible inside one contract's source.
///
/// A trait the contract defines itself shadows an alias of the same name.
#[derive(Debug, Clone)]
pub struct Scope {
    contract: ContractId,
    local_traits: IndexMap<Symbol, TraitIdentity>,
    aliases: IndexMap<Symbol, TraitIdentity>,
}

impl Scope {
    pub fn new(contract: ContractId) -> Self {
        Self {
            contract,
            local_traits: IndexMap::new(),
            aliases: IndexMap::new(),
        }
    }

    pub fn define_local(&mut self, name: &str) {
        let identity = TraitIdentity::new(self.contract.clone(), name);
        self.local_traits.insert(name.to_string(), identity);
    }

    pub fn add_alias(&mut self, alias: &str, target: TraitIdentity) {
        self.aliases.insert(alias.to_string(), target);
    }

    pub fn resolve_name(&self, name: &str) -> Result<&TraitIdentity, ResolutionError> {
        self.local_traits
            .get(name)
            .or_else(|| self.aliases.get(name))
            .ok_or_else(|| ResolutionError::UnresolvedTarget {
                declaring: self.contract.clone(),
                target: format!("<{}>", name),
            })
    }

    /// Convert a source type to its canonical form
    pub fn canonicalize_type(&self, ty: &TypeSyntax) -> Result<TypeExpr, ResolutionError> {
        Ok(match ty {
            TypeSyntax::Int => TypeExpr::Int,
            TypeSyntax::UInt => TypeExpr::UInt,
            TypeSyntax::Bool => TypeExpr::Bool,
            TypeSyntax::Principal => TypeExpr::Principal,
            TypeSyntax::Buff(len) => TypeExpr::Buff(*len),
            TypeSyntax::StringAscii(len) => TypeExpr::StringAscii(*len),
            TypeSyntax::StringUtf8(len) => TypeExpr::StringUtf8(*len),
            TypeSyntax::Optional(inner) => TypeExpr::optional(self.canonicalize_type(inner)?),
            TypeSyntax::Response(ok, err) => {
                TypeExpr::response(self.canonicalize_type(ok)?, self.canonicalize_type(err)?)
            }
            TypeSyntax::List(len, item) => TypeExpr::list(*len, self.canonicalize_type(item)?),
            TypeSyntax::Tuple(fields) => TypeExpr::tuple(
                fields
                    .iter()
                    .map(|(name, ty)| self.canonicalize_type(ty).map(|ty| (name.clone(), ty)))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            TypeSyntax::Trait(name) => TypeExpr::Trait(self.resolve_name(name)?.clone()),
        })
    }

    pub fn canonicalize_method(&self, method: &MethodSyntax) -> Result<MethodSignature, ResolutionError> {
        Ok(MethodSignature::new(
            method.name.clone(),
            method
                .params
                .iter()
                .map(|ty| self.canonicalize_type(ty))
                .collect::<Result<Vec<_>, _>>()?,
            self.canonicalize_type(&method.ret)?,
        ))
    }
}
