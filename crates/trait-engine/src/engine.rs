// trait-engine/src/engine.rs

//! Engine façade.
//!
//! Owns the trait catalog and the contract registry and exposes every
//! operation as a synchronous call that either commits completely or leaves
//! state untouched. Deployment is split into [`Engine::prepare_deployment`],
//! which validates against the committed state plus the contract's own
//! pending definitions, and [`Engine::commit_deployment`].

use crate::catalog::{PendingCatalog, TraitCatalog, TraitLookup};
use crate::conformance::{ConformanceChecker, ConformanceResult};
use crate::dispatch::{CallArg, DispatchCall, DispatchOutcome, DispatchRouter};
use crate::registry::{ContractFunction, ContractLookup, ContractRecord, ContractRegistry};
use crate::resolver::{
    AliasTarget, PendingAliases, RawAliasDecl, ReferenceResolver, ResolverConfig, Scope, TraitReference,
};
use crate::rules::{DuplicateMethodPolicy, EpochRuleSet, Rules};
use crate::syntax::{parse_contract, ContractSource, TraitPath};
use crate::types::{ContractId, LanguageVersion, MethodSignature, Symbol, TraitDefinition, TraitIdentity};
use crate::value::Value;
use crate::{DeployError, EngineError, EngineResult};
use chain_core::{AccountId, Amount, BlockNumber, EpochId, EpochSchedule, FeeLedger};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Height and epoch of the block being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    pub height: BlockNumber,
    pub epoch: EpochId,
}

impl BlockContext {
    pub fn new(height: BlockNumber, epoch: EpochId) -> Self {
        Self { height, epoch }
    }

    pub fn from_schedule(schedule: &EpochSchedule, height: BlockNumber) -> Self {
        Self {
            height,
            epoch: schedule.epoch_at(height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
}

fn default_max_call_depth() -> usize {
    DispatchRouter::DEFAULT_MAX_DEPTH
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            max_call_depth: default_max_call_depth(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub contract: ContractId,
    pub source: String,
    /// Explicit language version; only accepted from epoch 2.1
    #[serde(default)]
    pub language_version: Option<LanguageVersion>,
}

/// A validated deployment awaiting commit
#[derive(Debug, Clone)]
pub struct PreparedDeployment {
    rules: Rules,
    traits: Vec<TraitDefinition>,
    record: ContractRecord,
}

impl PreparedDeployment {
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn record(&self) -> &ContractRecord {
        &self.record
    }

    pub fn traits(&self) -> &[TraitDefinition] {
        &self.traits
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub fee_charged: Amount,
    pub result: Result<ContractId, DeployError>,
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
    catalog: TraitCatalog,
    registry: ContractRegistry,
    resolver: ReferenceResolver,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            catalog: TraitCatalog::new(),
            registry: ContractRegistry::new(),
            resolver: ReferenceResolver::new(config.resolver),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &TraitCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    /// Rules for `epoch`, with the epoch's default language version unless
    /// one is given
    pub fn rules_at(&self, epoch: EpochId, version: Option<LanguageVersion>) -> Rules {
        match version {
            Some(version) => EpochRuleSet::rules(epoch, version),
            None => EpochRuleSet::default_rules(epoch),
        }
    }

    /// Define a trait directly, outside of a contract deployment
    pub fn define_trait(
        &mut self,
        origin: &ContractId,
        name: &str,
        methods: Vec<MethodSignature>,
        version: Option<LanguageVersion>,
        ctx: BlockContext,
    ) -> EngineResult<TraitIdentity> {
        let rules = self.rules_at(ctx.epoch, version);
        Ok(self.catalog.define(origin, name, methods, &rules, ctx.height)?)
    }

    /// Return `(origin, name)`, defining it as a copy of `source` if needed
    pub fn copy_trait(
        &mut self,
        source: &TraitIdentity,
        origin: &ContractId,
        name: &str,
        ctx: BlockContext,
    ) -> EngineResult<TraitIdentity> {
        let rules = self.rules_at(ctx.epoch, None);
        Ok(self.catalog.get_or_copy(source, origin, name, &rules, ctx.height)?)
    }

    /// Resolve an alias declaration against committed state
    pub fn resolve_reference(&self, declaring: &ContractId, decl: &RawAliasDecl) -> EngineResult<TraitReference> {
        Ok(self
            .resolver
            .resolve_alias(declaring, decl, &self.catalog, &self.registry)?)
    }

    /// Structural check of a deployed contract against a trait
    pub fn check_conformance(&self, contract: &ContractId, trait_id: &TraitIdentity) -> EngineResult<ConformanceResult> {
        let record = self
            .registry
            .contract(contract)
            .ok_or_else(|| EngineError::ContractNotFound(contract.clone()))?;
        let definition = self
            .catalog
            .lookup(trait_id)
            .ok_or_else(|| EngineError::TraitNotFound(trait_id.clone()))?;

        Ok(ConformanceChecker::check(&record.public_interface, definition))
    }

    /// Charge the fee and dispatch a call under the rules of `ctx.epoch`
    pub fn dispatch_call(&self, ledger: &mut dyn FeeLedger, call: DispatchCall, ctx: BlockContext) -> DispatchOutcome {
        let rules = self.rules_at(ctx.epoch, None);
        DispatchRouter::new(rules, &self.catalog, &self.registry)
            .with_max_depth(self.config.max_call_depth)
            .dispatch(ledger, call)
    }

    /// Fee-less call against state finalized at `at.height`
    pub fn read_only_call(
        &self,
        contract: &ContractId,
        function: &str,
        args: Vec<CallArg>,
        at: BlockContext,
    ) -> EngineResult<Value> {
        let rules = self.rules_at(at.epoch, None);
        let traits = self.catalog.view_at(at.height);
        let contracts = self.registry.view_at(at.height);

        Ok(DispatchRouter::new(rules, &traits, &contracts)
            .with_max_depth(self.config.max_call_depth)
            .call_read_only(contract, function, args)?)
    }

    /// Charge the fee, then validate and commit a deployment
    pub fn deploy_contract(
        &mut self,
        ledger: &mut dyn FeeLedger,
        sender: &AccountId,
        fee: &Amount,
        request: &DeployRequest,
        ctx: BlockContext,
    ) -> DeployOutcome {
        if let Err(err) = ledger.debit(sender, fee) {
            tracing::warn!("Deployment of {} not paid: {}", request.contract, err);
            return DeployOutcome {
                fee_charged: Amount::zero(),
                result: Err(err.into()),
            };
        }

        let result = self
            .prepare_deployment(request, ctx)
            .and_then(|prepared| self.commit_deployment(prepared));

        if let Err(err) = &result {
            tracing::warn!(
                "Rejected deployment of {} at height {} (epoch {}): {}",
                request.contract,
                ctx.height,
                ctx.epoch,
                err
            );
        }

        DeployOutcome {
            fee_charged: fee.clone(),
            result,
        }
    }

    /// Validate a deployment without changing any state
    pub fn prepare_deployment(&self, request: &DeployRequest, ctx: BlockContext) -> Result<PreparedDeployment, DeployError> {
        let rules = EpochRuleSet::for_deployment(ctx.epoch, request.language_version)?;
        let contract = &request.contract;

        if self.registry.contains(contract) {
            return Err(DeployError::ContractAlreadyExists(contract.clone()));
        }

        let source = parse_contract(&request.source)?;
        tracing::debug!(
            "Parsed {}: {} traits, {} aliases, {} impls, {} functions",
            contract,
            source.traits.len(),
            source.use_traits.len(),
            source.impl_traits.len(),
            source.functions.len()
        );

        let decls = alias_decls(contract, &source)?;
        let aliases = self
            .resolver
            .resolve_all(contract, &decls, &self.catalog, &self.registry)?;
        for reference in aliases.values() {
            if let Some(definition) = self.catalog.lookup(&reference.target) {
                ConformanceChecker::check_use(definition)?;
            }
        }

        let mut scope = Scope::new(contract.clone());
        for (alias, reference) in &aliases {
            scope.add_alias(alias, reference.target.clone());
        }
        for definition in &source.traits {
            scope.define_local(&definition.name);
        }

        let batch = source
            .traits
            .iter()
            .map(|definition| -> Result<(Symbol, Vec<MethodSignature>), DeployError> {
                let methods = definition
                    .methods
                    .iter()
                    .map(|method| scope.canonicalize_method(method))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((definition.name.clone(), methods))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let pending = self.catalog.prepare_batch(contract, batch, &rules)?;

        let pending_catalog = PendingCatalog::new(&self.catalog, &pending);
        for definition in &pending {
            for method in &definition.methods {
                for ty in method.parameter_types.iter().chain(std::iter::once(&method.return_type)) {
                    ConformanceChecker::check_type_use(ty, &pending_catalog)?;
                }
            }
        }

        let functions = build_functions(&source, &scope, &rules, &pending_catalog)?;
        let public_interface: Vec<MethodSignature> = functions
            .iter()
            .filter(|f| f.access.is_exposed())
            .map(|f| f.signature.clone())
            .collect();

        let pending_aliases = PendingAliases::new(&self.registry, contract, &decls);
        let mut implemented_traits = BTreeSet::new();
        for path in &source.impl_traits {
            let target = self.resolve_impl_target(contract, path, &pending_catalog, &pending_aliases)?;
            let definition = pending_catalog.lookup(&target).ok_or_else(|| {
                DeployError::Definition(crate::DefinitionError::UnknownTrait(target.clone()))
            })?;
            ConformanceChecker::check(&public_interface, definition).into_result()?;
            tracing::debug!("{} implements {}", contract, target);
            implemented_traits.insert(target);
        }

        let record = ContractRecord {
            id: contract.clone(),
            deployed_at_epoch: ctx.epoch,
            deployed_at_height: ctx.height,
            language_version: rules.language_version,
            public_interface,
            declared_trait_aliases: aliases,
            implemented_traits,
            defined_traits: pending.iter().map(|d| d.identity.clone()).collect(),
            functions,
        };

        Ok(PreparedDeployment {
            rules,
            traits: pending,
            record,
        })
    }

    /// Commit a prepared deployment
    pub fn commit_deployment(&mut self, prepared: PreparedDeployment) -> Result<ContractId, DeployError> {
        let PreparedDeployment { rules, traits, record } = prepared;

        if self.registry.contains(&record.id) {
            return Err(DeployError::ContractAlreadyExists(record.id));
        }
        if let Some(existing) = traits.iter().find(|d| self.catalog.contains(&d.identity)) {
            return Err(crate::DefinitionError::AlreadyDefined(existing.identity.clone()).into());
        }

        let id = record.id.clone();
        let height = record.deployed_at_height;
        self.catalog.commit(traits, height);
        self.registry.insert(record)?;

        tracing::info!(
            "Deployed contract {} at height {} (epoch {}, language {})",
            id,
            height,
            rules.epoch,
            rules.language_version
        );
        Ok(id)
    }

    fn resolve_impl_target(
        &self,
        contract: &ContractId,
        path: &TraitPath,
        traits: &dyn TraitLookup,
        aliases: &PendingAliases<'_>,
    ) -> Result<TraitIdentity, DeployError> {
        let decl = RawAliasDecl {
            alias: format!("impl-trait {}", path.name),
            target: AliasTarget::Trait {
                contract: path.contract.qualify(&contract.issuer),
                name: path.name.clone(),
            },
        };
        Ok(self.resolver.resolve_alias(contract, &decl, traits, aliases)?.target)
    }
}

fn alias_decls(contract: &ContractId, source: &ContractSource) -> Result<Vec<RawAliasDecl>, DeployError> {
    let mut seen = HashSet::new();
    source
        .use_traits
        .iter()
        .map(|decl| {
            if !seen.insert(decl.alias.as_str()) {
                return Err(DeployError::NameConflict {
                    kind: "trait alias",
                    name: decl.alias.clone(),
                });
            }
            let target_contract = decl.target.contract.qualify(&contract.issuer);
            let target = if decl.via_alias {
                AliasTarget::Alias {
                    contract: target_contract,
                    alias: decl.target.name.clone(),
                }
            } else {
                AliasTarget::Trait {
                    contract: target_contract,
                    name: decl.target.name.clone(),
                }
            };
            Ok(RawAliasDecl {
                alias: decl.alias.clone(),
                target,
            })
        })
        .collect()
}

fn build_functions(
    source: &ContractSource,
    scope: &Scope,
    rules: &Rules,
    traits: &dyn TraitLookup,
) -> Result<Vec<ContractFunction>, DeployError> {
    let mut seen = HashSet::new();
    let mut functions = Vec::with_capacity(source.functions.len());

    for function in &source.functions {
        if !seen.insert(function.name.as_str())
            && rules.duplicate_method_definition_policy == DuplicateMethodPolicy::Reject
        {
            return Err(DeployError::NameConflict {
                kind: "function",
                name: function.name.clone(),
            });
        }

        let mut param_names = Vec::with_capacity(function.params.len());
        let mut parameter_types = Vec::with_capacity(function.params.len());
        for (name, ty) in &function.params {
            if param_names.contains(name) {
                return Err(DeployError::NameConflict {
                    kind: "argument",
                    name: name.clone(),
                });
            }
            let ty = scope.canonicalize_type(ty)?;
            ConformanceChecker::check_type_use(&ty, traits)?;
            param_names.push(name.clone());
            parameter_types.push(ty);
        }

        functions.push(ContractFunction {
            access: function.access,
            signature: MethodSignature::new(function.name.clone(), parameter_types, scope.canonicalize_type(&function.ret)?),
            param_names,
            body: function.body.clone(),
        });
    }

    Ok(functions)
}
