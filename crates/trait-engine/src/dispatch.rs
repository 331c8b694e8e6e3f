// trait-engine/src/dispatch.rs

//! Call dispatch through trait-typed parameters.
//!
//! Every call attempt runs the same state machine:
//!
//! ```text
//! Start -> FeeDebited -> ConformanceVerified -> Executed(Success | Failure)
//! Start -> FeeDebited -> ConformanceRejected -> Failure
//! ```
//!
//! The fee is debited before anything else is looked at and is never
//! returned. A contract principal bound to a trait-typed parameter is checked
//! against the trait when the call is made, not when the caller was deployed.

use crate::catalog::TraitLookup;
use crate::conformance::ConformanceChecker;
use crate::registry::{ContractFunction, ContractLookup, ContractRecord};
use crate::rules::{DispatchMode, Rules};
use crate::syntax::{CallTarget, Expr};
use crate::types::{ContractId, Symbol, TraitIdentity, TypeExpr};
use crate::value::Value;
use crate::DispatchError;
use chain_core::{AccountId, Amount, FeeLedger};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Argument supplied by the transaction sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallArg {
    /// Concrete value for a value-typed parameter
    Value(Value),
    /// Contract principal for a trait-typed parameter
    Contract(ContractId),
}

impl CallArg {
    pub fn into_value(self) -> Value {
        match self {
            CallArg::Value(value) => value,
            CallArg::Contract(id) => Value::Principal(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchCall {
    pub sender: AccountId,
    pub fee: Amount,
    pub contract: ContractId,
    pub function: Symbol,
    pub args: Vec<CallArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchPhase {
    Start,
    FeeDebited,
    ConformanceVerified,
    ConformanceRejected,
    Executed(ExecutionStatus),
    Failure,
}

/// Result of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Phases in the order they were entered
    pub phases: Vec<DispatchPhase>,
    pub fee_charged: Amount,
    /// Returned value; an `(err ..)` response is still `Ok` here
    pub result: Result<Value, DispatchError>,
}

impl DispatchOutcome {
    pub fn final_phase(&self) -> DispatchPhase {
        self.phases.last().copied().unwrap_or(DispatchPhase::Start)
    }

    pub fn is_success(&self) -> bool {
        self.final_phase() == DispatchPhase::Executed(ExecutionStatus::Success)
    }
}

/// Value passed into a call together with how many contract-call hops a
/// trait value has travelled since the transaction supplied it
#[derive(Debug, Clone)]
struct Argument {
    value: Value,
    hops: usize,
}

impl Argument {
    fn entry(arg: CallArg) -> Self {
        Self {
            value: arg.into_value(),
            hops: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct TraitBinding {
    trait_id: TraitIdentity,
    contract: ContractId,
    hops: usize,
}

struct Frame<'a> {
    contract: &'a ContractRecord,
    vars: HashMap<Symbol, Value>,
    trait_bindings: HashMap<Symbol, TraitBinding>,
}

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithOp::Add => f.write_str("+"),
            ArithOp::Sub => f.write_str("-"),
        }
    }
}

/// Routes calls to concrete contracts under one set of rules
pub struct DispatchRouter<'a> {
    rules: Rules,
    traits: &'a dyn TraitLookup,
    contracts: &'a dyn ContractLookup,
    max_depth: usize,
}

impl<'a> DispatchRouter<'a> {
    pub const DEFAULT_MAX_DEPTH: usize = 64;

    pub fn new(rules: Rules, traits: &'a dyn TraitLookup, contracts: &'a dyn ContractLookup) -> Self {
        Self {
            rules,
            traits,
            contracts,
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Debit the fee, then verify and execute the call
    pub fn dispatch(&self, ledger: &mut dyn FeeLedger, call: DispatchCall) -> DispatchOutcome {
        let mut phases = vec![DispatchPhase::Start];

        if let Err(err) = ledger.debit(&call.sender, &call.fee) {
            tracing::warn!("Call to {}.{} not paid: {}", call.contract, call.function, err);
            return DispatchOutcome {
                phases,
                fee_charged: Amount::zero(),
                result: Err(err.into()),
            };
        }
        phases.push(DispatchPhase::FeeDebited);

        let args: Vec<Argument> = call.args.into_iter().map(Argument::entry).collect();
        let result = match self.enter(&call.contract, &call.function, args, 0) {
            Err(err) => {
                if matches!(err, DispatchError::ConformanceFailed(_)) {
                    phases.push(DispatchPhase::ConformanceRejected);
                }
                phases.push(DispatchPhase::Failure);
                Err(err)
            }
            Ok((function, frame)) => {
                phases.push(DispatchPhase::ConformanceVerified);
                let result = self.run(function, &frame, 0);
                let status = match &result {
                    Ok(value) if value.is_committed() => ExecutionStatus::Success,
                    _ => ExecutionStatus::Failure,
                };
                phases.push(DispatchPhase::Executed(status));
                result
            }
        };

        match &result {
            Ok(value) => tracing::info!(
                "Dispatched {}.{} for {} in epoch {}: {}",
                call.contract,
                call.function,
                call.sender,
                self.rules.epoch,
                value
            ),
            Err(err) => tracing::info!(
                "Dispatch of {}.{} for {} in epoch {} failed: {}",
                call.contract,
                call.function,
                call.sender,
                self.rules.epoch,
                err
            ),
        }

        DispatchOutcome {
            phases,
            fee_charged: call.fee,
            result,
        }
    }

    /// Execute without a fee. Nothing is written, so any exposed function
    /// may be called.
    pub fn call_read_only(&self, contract: &ContractId, function: &str, args: Vec<CallArg>) -> Result<Value, DispatchError> {
        let args = args.into_iter().map(Argument::entry).collect();
        let (function, frame) = self.enter(contract, function, args, 0)?;
        self.run(function, &frame, 0)
    }

    /// Structural check of `contract` against `trait_id`, made at call time
    pub fn verify_conformance(&self, trait_id: &TraitIdentity, contract: &ContractId) -> Result<(), DispatchError> {
        let definition = self
            .traits
            .lookup(trait_id)
            .ok_or_else(|| DispatchError::UnknownTrait(trait_id.clone()))?;
        let record = self
            .contracts
            .contract(contract)
            .ok_or_else(|| DispatchError::NoSuchContract(contract.clone()))?;

        ConformanceChecker::check(&record.public_interface, definition).into_result()?;
        tracing::debug!("{} conforms to {}", contract, trait_id);
        Ok(())
    }

    fn enter(
        &self,
        target: &ContractId,
        name: &str,
        args: Vec<Argument>,
        depth: usize,
    ) -> Result<(&'a ContractFunction, Frame<'a>), DispatchError> {
        if depth > self.max_depth {
            return Err(DispatchError::CallDepthExceeded(self.max_depth));
        }

        let record = self
            .contracts
            .contract(target)
            .ok_or_else(|| DispatchError::NoSuchContract(target.clone()))?;

        let values: Vec<Value> = args.iter().map(|arg| arg.value.clone()).collect();
        let function = match record.callable(name, &values) {
            Some(function) => function,
            None if record.function(name).map_or(false, |f| f.access.is_exposed()) => {
                return Err(DispatchError::ArgumentMismatch(format!(
                    "{}.{} cannot be called with ({})",
                    target,
                    name,
                    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
                )))
            }
            None => {
                return Err(DispatchError::NoSuchFunction {
                    contract: target.clone(),
                    function: name.to_string(),
                })
            }
        };

        let frame = self.bind(record, function, args)?;
        Ok((function, frame))
    }

    fn bind(&self, record: &'a ContractRecord, function: &ContractFunction, args: Vec<Argument>) -> Result<Frame<'a>, DispatchError> {
        let mut frame = Frame {
            contract: record,
            vars: HashMap::new(),
            trait_bindings: HashMap::new(),
        };

        for ((name, ty), arg) in function
            .param_names
            .iter()
            .zip(&function.signature.parameter_types)
            .zip(args)
        {
            if let (TypeExpr::Trait(trait_id), Value::Principal(contract)) = (ty, &arg.value) {
                self.verify_conformance(trait_id, contract)?;
                frame.trait_bindings.insert(
                    name.clone(),
                    TraitBinding {
                        trait_id: trait_id.clone(),
                        contract: contract.clone(),
                        hops: arg.hops,
                    },
                );
            }
            frame.vars.insert(name.clone(), arg.value);
        }

        Ok(frame)
    }

    fn run(&self, function: &ContractFunction, frame: &Frame<'a>, depth: usize) -> Result<Value, DispatchError> {
        let value = self.eval(&function.body, frame, depth)?;
        if !value.conforms_to(&function.signature.return_type) {
            return Err(DispatchError::Runtime(format!(
                "{}.{} returned {}, declared {}",
                frame.contract.id,
                function.name(),
                value,
                function.signature.return_type
            )));
        }
        Ok(value)
    }

    fn eval(&self, expr: &Expr, frame: &Frame<'a>, depth: usize) -> Result<Value, DispatchError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::ContractLiteral(reference) => Ok(Value::Principal(reference.qualify(&frame.contract.id.issuer))),
            Expr::Var(name) => frame
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| DispatchError::Runtime(format!("unbound variable `{}`", name))),
            Expr::Add(a, b) => arithmetic(ArithOp::Add, self.eval(a, frame, depth)?, self.eval(b, frame, depth)?),
            Expr::Sub(a, b) => arithmetic(ArithOp::Sub, self.eval(a, frame, depth)?, self.eval(b, frame, depth)?),
            Expr::OkResponse(inner) => Ok(Value::okay(self.eval(inner, frame, depth)?)),
            Expr::ErrResponse(inner) => Ok(Value::error(self.eval(inner, frame, depth)?)),
            Expr::SomeValue(inner) => Ok(Value::some(self.eval(inner, frame, depth)?)),
            Expr::NoneValue => Ok(Value::none()),
            Expr::Call { function, args } => self.call_local(frame, function, args, depth),
            Expr::ContractCall { target, function, args } => self.contract_call(frame, target, function, args, depth),
        }
    }

    fn call_local(&self, frame: &Frame<'a>, name: &str, args: &[Expr], depth: usize) -> Result<Value, DispatchError> {
        if depth + 1 > self.max_depth {
            return Err(DispatchError::CallDepthExceeded(self.max_depth));
        }

        // Local calls are not contract-call hops
        let args = self.eval_arguments(frame, args, 0, depth)?;
        let values: Vec<Value> = args.iter().map(|arg| arg.value.clone()).collect();

        let function = frame
            .contract
            .functions
            .iter()
            .rev()
            .find(|f| f.name() == name && f.accepts(&values))
            .ok_or_else(|| DispatchError::NoSuchFunction {
                contract: frame.contract.id.clone(),
                function: name.to_string(),
            })?;

        let callee = self.bind(frame.contract, function, args)?;
        self.run(function, &callee, depth + 1)
    }

    fn contract_call(
        &self,
        frame: &Frame<'a>,
        target: &CallTarget,
        function: &str,
        args: &[Expr],
        depth: usize,
    ) -> Result<Value, DispatchError> {
        let callee = match target {
            CallTarget::Static(reference) => reference.qualify(&frame.contract.id.issuer),
            CallTarget::Dynamic(name) => {
                let binding = frame
                    .trait_bindings
                    .get(name)
                    .ok_or_else(|| DispatchError::Runtime(format!("`{}` is not a trait-typed argument", name)))?;

                if self.rules.trait_typed_dispatch_mode == DispatchMode::Broken && binding.hops > 0 {
                    tracing::warn!(
                        "Trait value {} reached {} through {} contract call(s); dispatch unavailable in epoch {}",
                        binding.contract,
                        frame.contract.id,
                        binding.hops,
                        self.rules.epoch
                    );
                    return Err(DispatchError::RegressionWindowNoSuchContract {
                        contract: binding.contract.clone(),
                    });
                }

                self.verify_conformance(&binding.trait_id, &binding.contract)?;
                let declares_method = self
                    .traits
                    .lookup(&binding.trait_id)
                    .map_or(false, |definition| definition.methods.iter().any(|m| m.name == function));
                if !declares_method {
                    return Err(DispatchError::NoSuchFunction {
                        contract: binding.contract.clone(),
                        function: function.to_string(),
                    });
                }

                binding.contract.clone()
            }
        };

        let args = self.eval_arguments(frame, args, 1, depth)?;
        let (function, callee_frame) = self.enter(&callee, function, args, depth + 1)?;
        self.run(function, &callee_frame, depth + 1)
    }

    /// Evaluate call arguments; trait values forwarded by name carry their
    /// hop count plus `extra_hops`
    fn eval_arguments(&self, frame: &Frame<'a>, args: &[Expr], extra_hops: usize, depth: usize) -> Result<Vec<Argument>, DispatchError> {
        args.iter()
            .map(|expr| {
                if let Expr::Var(name) = expr {
                    if let Some(binding) = frame.trait_bindings.get(name) {
                        return Ok(Argument {
                            value: Value::Principal(binding.contract.clone()),
                            hops: binding.hops + extra_hops,
                        });
                    }
                }
                Ok(Argument {
                    value: self.eval(expr, frame, depth)?,
                    hops: 0,
                })
            })
            .collect()
    }
}

fn arithmetic(op: ArithOp, a: Value, b: Value) -> Result<Value, DispatchError> {
    let result = match (&a, &b) {
        (Value::UInt(x), Value::UInt(y)) => match op {
            ArithOp::Add => x.checked_add(*y),
            ArithOp::Sub => x.checked_sub(*y),
        }
        .map(Value::UInt),
        (Value::Int(x), Value::Int(y)) => match op {
            ArithOp::Add => x.checked_add(*y),
            ArithOp::Sub => x.checked_sub(*y),
        }
        .map(Value::Int),
        _ => {
            return Err(DispatchError::Runtime(format!(
                "cannot apply {} to {} and {}",
                op, a, b
            )))
        }
    };

    result.ok_or_else(|| DispatchError::Runtime(format!("arithmetic overflow in ({} {} {})", op, a, b)))
}
