// trait-engine/tests/trait_scenarios.rs

use chain_core::{AccountId, Amount, EpochId, FeeLedger, InMemoryLedger};
use proptest::prelude::*;
use trait_engine::{
    AliasTarget, BlockContext, CallArg, ConformanceError, ContractId, DefinitionError, DeployError, DeployRequest,
    DispatchCall, DispatchError, DispatchMode, DispatchOutcome, DispatchPhase, Engine, EpochRuleSet, ExecutionStatus,
    LanguageVersion, RawAliasDecl, ResolutionError, ResolutionPath, TraitIdentity, Value,
};

const MATH: &str = "(define-trait math (
    (add (uint uint) (response uint uint))
    (sub (uint uint) (response uint uint))))";

const IMPL_MATH: &str = "(impl-trait .defs.math)
    (define-public (add (x uint) (y uint)) (response uint uint) (ok (+ x y)))
    (define-public (sub (x uint) (y uint)) (response uint uint) (ok (- x y)))";

const MATH_CALLER: &str = "(use-trait math .defs.math)
    (define-public (add-call (m <math>) (x uint) (y uint))
      (response uint uint)
      (contract-call? m add x y))";

const WRAPPER: &str = "(use-trait math .defs.math)
    (define-public (forward-add (m <math>) (x uint) (y uint))
      (response uint uint)
      (contract-call? .math-caller add-call m x y))";

fn id(name: &str) -> ContractId {
    ContractId::new("ST1", name)
}

struct Harness {
    engine: Engine,
    ledger: InMemoryLedger,
    epoch: EpochId,
    height: u64,
}

impl Harness {
    fn new(epoch: EpochId) -> Self {
        let mut ledger = InMemoryLedger::new();
        ledger.credit(&deployer(), &Amount::from_u64(1_000_000));
        ledger.credit(&caller(), &Amount::from_u64(1_000));
        Self {
            engine: Engine::default(),
            ledger,
            epoch,
            height: 0,
        }
    }

    fn ctx(&self) -> BlockContext {
        BlockContext::new(self.height, self.epoch)
    }

    fn deploy_with(&mut self, name: &str, source: &str, version: Option<LanguageVersion>) -> Result<ContractId, DeployError> {
        self.height += 1;
        let request = DeployRequest {
            contract: id(name),
            source: source.to_string(),
            language_version: version,
        };
        let ctx = self.ctx();
        self.engine
            .deploy_contract(&mut self.ledger, &deployer(), &Amount::from_u64(10), &request, ctx)
            .result
    }

    fn deploy(&mut self, name: &str, source: &str) -> Result<ContractId, DeployError> {
        self.deploy_with(name, source, None)
    }

    fn call(&mut self, contract: &str, function: &str, args: Vec<CallArg>, fee: u64) -> DispatchOutcome {
        let call = DispatchCall {
            sender: caller(),
            fee: Amount::from_u64(fee),
            contract: id(contract),
            function: function.to_string(),
            args,
        };
        let ctx = self.ctx();
        self.engine.dispatch_call(&mut self.ledger, call, ctx)
    }
}

fn deployer() -> AccountId {
    AccountId::new("ST1DEPLOYER")
}

fn caller() -> AccountId {
    AccountId::new("ST2CALLER")
}

fn math_args(target: &str) -> Vec<CallArg> {
    vec![
        CallArg::Contract(id(target)),
        CallArg::Value(Value::UInt(3)),
        CallArg::Value(Value::UInt(4)),
    ]
}

fn math_world(epoch: EpochId) -> Harness {
    let mut h = Harness::new(epoch);
    h.deploy("defs", MATH).unwrap();
    h.deploy("impl-math", IMPL_MATH).unwrap();
    h.deploy("math-caller", MATH_CALLER).unwrap();
    h.deploy("wrapper", WRAPPER).unwrap();
    h.deploy("not-math", "(define-public (mul (x uint)) (response uint uint) (ok x))")
        .unwrap();
    h
}

#[test]
fn test_add_call_direct() {
    for epoch in EpochId::ALL {
        let mut h = math_world(epoch);
        let outcome = h.call("math-caller", "add-call", math_args("impl-math"), 1);

        assert_eq!(outcome.result, Ok(Value::okay(Value::UInt(7))), "epoch {}", epoch);
        assert!(outcome.is_success());
    }
}

#[test]
fn test_add_call_through_wrapper_follows_dispatch_mode() {
    for epoch in EpochId::ALL {
        let mut h = math_world(epoch);
        let outcome = h.call("wrapper", "forward-add", math_args("impl-math"), 1);

        match EpochRuleSet::default_rules(epoch).trait_typed_dispatch_mode {
            DispatchMode::Direct | DispatchMode::Fixed => {
                assert_eq!(outcome.result, Ok(Value::okay(Value::UInt(7))), "epoch {}", epoch);
            }
            DispatchMode::Broken => {
                assert_eq!(
                    outcome.result,
                    Err(DispatchError::RegressionWindowNoSuchContract {
                        contract: id("impl-math")
                    }),
                    "epoch {}",
                    epoch
                );
                assert_eq!(outcome.final_phase(), DispatchPhase::Executed(ExecutionStatus::Failure));
            }
        }
    }
}

const HELPER_CALLER: &str = "(use-trait math .defs.math)
    (define-private (helper (m <math>) (x uint) (y uint))
      (response uint uint)
      (contract-call? m add x y))
    (define-public (add-via-helper (m <math>) (x uint) (y uint))
      (response uint uint)
      (helper m x y))";

const FIXED_WRAPPER: &str = "(define-public (add-impl (x uint) (y uint))
      (response uint uint)
      (contract-call? .math-caller add-call .impl-math x y))";

const HELPER_WRAPPER: &str = "(use-trait math .defs.math)
    (define-public (forward-to-helper (m <math>) (x uint) (y uint))
      (response uint uint)
      (contract-call? .helper-caller add-via-helper m x y))";

fn broken_epochs() -> impl Iterator<Item = EpochId> {
    EpochId::ALL
        .into_iter()
        .filter(|epoch| EpochRuleSet::default_rules(*epoch).trait_typed_dispatch_mode == DispatchMode::Broken)
}

#[test]
fn test_local_call_keeps_trait_value_dispatchable() {
    for epoch in broken_epochs() {
        let mut h = math_world(epoch);
        h.deploy("helper-caller", HELPER_CALLER).unwrap();

        let outcome = h.call("helper-caller", "add-via-helper", math_args("impl-math"), 1);
        assert_eq!(outcome.result, Ok(Value::okay(Value::UInt(7))), "epoch {}", epoch);
    }
}

#[test]
fn test_local_call_does_not_clear_forwarded_hops() {
    for epoch in broken_epochs() {
        let mut h = math_world(epoch);
        h.deploy("helper-caller", HELPER_CALLER).unwrap();
        h.deploy("helper-wrapper", HELPER_WRAPPER).unwrap();

        let outcome = h.call("helper-wrapper", "forward-to-helper", math_args("impl-math"), 1);
        assert_eq!(
            outcome.result,
            Err(DispatchError::RegressionWindowNoSuchContract {
                contract: id("impl-math")
            }),
            "epoch {}",
            epoch
        );
    }
}

#[test]
fn test_literal_principal_argument_is_not_forwarded() {
    for epoch in EpochId::ALL {
        let mut h = math_world(epoch);
        h.deploy("fixed-wrapper", FIXED_WRAPPER).unwrap();

        let outcome = h.call(
            "fixed-wrapper",
            "add-impl",
            vec![CallArg::Value(Value::UInt(3)), CallArg::Value(Value::UInt(4))],
            1,
        );
        assert_eq!(outcome.result, Ok(Value::okay(Value::UInt(7))), "epoch {}", epoch);
    }
}

#[test]
fn test_conformance_rejected_at_call_time() {
    let mut h = math_world(EpochId::Epoch24);
    let before = h.ledger.balance(&caller());

    let outcome = h.call("math-caller", "add-call", math_args("not-math"), 7);

    assert!(matches!(
        outcome.result,
        Err(DispatchError::ConformanceFailed(ConformanceError::MissingMethod { .. }))
    ));
    assert_eq!(
        outcome.phases,
        vec![
            DispatchPhase::Start,
            DispatchPhase::FeeDebited,
            DispatchPhase::ConformanceRejected,
            DispatchPhase::Failure,
        ]
    );
    assert_eq!(h.ledger.balance(&caller()), before - Amount::from_u64(7));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_fee_charged_regardless_of_outcome(
        fee in 0u64..2_000,
        conforming in any::<bool>(),
        through_wrapper in any::<bool>(),
        epoch_index in 0usize..EpochId::ALL.len(),
    ) {
        let mut h = math_world(EpochId::ALL[epoch_index]);
        let before = h.ledger.balance(&caller());
        let target = if conforming { "impl-math" } else { "not-math" };
        let (contract, function) = if through_wrapper {
            ("wrapper", "forward-add")
        } else {
            ("math-caller", "add-call")
        };

        let outcome = h.call(contract, function, math_args(target), fee);
        let after = h.ledger.balance(&caller());

        if Amount::from_u64(fee) <= before {
            prop_assert_eq!(outcome.fee_charged.clone(), Amount::from_u64(fee));
            prop_assert_eq!(after, before - Amount::from_u64(fee));
        } else {
            prop_assert!(matches!(outcome.result, Err(DispatchError::InsufficientFunds(_))));
            prop_assert!(outcome.fee_charged.is_zero());
            prop_assert_eq!(after, before);
        }
    }
}

const AMBIGUOUS: &str = "(define-trait getter (
    (get (uint) (response uint uint))
    (get (int) (response uint uint))))";

#[test]
fn test_ambiguous_trait_asymmetry() {
    let mut h = Harness::new(EpochId::Epoch2_05);
    h.deploy("amb", AMBIGUOUS).unwrap();

    let partial = "(impl-trait .amb.getter)
        (define-public (get (x uint)) (response uint uint) (ok x))";
    h.deploy("partial", partial).unwrap();

    let full = "(impl-trait .amb.getter)
        (define-public (get (x uint)) (response uint uint) (ok x))
        (define-public (get (x int)) (response uint uint) (ok u0))";
    assert!(matches!(
        h.deploy("full", full),
        Err(DeployError::Conformance(ConformanceError::AmbiguousTraitFullImplementation { .. }))
    ));

    assert!(matches!(
        h.deploy("user", "(use-trait g .amb.getter)"),
        Err(DeployError::Conformance(ConformanceError::AmbiguousTraitUse { .. }))
    ));
}

#[test]
fn test_ambiguous_trait_use_rejected_under_any_version() {
    let mut h = Harness::new(EpochId::Epoch21);
    h.deploy_with("amb", AMBIGUOUS, Some(LanguageVersion::V1)).unwrap();

    for version in [LanguageVersion::V1, LanguageVersion::V2] {
        let name = format!("user-{}", version);
        assert!(matches!(
            h.deploy_with(&name, "(use-trait g .amb.getter)", Some(version)),
            Err(DeployError::Conformance(ConformanceError::AmbiguousTraitUse { .. }))
        ));
    }
}

#[test]
fn test_duplicate_method_names_rejected_under_v2() {
    let mut h = Harness::new(EpochId::Epoch21);
    assert!(matches!(
        h.deploy("amb", AMBIGUOUS),
        Err(DeployError::Definition(DefinitionError::DuplicateNamePolicyViolation { .. }))
    ));
}

#[test]
fn test_circular_definitions_rejected_in_every_epoch() {
    let self_cycle = "(define-trait t ((f (<t>) (response uint uint))))";
    let mutual = "(define-trait a ((f (<b>) (response uint uint))))
        (define-trait b ((g (<a>) (response uint uint))))";

    for epoch in EpochId::ALL {
        let mut h = Harness::new(epoch);
        assert!(
            matches!(
                h.deploy("self-cycle", self_cycle),
                Err(DeployError::Definition(DefinitionError::CircularReference { .. }))
            ),
            "epoch {}",
            epoch
        );
        assert!(
            matches!(
                h.deploy("mutual", mutual),
                Err(DeployError::Definition(DefinitionError::CircularReference { .. }))
            ),
            "epoch {}",
            epoch
        );
    }
}

#[test]
fn test_forward_reference_rejected_in_every_epoch() {
    let forward = "(define-trait a ((f (<b>) (response uint uint))))
        (define-trait b ((g (uint) (response uint uint))))";
    let backward = "(define-trait b ((g (uint) (response uint uint))))
        (define-trait a ((f (<b>) (response uint uint))))";

    for epoch in EpochId::ALL {
        let mut h = Harness::new(epoch);
        assert!(matches!(
            h.deploy("forward", forward),
            Err(DeployError::Definition(DefinitionError::ForwardReference { .. }))
        ));
        assert!(h.deploy("backward", backward).is_ok());
    }
}

#[test]
fn test_alias_path_sensitivity() {
    let mut h = Harness::new(EpochId::Epoch24);
    h.deploy("a", "(define-trait t ((f (uint) (response uint uint))))").unwrap();
    h.deploy(
        "b",
        "(use-trait orig .a.t)
         (define-trait t ((f (int) (response uint uint))))",
    )
    .unwrap();
    h.deploy("impl-a", "(define-public (f (x uint)) (response uint uint) (ok x))")
        .unwrap();
    h.deploy("impl-b", "(define-public (f (x int)) (response uint uint) (ok u0))")
        .unwrap();

    h.deploy(
        "by-name",
        "(use-trait x .b.t)
         (define-public (run (p <x>)) (response uint uint) (contract-call? p f 1))",
    )
    .unwrap();
    h.deploy(
        "by-alias",
        "(use-trait y .b.orig)
         (define-public (run (p <y>)) (response uint uint) (contract-call? p f u1))",
    )
    .unwrap();

    let by_name = &h.engine.registry().iter().find(|r| r.id == id("by-name")).unwrap().declared_trait_aliases["x"];
    assert_eq!(by_name.target, TraitIdentity::new(id("b"), "t"));
    assert_eq!(by_name.path, ResolutionPath::ByName);

    let by_alias = &h.engine.registry().iter().find(|r| r.id == id("by-alias")).unwrap().declared_trait_aliases["y"];
    assert_eq!(by_alias.target, TraitIdentity::new(id("a"), "t"));
    assert_eq!(by_alias.path, ResolutionPath::AliasChain(vec![id("b")]));

    // Strict alias target through the façade
    let strict = h
        .engine
        .resolve_reference(
            &id("c"),
            &RawAliasDecl {
                alias: "z".into(),
                target: AliasTarget::Alias {
                    contract: id("b"),
                    alias: "orig".into(),
                },
            },
        )
        .unwrap();
    assert_eq!(strict.target, TraitIdentity::new(id("a"), "t"));

    let arg = |name: &str| vec![CallArg::Contract(id(name))];

    let ok = h.call("by-name", "run", arg("impl-b"), 1);
    assert_eq!(ok.result, Ok(Value::okay(Value::UInt(0))));
    let rejected = h.call("by-name", "run", arg("impl-a"), 1);
    assert!(matches!(rejected.result, Err(DispatchError::ConformanceFailed(_))));

    let ok = h.call("by-alias", "run", arg("impl-a"), 1);
    assert_eq!(ok.result, Ok(Value::okay(Value::UInt(1))));
    let rejected = h.call("by-alias", "run", arg("impl-b"), 1);
    assert!(matches!(rejected.result, Err(DispatchError::ConformanceFailed(_))));
}

#[test]
fn test_strict_alias_reaches_shadowed_reexport() {
    let mut h = Harness::new(EpochId::Epoch24);
    h.deploy("a", "(define-trait t ((f (uint) (response uint uint))))").unwrap();
    h.deploy(
        "b",
        "(use-trait t .a.t)
         (define-trait t ((f (int) (response uint uint))))",
    )
    .unwrap();
    h.deploy("impl-a", "(define-public (f (x uint)) (response uint uint) (ok x))")
        .unwrap();
    h.deploy("impl-b", "(define-public (f (x int)) (response uint uint) (ok u0))")
        .unwrap();

    h.deploy(
        "by-name",
        "(use-trait x .b.t)
         (define-public (run (p <x>)) (response uint uint) (contract-call? p f 1))",
    )
    .unwrap();
    h.deploy(
        "by-chain",
        "(use-trait y (alias .b.t))
         (define-public (run (p <y>)) (response uint uint) (contract-call? p f u1))",
    )
    .unwrap();

    let record = |name: &str| h.engine.registry().iter().find(|r| r.id == id(name)).unwrap().clone();
    let (name_record, chain_record) = (record("by-name"), record("by-chain"));

    let by_name = &name_record.declared_trait_aliases["x"];
    assert_eq!(by_name.target, TraitIdentity::new(id("b"), "t"));
    assert_eq!(by_name.path, ResolutionPath::ByName);

    let by_chain = &chain_record.declared_trait_aliases["y"];
    assert_eq!(by_chain.target, TraitIdentity::new(id("a"), "t"));
    assert_eq!(by_chain.path, ResolutionPath::AliasChain(vec![id("b")]));
    assert_eq!(
        by_chain.declared,
        AliasTarget::Alias {
            contract: id("b"),
            alias: "t".into()
        }
    );

    let arg = |name: &str| vec![CallArg::Contract(id(name))];

    assert_eq!(h.call("by-name", "run", arg("impl-b"), 1).result, Ok(Value::okay(Value::UInt(0))));
    assert!(matches!(
        h.call("by-name", "run", arg("impl-a"), 1).result,
        Err(DispatchError::ConformanceFailed(_))
    ));

    assert_eq!(h.call("by-chain", "run", arg("impl-a"), 1).result, Ok(Value::okay(Value::UInt(1))));
    assert!(matches!(
        h.call("by-chain", "run", arg("impl-b"), 1).result,
        Err(DispatchError::ConformanceFailed(_))
    ));
}

#[test]
fn test_unresolved_and_circular_aliases() {
    let mut h = Harness::new(EpochId::Epoch24);
    assert!(matches!(
        h.deploy("lost", "(use-trait t .nowhere.t)"),
        Err(DeployError::Resolution(ResolutionError::UnresolvedTarget { .. }))
    ));
    assert!(matches!(
        h.deploy("loop", "(use-trait t .loop.t)"),
        Err(DeployError::Resolution(ResolutionError::CircularAlias { .. }))
    ));
}

#[test]
fn test_empty_trait() {
    for epoch in EpochId::ALL {
        let mut h = Harness::new(epoch);
        h.deploy("e", "(define-trait empty ())").unwrap();
        h.deploy("nothing", "(impl-trait .e.empty)").unwrap();

        let empty = TraitIdentity::new(id("e"), "empty");
        assert!(h.engine.check_conformance(&id("nothing"), &empty).unwrap().is_satisfied());

        let ctx = h.ctx();
        let copy = h.engine.copy_trait(&empty, &id("other"), "empty-again", ctx).unwrap();
        assert_eq!(copy, TraitIdentity::new(id("other"), "empty-again"));

        h.deploy("e2", "(define-trait empty ())").unwrap();
    }
}
