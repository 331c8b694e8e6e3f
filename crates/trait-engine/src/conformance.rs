// trait-engine/src/conformance.rs

//! Structural conformance of contract interfaces to traits.
//!
//! Matching is exact: same name, identical parameter types, identical return
//! type. Trait-typed parameters compare by identity, so two traits with the
//! same shape but different origins never substitute for each other.
//!
//! A trait with overloaded method names can be implemented partially (one
//! overload per name) but never fully, and can never be used as a type.

use crate::catalog::TraitLookup;
use crate::types::{MethodSignature, TraitDefinition, TypeExpr};
use crate::ConformanceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConformanceResult {
    Satisfied,
    Violation(ConformanceError),
}

impl ConformanceResult {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, ConformanceResult::Satisfied)
    }

    pub fn into_result(self) -> Result<(), ConformanceError> {
        match self {
            ConformanceResult::Satisfied => Ok(()),
            ConformanceResult::Violation(err) => Err(err),
        }
    }
}

pub struct ConformanceChecker;

impl ConformanceChecker {
    /// Check a contract interface against a trait
    pub fn check(interface: &[MethodSignature], definition: &TraitDefinition) -> ConformanceResult {
        let trait_id = &definition.identity;

        for (name, overloads) in definition.overloads() {
            let candidates: Vec<&MethodSignature> = interface.iter().filter(|m| m.name == name).collect();
            let matched = overloads
                .iter()
                .filter(|required| candidates.iter().any(|found| found == *required))
                .count();

            if overloads.len() > 1 {
                if matched == overloads.len() {
                    tracing::debug!("{} implements every overload of `{}`", trait_id, name);
                    return ConformanceResult::Violation(ConformanceError::AmbiguousTraitFullImplementation {
                        trait_id: trait_id.clone(),
                        method: name.to_string(),
                    });
                }
                if matched > 0 {
                    continue;
                }
            } else if matched == 1 {
                continue;
            }

            let violation = match (candidates.first(), overloads.first()) {
                (Some(found), Some(expected)) => ConformanceError::SignatureMismatch {
                    trait_id: trait_id.clone(),
                    method: name.to_string(),
                    expected: expected.to_string(),
                    found: found.to_string(),
                },
                _ => ConformanceError::MissingMethod {
                    trait_id: trait_id.clone(),
                    method: name.to_string(),
                },
            };
            tracing::debug!("Conformance to {} failed: {}", trait_id, violation);
            return ConformanceResult::Violation(violation);
        }

        ConformanceResult::Satisfied
    }

    /// Reject using an ambiguous trait as a type (`use-trait`, `<t>` parameters)
    pub fn check_use(definition: &TraitDefinition) -> Result<(), ConformanceError> {
        if definition.is_ambiguous() {
            return Err(ConformanceError::AmbiguousTraitUse {
                trait_id: definition.identity.clone(),
            });
        }
        Ok(())
    }

    /// [`check_use`](Self::check_use) for every trait a type mentions
    pub fn check_type_use(ty: &TypeExpr, traits: &dyn TraitLookup) -> Result<(), ConformanceError> {
        for id in ty.referenced_traits() {
            if let Some(definition) = traits.lookup(id) {
                Self::check_use(definition)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContractId, TraitIdentity};
    use chain_core::EpochId;

    fn resp() -> TypeExpr {
        TypeExpr::response(TypeExpr::UInt, TypeExpr::UInt)
    }

    fn sig(name: &str, params: Vec<TypeExpr>) -> MethodSignature {
        MethodSignature::new(name, params, resp())
    }

    fn definition(name: &str, methods: Vec<MethodSignature>) -> TraitDefinition {
        TraitDefinition {
            identity: TraitIdentity::new(ContractId::new("ST1", "defs"), name),
            methods,
            defined_at_epoch: EpochId::Epoch2_05,
        }
    }

    fn math() -> TraitDefinition {
        definition(
            "math",
            vec![
                sig("add", vec![TypeExpr::UInt, TypeExpr::UInt]),
                sig("sub", vec![TypeExpr::UInt, TypeExpr::UInt]),
            ],
        )
    }

    #[test]
    fn test_pointwise_match() {
        let interface = vec![
            sig("sub", vec![TypeExpr::UInt, TypeExpr::UInt]),
            sig("add", vec![TypeExpr::UInt, TypeExpr::UInt]),
            sig("extra", vec![]),
        ];
        assert!(ConformanceChecker::check(&interface, &math()).is_satisfied());
    }

    #[test]
    fn test_missing_and_mismatch() {
        let interface = vec![sig("add", vec![TypeExpr::UInt, TypeExpr::UInt])];
        assert!(matches!(
            ConformanceChecker::check(&interface, &math()),
            ConformanceResult::Violation(ConformanceError::MissingMethod { .. })
        ));

        let interface = vec![
            sig("add", vec![TypeExpr::Int, TypeExpr::Int]),
            sig("sub", vec![TypeExpr::UInt, TypeExpr::UInt]),
        ];
        assert!(matches!(
            ConformanceChecker::check(&interface, &math()),
            ConformanceResult::Violation(ConformanceError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn test_no_variance() {
        let interface = vec![
            MethodSignature::new("add", vec![TypeExpr::UInt, TypeExpr::UInt], TypeExpr::UInt),
            sig("sub", vec![TypeExpr::UInt, TypeExpr::UInt]),
        ];
        assert!(!ConformanceChecker::check(&interface, &math()).is_satisfied());
    }

    #[test]
    fn test_ambiguous_trait_asymmetry() {
        let ambiguous = definition(
            "getter",
            vec![sig("get", vec![TypeExpr::UInt]), sig("get", vec![TypeExpr::Int])],
        );

        let partial = vec![sig("get", vec![TypeExpr::UInt])];
        assert!(ConformanceChecker::check(&partial, &ambiguous).is_satisfied());

        let full = vec![sig("get", vec![TypeExpr::UInt]), sig("get", vec![TypeExpr::Int])];
        assert!(matches!(
            ConformanceChecker::check(&full, &ambiguous),
            ConformanceResult::Violation(ConformanceError::AmbiguousTraitFullImplementation { .. })
        ));

        assert!(matches!(
            ConformanceChecker::check_use(&ambiguous),
            Err(ConformanceError::AmbiguousTraitUse { .. })
        ));
        assert!(ConformanceChecker::check_use(&math()).is_ok());
    }

    #[test]
    fn test_empty_trait_always_satisfied() {
        let empty = definition("empty", vec![]);
        assert!(ConformanceChecker::check(&[], &empty).is_satisfied());
    }

    #[test]
    fn test_nested_trait_identity() {
        let a = TraitIdentity::new(ContractId::new("ST1", "a"), "t");
        let b = TraitIdentity::new(ContractId::new("ST1", "b"), "t");
        let required = definition("outer", vec![sig("run", vec![TypeExpr::Trait(a)])]);
        let interface = vec![sig("run", vec![TypeExpr::Trait(b)])];

        assert!(!ConformanceChecker::check(&interface, &required).is_satisfied());
    }

    #[test]
    fn test_trait_identity_inside_compound_types() {
        let a = TraitIdentity::new(ContractId::new("ST1", "a"), "t");
        let b = TraitIdentity::new(ContractId::new("ST1", "b"), "t");
        let wrapped = |id: &TraitIdentity| {
            TypeExpr::tuple(vec![
                ("target".into(), TypeExpr::optional(TypeExpr::Trait(id.clone()))),
                ("amount".into(), TypeExpr::UInt),
            ])
        };
        let required = definition("outer", vec![sig("run", vec![wrapped(&a)])]);

        assert!(ConformanceChecker::check(&[sig("run", vec![wrapped(&a)])], &required).is_satisfied());
        assert!(matches!(
            ConformanceChecker::check(&[sig("run", vec![wrapped(&b)])], &required),
            ConformanceResult::Violation(ConformanceError::SignatureMismatch { .. })
        ));
    }
}
