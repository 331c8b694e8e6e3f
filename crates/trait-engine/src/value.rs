// trait-engine/src/value.rs

use crate::types::{ContractId, TypeExpr};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime value passed to and returned from contract functions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Int(i128),
    UInt(u128),
    Bool(bool),
    Principal(ContractId),
    Optional(Option<Box<Value>>),
    Response(ResponseValue),
}

/// `(ok ..)` when `committed`, `(err ..)` otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseValue {
    pub committed: bool,
    pub data: Box<Value>,
}

impl Value {
    pub fn okay(data: Value) -> Self {
        Value::Response(ResponseValue {
            committed: true,
            data: Box::new(data),
        })
    }

    pub fn error(data: Value) -> Self {
        Value::Response(ResponseValue {
            committed: false,
            data: Box::new(data),
        })
    }

    pub fn some(data: Value) -> Self {
        Value::Optional(Some(Box::new(data)))
    }

    pub fn none() -> Self {
        Value::Optional(None)
    }

    /// `false` only for `(err ..)` responses
    pub fn is_committed(&self) -> bool {
        !matches!(self, Value::Response(ResponseValue { committed: false, .. }))
    }

    /// Whether this value may be bound to a parameter of type `ty`.
    ///
    /// Trait-typed parameters accept any contract principal here;
    /// conformance of that contract is verified separately.
    pub fn conforms_to(&self, ty: &TypeExpr) -> bool {
        match (self, ty) {
            (Value::Int(_), TypeExpr::Int) => true,
            (Value::UInt(_), TypeExpr::UInt) => true,
            (Value::Bool(_), TypeExpr::Bool) => true,
            (Value::Principal(_), TypeExpr::Principal) => true,
            (Value::Principal(_), TypeExpr::Trait(_)) => true,
            (Value::Optional(None), TypeExpr::Optional(_)) => true,
            (Value::Optional(Some(inner)), TypeExpr::Optional(ty)) => inner.conforms_to(ty),
            (Value::Response(resp), TypeExpr::Response(ok, err)) => {
                if resp.committed {
                    resp.data.conforms_to(ok)
                } else {
                    resp.data.conforms_to(err)
                }
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "u{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Principal(id) => write!(f, "'{}", id),
            Value::Optional(None) => f.write_str("none"),
            Value::Optional(Some(inner)) => write!(f, "(some {})", inner),
            Value::Response(resp) if resp.committed => write!(f, "(ok {})", resp.data),
            Value::Response(resp) => write!(f, "(err {})", resp.data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TraitIdentity;

    #[test]
    fn test_display() {
        assert_eq!(Value::okay(Value::UInt(7)).to_string(), "(ok u7)");
        assert_eq!(Value::error(Value::Int(-1)).to_string(), "(err -1)");
        assert_eq!(Value::some(Value::Bool(true)).to_string(), "(some true)");
        assert_eq!(
            Value::Principal(ContractId::new("ST1", "math")).to_string(),
            "'ST1.math"
        );
    }

    #[test]
    fn test_conforms_to() {
        let resp = TypeExpr::response(TypeExpr::UInt, TypeExpr::Int);
        assert!(Value::okay(Value::UInt(1)).conforms_to(&resp));
        assert!(Value::error(Value::Int(1)).conforms_to(&resp));
        assert!(!Value::okay(Value::Int(1)).conforms_to(&resp));
        assert!(Value::none().conforms_to(&TypeExpr::optional(TypeExpr::Bool)));
        assert!(!Value::UInt(1).conforms_to(&TypeExpr::Int));

        let trait_ty = TypeExpr::Trait(TraitIdentity::new(ContractId::new("ST1", "d"), "t"));
        assert!(Value::Principal(ContractId::new("ST1", "impl")).conforms_to(&trait_ty));
        assert!(!Value::UInt(3).conforms_to(&trait_ty));
    }

    #[test]
    fn test_is_committed() {
        assert!(Value::okay(Value::UInt(0)).is_committed());
        assert!(!Value::error(Value::UInt(0)).is_committed());
        assert!(Value::UInt(0).is_committed());
    }
}
