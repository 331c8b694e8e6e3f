// trait-engine/src/types.rs

use chain_core::EpochId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier inside contract source (function, trait, alias, argument)
pub type Symbol = String;

/// Fully qualified contract principal: `ISSUER.contract-name`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractId {
    pub issuer: String,
    pub name: String,
}

impl ContractId {
    pub fn new(issuer: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            name: name.into(),
        }
    }

    /// Parse `ISSUER.name`
    pub fn parse(qualified: &str) -> Option<Self> {
        let (issuer, name) = qualified.split_once('.')?;
        if issuer.is_empty() || name.is_empty() || name.contains('.') {
            return None;
        }
        Some(Self::new(issuer, name))
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.issuer, self.name)
    }
}

/// A trait is the same trait iff it was defined by the same contract under
/// the same name. Textual re-declarations elsewhere are new identities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraitIdentity {
    pub origin: ContractId,
    pub name: Symbol,
}

impl TraitIdentity {
    pub fn new(origin: ContractId, name: impl Into<Symbol>) -> Self {
        Self {
            origin,
            name: name.into(),
        }
    }
}

impl fmt::Display for TraitIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.origin, self.name)
    }
}

/// Canonical value type. Trait types always carry an identity, never a
/// source-level name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    Int,
    UInt,
    Bool,
    Principal,
    Buff(u32),
    StringAscii(u32),
    StringUtf8(u32),
    Optional(Box<TypeExpr>),
    Response(Box<TypeExpr>, Box<TypeExpr>),
    List(u32, Box<TypeExpr>),
    /// Fields sorted by name
    Tuple(Vec<(Symbol, TypeExpr)>),
    Trait(TraitIdentity),
}

impl TypeExpr {
    pub fn optional(inner: TypeExpr) -> Self {
        TypeExpr::Optional(Box::new(inner))
    }

    pub fn response(ok: TypeExpr, err: TypeExpr) -> Self {
        TypeExpr::Response(Box::new(ok), Box::new(err))
    }

    pub fn list(max_len: u32, item: TypeExpr) -> Self {
        TypeExpr::List(max_len, Box::new(item))
    }

    /// Build a tuple type, sorting fields by name
    pub fn tuple(mut fields: Vec<(Symbol, TypeExpr)>) -> Self {
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        TypeExpr::Tuple(fields)
    }

    /// Trait identities mentioned anywhere inside this type
    pub fn referenced_traits(&self) -> Vec<&TraitIdentity> {
        let mut out = Vec::new();
        self.collect_traits(&mut out);
        out
    }

    fn collect_traits<'a>(&'a self, out: &mut Vec<&'a TraitIdentity>) {
        match self {
            TypeExpr::Trait(id) => out.push(id),
            TypeExpr::Optional(inner) | TypeExpr::List(_, inner) => inner.collect_traits(out),
            TypeExpr::Response(ok, err) => {
                ok.collect_traits(out);
                err.collect_traits(out);
            }
            TypeExpr::Tuple(fields) => {
                for (_, ty) in fields {
                    ty.collect_traits(out);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Int => f.write_str("int"),
            TypeExpr::UInt => f.write_str("uint"),
            TypeExpr::Bool => f.write_str("bool"),
            TypeExpr::Principal => f.write_str("principal"),
            TypeExpr::Buff(len) => write!(f, "(buff {})", len),
            TypeExpr::StringAscii(len) => write!(f, "(string-ascii {})", len),
            TypeExpr::StringUtf8(len) => write!(f, "(string-utf8 {})", len),
            TypeExpr::Optional(inner) => write!(f, "(optional {})", inner),
            TypeExpr::Response(ok, err) => write!(f, "(response {} {})", ok, err),
            TypeExpr::List(len, item) => write!(f, "(list {} {})", len, item),
            TypeExpr::Tuple(fields) => {
                f.write_str("(tuple")?;
                for (name, ty) in fields {
                    write!(f, " ({} {})", name, ty)?;
                }
                f.write_str(")")
            }
            TypeExpr::Trait(id) => write!(f, "<{}>", id),
        }
    }
}

/// Method signature as declared by a trait or exposed by a contract
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: Symbol,
    pub parameter_types: Vec<TypeExpr>,
    pub return_type: TypeExpr,
}

impl MethodSignature {
    pub fn new(name: impl Into<Symbol>, parameter_types: Vec<TypeExpr>, return_type: TypeExpr) -> Self {
        Self {
            name: name.into(),
            parameter_types,
            return_type,
        }
    }

    /// Same parameter and return types, ignoring the name
    pub fn same_shape(&self, other: &MethodSignature) -> bool {
        self.parameter_types == other.parameter_types && self.return_type == other.return_type
    }

    pub fn referenced_traits(&self) -> Vec<&TraitIdentity> {
        self.parameter_types
            .iter()
            .chain(std::iter::once(&self.return_type))
            .flat_map(|ty| ty.referenced_traits())
            .collect()
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} (", self.name)?;
        for (i, ty) in self.parameter_types.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", ty)?;
        }
        write!(f, ") {})", self.return_type)
    }
}

/// Validated trait definition, owned by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitDefinition {
    pub identity: TraitIdentity,
    /// Declaration order
    pub methods: Vec<MethodSignature>,
    pub defined_at_epoch: EpochId,
}

impl TraitDefinition {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Methods grouped by name, in first-declaration order
    pub fn overloads(&self) -> IndexMap<&str, Vec<&MethodSignature>> {
        let mut groups: IndexMap<&str, Vec<&MethodSignature>> = IndexMap::new();
        for method in &self.methods {
            groups.entry(method.name.as_str()).or_default().push(method);
        }
        groups
    }

    /// A trait that declares the same method name twice cannot be
    /// implemented in full nor used as a parameter type.
    pub fn is_ambiguous(&self) -> bool {
        self.overloads().values().any(|group| group.len() > 1)
    }

    pub fn referenced_traits(&self) -> Vec<&TraitIdentity> {
        self.methods.iter().flat_map(|m| m.referenced_traits()).collect()
    }
}

/// Contract language version, selectable per deployment from epoch 2.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageVersion {
    V1,
    V2,
}

impl LanguageVersion {
    /// Version used when a deployment does not name one
    pub fn default_for_epoch(epoch: EpochId) -> Self {
        if epoch >= EpochId::Epoch21 {
            LanguageVersion::V2
        } else {
            LanguageVersion::V1
        }
    }
}

impl fmt::Display for LanguageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageVersion::V1 => f.write_str("v1"),
            LanguageVersion::V2 => f.write_str("v2"),
        }
    }
}

impl FromStr for LanguageVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(LanguageVersion::V1),
            "v2" | "2" => Ok(LanguageVersion::V2),
            other => Err(format!("unknown language version `{}`", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trait_id(contract: &str, name: &str) -> TraitIdentity {
        TraitIdentity::new(ContractId::new("ST1", contract), name)
    }

    #[test]
    fn test_contract_id_parse() {
        let id = ContractId::parse("ST1PQ.math").unwrap();
        assert_eq!(id.issuer, "ST1PQ");
        assert_eq!(id.name, "math");
        assert_eq!(id.to_string(), "ST1PQ.math");

        assert!(ContractId::parse("no-dot").is_none());
        assert!(ContractId::parse("ST1.a.b").is_none());
    }

    #[test]
    fn test_trait_identity_equality() {
        assert_eq!(trait_id("a", "t"), trait_id("a", "t"));
        assert_ne!(trait_id("a", "t"), trait_id("b", "t"));
    }

    #[test]
    fn test_type_display() {
        let ty = TypeExpr::response(TypeExpr::UInt, TypeExpr::optional(TypeExpr::Trait(trait_id("c", "t"))));
        assert_eq!(ty.to_string(), "(response uint (optional <ST1.c.t>))");
    }

    #[test]
    fn test_tuple_fields_sorted() {
        let ty = TypeExpr::tuple(vec![("b".into(), TypeExpr::Bool), ("a".into(), TypeExpr::Int)]);
        assert_eq!(ty.to_string(), "(tuple (a int) (b bool))");
    }

    #[test]
    fn test_referenced_traits_nested() {
        let sig = MethodSignature::new(
            "get",
            vec![TypeExpr::list(3, TypeExpr::Trait(trait_id("c", "t1")))],
            TypeExpr::response(TypeExpr::Trait(trait_id("c", "t2")), TypeExpr::UInt),
        );
        let refs = sig.referenced_traits();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], &trait_id("c", "t1"));
        assert_eq!(refs[1], &trait_id("c", "t2"));
    }

    #[test]
    fn test_ambiguous_trait() {
        let def = TraitDefinition {
            identity: trait_id("c", "t"),
            methods: vec![
                MethodSignature::new("get", vec![TypeExpr::UInt], TypeExpr::UInt),
                MethodSignature::new("get", vec![TypeExpr::Int], TypeExpr::UInt),
            ],
            defined_at_epoch: EpochId::Epoch2_05,
        };
        assert!(def.is_ambiguous());
        assert_eq!(def.overloads()["get"].len(), 2);
    }

    #[test]
    fn test_default_language_version() {
        assert_eq!(LanguageVersion::default_for_epoch(EpochId::Epoch2_05), LanguageVersion::V1);
        assert_eq!(LanguageVersion::default_for_epoch(EpochId::Epoch21), LanguageVersion::V2);
        assert_eq!("V2".parse::<LanguageVersion>().unwrap(), LanguageVersion::V2);
    }
}
