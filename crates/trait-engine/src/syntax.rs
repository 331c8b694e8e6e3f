// trait-engine/src/syntax.rs

//! Contract source syntax.
//!
//! Source is tokenized with logos and read into s-expressions by a small
//! hand-written reader, then the top-level forms are interpreted:
//!
//! ```text
//! (define-trait math ((add (uint uint) (response uint uint))))
//! (use-trait math-alias .math-def.math)
//! (use-trait reexported (alias .math-def.math-alias))
//! (impl-trait .math-def.math)
//! (define-public (add (x uint) (y uint)) (response uint uint) (ok (+ x y)))
//! ```
//!
//! Function definitions declare their return type explicitly between the
//! signature and the body. Bodies use a deliberately small expression subset:
//! literals, argument names, `+`, `-`, `ok`, `err`, `some`, `none`, local
//! calls and `contract-call?`.

use crate::types::{ContractId, Symbol};
use crate::value::Value;
use logos::Logos;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Byte range into the source
pub type Span = Range<usize>;

/// Source token
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r";[^\n]*")]
pub enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    /// `u42`
    #[regex(r"u[0-9]+", |lex| lex.slice()[1..].parse::<u128>().ok())]
    UInt(u128),
    /// `42`, `-7`
    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i128>().ok())]
    Int(i128),
    /// `<trait-name>`
    #[regex(r"<[a-zA-Z][a-zA-Z0-9_\-!?]*>", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    TraitType(String),
    /// `.contract` or `.contract.trait`, without the leading dot
    #[regex(r"\.[a-zA-Z][a-zA-Z0-9_\-!?]*(\.[a-zA-Z][a-zA-Z0-9_\-!?]*)?", |lex| lex.slice()[1..].to_string())]
    LocalRef(String),
    /// `'ISSUER.contract` or `'ISSUER.contract.trait`, without the quote
    #[regex(r"'[0-9A-Z]+(\.[a-zA-Z][a-zA-Z0-9_\-!?]*)*", |lex| lex.slice()[1..].to_string())]
    PrincipalRef(String),
    #[regex(r"[a-zA-Z][a-zA-Z0-9_\-!?]*", |lex| lex.slice().to_string())]
    Ident(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid token at {}..{}", .span.start, .span.end)]
    InvalidToken { span: Span },

    #[error("unexpected `)` at {}", .span.start)]
    UnexpectedClose { span: Span },

    #[error("unclosed `(` opened at {}", .span.start)]
    Unclosed { span: Span },

    #[error("expected {expected} at {}..{}", .span.start, .span.end)]
    Expected { expected: &'static str, span: Span },

    #[error("unknown top-level form `{form}` at {}", .span.start)]
    UnknownForm { form: String, span: Span },

    #[error("unknown type `{name}` at {}", .span.start)]
    UnknownType { name: String, span: Span },
}

/// Type as written in source; trait types are still bare names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeSyntax {
    Int,
    UInt,
    Bool,
    Principal,
    Buff(u32),
    StringAscii(u32),
    StringUtf8(u32),
    Optional(Box<TypeSyntax>),
    Response(Box<TypeSyntax>, Box<TypeSyntax>),
    List(u32, Box<TypeSyntax>),
    Tuple(Vec<(Symbol, TypeSyntax)>),
    /// `<name>`: a local trait or a `use-trait` alias
    Trait(Symbol),
}

/// Contract named in source, before the deployer's issuer is applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractRef {
    /// `.name`
    Local(String),
    /// `'ISSUER.name`
    Qualified(ContractId),
}

impl ContractRef {
    pub fn qualify(&self, issuer: &str) -> ContractId {
        match self {
            ContractRef::Local(name) => ContractId::new(issuer, name.clone()),
            ContractRef::Qualified(id) => id.clone(),
        }
    }
}

/// `.contract.trait` / `'ISSUER.contract.trait`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitPath {
    pub contract: ContractRef,
    pub name: Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSyntax {
    pub name: Symbol,
    pub params: Vec<TypeSyntax>,
    pub ret: TypeSyntax,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitSyntax {
    pub name: Symbol,
    pub methods: Vec<MethodSyntax>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseTraitSyntax {
    pub alias: Symbol,
    pub target: TraitPath,
    /// `(alias .contract.name)`: follow the contract's alias `name` even
    /// when it also defines a trait of that name
    #[serde(default)]
    pub via_alias: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FunctionAccess {
    Public,
    ReadOnly,
    Private,
}

impl FunctionAccess {
    /// Public and read-only functions make up the contract interface
    pub fn is_exposed(&self) -> bool {
        !matches!(self, FunctionAccess::Private)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSyntax {
    pub access: FunctionAccess,
    pub name: Symbol,
    pub params: Vec<(Symbol, TypeSyntax)>,
    pub ret: TypeSyntax,
    pub body: Expr,
}

/// Target of a `contract-call?`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallTarget {
    /// Principal literal
    Static(ContractRef),
    /// Trait-typed argument of the enclosing function
    Dynamic(Symbol),
}

/// Function body expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Value),
    ContractLiteral(ContractRef),
    Var(Symbol),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    OkResponse(Box<Expr>),
    ErrResponse(Box<Expr>),
    SomeValue(Box<Expr>),
    NoneValue,
    /// Call to a function of the same contract
    Call { function: Symbol, args: Vec<Expr> },
    ContractCall {
        target: CallTarget,
        function: Symbol,
        args: Vec<Expr>,
    },
}

/// Parsed contract, in declaration order per form kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSource {
    pub traits: Vec<TraitSyntax>,
    pub use_traits: Vec<UseTraitSyntax>,
    pub impl_traits: Vec<TraitPath>,
    pub functions: Vec<FunctionSyntax>,
}

#[derive(Debug, Clone, PartialEq)]
enum SExpr {
    Atom(Token, Span),
    List(Vec<SExpr>, Span),
}

impl SExpr {
    fn span(&self) -> Span {
        match self {
            SExpr::Atom(_, span) | SExpr::List(_, span) => span.clone(),
        }
    }
}

/// Parse a whole contract
pub fn parse_contract(src: &str) -> Result<ContractSource, ParseError> {
    let mut contract = ContractSource::default();

    for form in read_all(src)? {
        let (items, span) = match &form {
            SExpr::List(items, span) => (items, span.clone()),
            other => {
                return Err(ParseError::Expected {
                    expected: "top-level form",
                    span: other.span(),
                })
            }
        };
        let (head, rest) = items.split_first().ok_or(ParseError::Expected {
            expected: "top-level form",
            span: span.clone(),
        })?;

        match expect_ident(head, "top-level form")? {
            "define-trait" => contract.traits.push(parse_define_trait(rest, span)?),
            "use-trait" => contract.use_traits.push(parse_use_trait(rest, span)?),
            "impl-trait" => match rest {
                [path] => contract.impl_traits.push(parse_trait_path(path)?),
                _ => {
                    return Err(ParseError::Expected {
                        expected: "(impl-trait .contract.trait)",
                        span,
                    })
                }
            },
            "define-public" => contract
                .functions
                .push(parse_function(FunctionAccess::Public, rest, span)?),
            "define-read-only" => contract
                .functions
                .push(parse_function(FunctionAccess::ReadOnly, rest, span)?),
            "define-private" => contract
                .functions
                .push(parse_function(FunctionAccess::Private, rest, span)?),
            other => {
                return Err(ParseError::UnknownForm {
                    form: other.to_string(),
                    span,
                })
            }
        }
    }

    Ok(contract)
}

/// Parse a single type, e.g. `(response uint uint)`
pub fn parse_type_str(src: &str) -> Result<TypeSyntax, ParseError> {
    match read_all(src)?.as_slice() {
        [single] => parse_type(single),
        _ => Err(ParseError::Expected {
            expected: "exactly one type",
            span: 0..src.len(),
        }),
    }
}

fn read_all(src: &str) -> Result<Vec<SExpr>, ParseError> {
    let mut top = Vec::new();
    let mut stack: Vec<(Vec<SExpr>, usize)> = Vec::new();

    for (token, span) in Token::lexer(src).spanned() {
        let token = token.map_err(|_| ParseError::InvalidToken { span: span.clone() })?;
        let finished = match token {
            Token::LParen => {
                stack.push((Vec::new(), span.start));
                continue;
            }
            Token::RParen => {
                let (items, start) = stack
                    .pop()
                    .ok_or(ParseError::UnexpectedClose { span: span.clone() })?;
                SExpr::List(items, start..span.end)
            }
            atom => SExpr::Atom(atom, span),
        };

        match stack.last_mut() {
            Some((parent, _)) => parent.push(finished),
            None => top.push(finished),
        }
    }

    if let Some((_, start)) = stack.first() {
        return Err(ParseError::Unclosed {
            span: *start..src.len(),
        });
    }

    Ok(top)
}

fn expect_ident<'a>(expr: &'a SExpr, expected: &'static str) -> Result<&'a str, ParseError> {
    match expr {
        SExpr::Atom(Token::Ident(name), _) => Ok(name),
        other => Err(ParseError::Expected {
            expected,
            span: other.span(),
        }),
    }
}

fn expect_list<'a>(expr: &'a SExpr, expected: &'static str) -> Result<&'a [SExpr], ParseError> {
    match expr {
        SExpr::List(items, _) => Ok(items),
        other => Err(ParseError::Expected {
            expected,
            span: other.span(),
        }),
    }
}

fn parse_define_trait(rest: &[SExpr], span: Span) -> Result<TraitSyntax, ParseError> {
    let [name, methods] = rest else {
        return Err(ParseError::Expected {
            expected: "(define-trait name (methods..))",
            span,
        });
    };

    let name = expect_ident(name, "trait name")?.to_string();
    let methods = expect_list(methods, "method list")?
        .iter()
        .map(parse_method)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TraitSyntax { name, methods })
}

fn parse_method(expr: &SExpr) -> Result<MethodSyntax, ParseError> {
    let [name, params, ret] = expect_list(expr, "method signature")? else {
        return Err(ParseError::Expected {
            expected: "(method (arg-types..) return-type)",
            span: expr.span(),
        });
    };

    Ok(MethodSyntax {
        name: expect_ident(name, "method name")?.to_string(),
        params: expect_list(params, "parameter type list")?
            .iter()
            .map(parse_type)
            .collect::<Result<Vec<_>, _>>()?,
        ret: parse_type(ret)?,
    })
}

fn parse_use_trait(rest: &[SExpr], span: Span) -> Result<UseTraitSyntax, ParseError> {
    let [alias, path] = rest else {
        return Err(ParseError::Expected {
            expected: "(use-trait alias .contract.trait)",
            span,
        });
    };
    let alias = expect_ident(alias, "trait alias")?.to_string();

    match path {
        SExpr::List(items, list_span) => match items.as_slice() {
            [SExpr::Atom(Token::Ident(head), _), inner] if head == "alias" => Ok(UseTraitSyntax {
                alias,
                target: parse_trait_path(inner)?,
                via_alias: true,
            }),
            _ => Err(ParseError::Expected {
                expected: "(alias .contract.alias)",
                span: list_span.clone(),
            }),
        },
        _ => Ok(UseTraitSyntax {
            alias,
            target: parse_trait_path(path)?,
            via_alias: false,
        }),
    }
}

fn parse_trait_path(expr: &SExpr) -> Result<TraitPath, ParseError> {
    let bad_path = || ParseError::Expected {
        expected: "trait path `.contract.trait`",
        span: expr.span(),
    };

    match expr {
        SExpr::Atom(Token::LocalRef(path), _) => match path.split_once('.') {
            Some((contract, name)) => Ok(TraitPath {
                contract: ContractRef::Local(contract.to_string()),
                name: name.to_string(),
            }),
            None => Err(bad_path()),
        },
        SExpr::Atom(Token::PrincipalRef(path), _) => {
            let parts: Vec<&str> = path.split('.').collect();
            match parts.as_slice() {
                [issuer, contract, name] => Ok(TraitPath {
                    contract: ContractRef::Qualified(ContractId::new(*issuer, *contract)),
                    name: name.to_string(),
                }),
                _ => Err(bad_path()),
            }
        }
        _ => Err(bad_path()),
    }
}

fn parse_contract_ref(expr: &SExpr) -> Option<ContractRef> {
    match expr {
        SExpr::Atom(Token::LocalRef(name), _) if !name.contains('.') => {
            Some(ContractRef::Local(name.clone()))
        }
        SExpr::Atom(Token::PrincipalRef(path), _) => ContractId::parse(path).map(ContractRef::Qualified),
        _ => None,
    }
}

fn parse_function(access: FunctionAccess, rest: &[SExpr], span: Span) -> Result<FunctionSyntax, ParseError> {
    let [signature, ret, body] = rest else {
        return Err(ParseError::Expected {
            expected: "(define-public (name (arg type)..) return-type body)",
            span,
        });
    };

    let (name, params) = expect_list(signature, "function signature")?
        .split_first()
        .ok_or(ParseError::Expected {
            expected: "function name",
            span: signature.span(),
        })?;

    let params = params
        .iter()
        .map(|param| -> Result<(Symbol, TypeSyntax), ParseError> {
            match expect_list(param, "(arg type)")? {
                [arg, ty] => Ok((expect_ident(arg, "argument name")?.to_string(), parse_type(ty)?)),
                _ => Err(ParseError::Expected {
                    expected: "(arg type)",
                    span: param.span(),
                }),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FunctionSyntax {
        access,
        name: expect_ident(name, "function name")?.to_string(),
        params,
        ret: parse_type(ret)?,
        body: parse_expr(body)?,
    })
}

fn parse_type(expr: &SExpr) -> Result<TypeSyntax, ParseError> {
    match expr {
        SExpr::Atom(Token::Ident(name), span) => match name.as_str() {
            "int" => Ok(TypeSyntax::Int),
            "uint" => Ok(TypeSyntax::UInt),
            "bool" => Ok(TypeSyntax::Bool),
            "principal" => Ok(TypeSyntax::Principal),
            other => Err(ParseError::UnknownType {
                name: other.to_string(),
                span: span.clone(),
            }),
        },
        SExpr::Atom(Token::TraitType(name), _) => Ok(TypeSyntax::Trait(name.clone())),
        SExpr::List(items, span) => {
            let (head, rest) = items.split_first().ok_or(ParseError::Expected {
                expected: "type",
                span: span.clone(),
            })?;
            let head = expect_ident(head, "type constructor")?;

            match (head, rest) {
                ("buff", [len]) => Ok(TypeSyntax::Buff(parse_len(len)?)),
                ("string-ascii", [len]) => Ok(TypeSyntax::StringAscii(parse_len(len)?)),
                ("string-utf8", [len]) => Ok(TypeSyntax::StringUtf8(parse_len(len)?)),
                ("optional", [inner]) => Ok(TypeSyntax::Optional(Box::new(parse_type(inner)?))),
                ("response", [ok, err]) => Ok(TypeSyntax::Response(
                    Box::new(parse_type(ok)?),
                    Box::new(parse_type(err)?),
                )),
                ("list", [len, item]) => Ok(TypeSyntax::List(parse_len(len)?, Box::new(parse_type(item)?))),
                ("tuple", fields) if !fields.is_empty() => {
                    let fields = fields
                        .iter()
                        .map(|field| -> Result<(Symbol, TypeSyntax), ParseError> {
                            match expect_list(field, "(field type)")? {
                                [name, ty] => Ok((expect_ident(name, "field name")?.to_string(), parse_type(ty)?)),
                                _ => Err(ParseError::Expected {
                                    expected: "(field type)",
                                    span: field.span(),
                                }),
                            }
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(TypeSyntax::Tuple(fields))
                }
                (other, _) => Err(ParseError::UnknownType {
                    name: other.to_string(),
                    span: span.clone(),
                }),
            }
        }
        other => Err(ParseError::Expected {
            expected: "type",
            span: other.span(),
        }),
    }
}

fn parse_len(expr: &SExpr) -> Result<u32, ParseError> {
    match expr {
        SExpr::Atom(Token::Int(n), _) => u32::try_from(*n).map_err(|_| ParseError::Expected {
            expected: "length",
            span: expr.span(),
        }),
        other => Err(ParseError::Expected {
            expected: "length",
            span: other.span(),
        }),
    }
}

fn parse_expr(expr: &SExpr) -> Result<Expr, ParseError> {
    match expr {
        SExpr::Atom(Token::UInt(v), _) => Ok(Expr::Literal(Value::UInt(*v))),
        SExpr::Atom(Token::Int(v), _) => Ok(Expr::Literal(Value::Int(*v))),
        SExpr::Atom(Token::True, _) => Ok(Expr::Literal(Value::Bool(true))),
        SExpr::Atom(Token::False, _) => Ok(Expr::Literal(Value::Bool(false))),
        SExpr::Atom(Token::Ident(name), _) if name == "none" => Ok(Expr::NoneValue),
        SExpr::Atom(Token::Ident(name), _) => Ok(Expr::Var(name.clone())),
        SExpr::Atom(Token::LocalRef(_) | Token::PrincipalRef(_), span) => parse_contract_ref(expr)
            .map(Expr::ContractLiteral)
            .ok_or(ParseError::Expected {
                expected: "contract principal",
                span: span.clone(),
            }),
        SExpr::Atom(_, span) => Err(ParseError::Expected {
            expected: "expression",
            span: span.clone(),
        }),
        SExpr::List(items, span) => {
            let (head, args) = items.split_first().ok_or(ParseError::Expected {
                expected: "expression",
                span: span.clone(),
            })?;

            match head {
                SExpr::Atom(Token::Plus, _) => fold_arithmetic(args, Expr::Add, span),
                SExpr::Atom(Token::Minus, _) => fold_arithmetic(args, Expr::Sub, span),
                SExpr::Atom(Token::Ident(name), _) => parse_application(name, args, span),
                other => Err(ParseError::Expected {
                    expected: "function name",
                    span: other.span(),
                }),
            }
        }
    }
}

fn parse_application(name: &str, args: &[SExpr], span: &Span) -> Result<Expr, ParseError> {
    let malformed = |expected| ParseError::Expected {
        expected,
        span: span.clone(),
    };

    match name {
        "ok" => match args {
            [inner] => Ok(Expr::OkResponse(Box::new(parse_expr(inner)?))),
            _ => Err(malformed("(ok value)")),
        },
        "err" => match args {
            [inner] => Ok(Expr::ErrResponse(Box::new(parse_expr(inner)?))),
            _ => Err(malformed("(err value)")),
        },
        "some" => match args {
            [inner] => Ok(Expr::SomeValue(Box::new(parse_expr(inner)?))),
            _ => Err(malformed("(some value)")),
        },
        "contract-call?" => match args {
            [target, function, rest @ ..] => {
                let target = match target {
                    SExpr::Atom(Token::Ident(arg), _) => CallTarget::Dynamic(arg.clone()),
                    other => CallTarget::Static(parse_contract_ref(other).ok_or(ParseError::Expected {
                        expected: "contract principal or trait argument",
                        span: other.span(),
                    })?),
                };
                Ok(Expr::ContractCall {
                    target,
                    function: expect_ident(function, "function name")?.to_string(),
                    args: rest.iter().map(parse_expr).collect::<Result<Vec<_>, _>>()?,
                })
            }
            _ => Err(malformed("(contract-call? target function args..)")),
        },
        _ => Ok(Expr::Call {
            function: name.to_string(),
            args: args.iter().map(parse_expr).collect::<Result<Vec<_>, _>>()?,
        }),
    }
}

fn fold_arithmetic(
    args: &[SExpr],
    op: fn(Box<Expr>, Box<Expr>) -> Expr,
    span: &Span,
) -> Result<Expr, ParseError> {
    let (first, rest) = match args {
        [first, rest @ ..] if !rest.is_empty() => (first, rest),
        _ => {
            return Err(ParseError::Expected {
                expected: "at least two operands",
                span: span.clone(),
            })
        }
    };

    rest.iter().try_fold(parse_expr(first)?, |acc, operand| {
        Ok(op(Box::new(acc), Box::new(parse_expr(operand)?)))
    })
}
