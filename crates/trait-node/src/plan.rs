// trait-node/src/plan.rs

//! Transaction plans replayed by `trait-node run`.
//!
//! A plan is a JSON document listing deployments, public calls, read-only
//! queries and block advances in the order they should be applied. Contract
//! principals are written `ISSUER.name`; call arguments use source literal
//! syntax (`u7`, `-3`, `true`) or a quoted principal (`'ST1.impl-math`).

use crate::{NodeError, NodeResult};
use chain_core::AccountId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trait_engine::{CallArg, ContractId, LanguageVersion, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanStep {
    Deploy {
        sender: AccountId,
        contract: String,
        /// Inline contract source
        #[serde(default)]
        source: Option<String>,
        /// Source file, relative to the plan file
        #[serde(default)]
        source_file: Option<PathBuf>,
        #[serde(default)]
        version: Option<LanguageVersion>,
        /// Overrides the configured deploy fee
        #[serde(default)]
        fee: Option<u64>,
    },
    Call {
        sender: AccountId,
        contract: String,
        function: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        fee: Option<u64>,
    },
    ReadOnly {
        contract: String,
        function: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Advance {
        blocks: u64,
    },
}

impl Plan {
    /// Load a plan, inlining every `source_file` relative to the plan's directory
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut plan: Plan = serde_json::from_str(&contents)?;
        let base = Path::new(path).parent().unwrap_or_else(|| Path::new("."));

        for step in &mut plan.steps {
            if let PlanStep::Deploy {
                source,
                source_file: Some(file),
                ..
            } = step
            {
                if source.is_none() {
                    *source = Some(std::fs::read_to_string(base.join(file.as_path()))?);
                }
            }
        }

        Ok(plan)
    }
}

pub fn parse_contract_id(text: &str) -> NodeResult<ContractId> {
    ContractId::parse(text.trim()).ok_or_else(|| NodeError::InvalidContract(text.to_string()))
}

/// Parse one call argument
pub fn parse_arg(text: &str) -> NodeResult<CallArg> {
    let text = text.trim();
    let invalid = || NodeError::InvalidArgument(text.to_string());

    if let Some(principal) = text.strip_prefix('\'') {
        return ContractId::parse(principal).map(CallArg::Contract).ok_or_else(invalid);
    }

    let value = match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "none" => Value::none(),
        _ => match text.strip_prefix('u') {
            Some(digits) => Value::UInt(digits.parse().map_err(|_| invalid())?),
            None => Value::Int(text.parse().map_err(|_| invalid())?),
        },
    };
    Ok(CallArg::Value(value))
}

pub fn parse_args(args: &[String]) -> NodeResult<Vec<CallArg>> {
    args.iter().map(|arg| parse_arg(arg)).collect()
}
