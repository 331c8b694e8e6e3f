// trait-node/src/runtime.rs
use crate::plan::{parse_args, parse_contract_id, Plan, PlanStep};
use crate::{NodeConfig, NodeError, NodeResult};
use chain_core::{
    AccountId, AdmissionDecision, Amount, BlockNumber, EpochId, InMemoryLedger, TransactionKind, TransactionReceipt,
    TxStatus,
};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use trait_engine::{
    BlockContext, CallArg, ContractId, DeployRequest, DispatchCall, DispatchError, Engine, EngineError, Value,
};

/// What applying one plan step produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepOutput {
    Receipt(TransactionReceipt),
    ReadOnly {
        contract: String,
        function: String,
        height: BlockNumber,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Advanced {
        height: BlockNumber,
        epoch: EpochId,
    },
}

/// Single-process chain driving the engine block by block
pub struct Node {
    config: NodeConfig,
    engine: Arc<RwLock<Engine>>,
    ledger: InMemoryLedger,
    height: BlockNumber,
}

impl Node {
    pub fn new(config: NodeConfig) -> anyhow::Result<Self> {
        tracing::info!("Initializing node components");

        let mut ledger = InMemoryLedger::new();
        for genesis in &config.accounts {
            ledger.credit(&genesis.account, &Amount::from_u64(genesis.balance));
        }
        tracing::info!("✓ Ledger initialized: {} genesis accounts", config.accounts.len());

        let engine = Arc::new(RwLock::new(Engine::new(config.engine)));
        tracing::info!(
            "✓ Engine initialized: max_alias_depth={}, max_call_depth={}",
            config.engine.resolver.max_alias_depth,
            config.engine.max_call_depth
        );

        Ok(Self {
            config,
            engine,
            ledger,
            height: 0,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }

    pub fn height(&self) -> BlockNumber {
        self.height
    }

    pub fn context(&self) -> BlockContext {
        BlockContext::from_schedule(&self.config.epochs, self.height)
    }

    pub fn advance(&mut self, blocks: u64) -> BlockContext {
        let before = self.context().epoch;
        self.height += blocks;
        let ctx = self.context();
        if ctx.epoch != before {
            tracing::info!("Entered epoch {} at height {}", ctx.epoch, ctx.height);
        }
        ctx
    }

    /// Deploy a contract in the current block, applying the admission policy
    pub fn deploy(&mut self, sender: &AccountId, request: &DeployRequest, fee: Amount) -> NodeResult<TransactionReceipt> {
        let ctx = self.context();
        let mut engine = self.engine.write().map_err(|_| NodeError::LockPoisoned)?;
        let mut receipt = receipt(
            TransactionKind::ContractDeployment {
                contract: request.contract.to_string(),
            },
            sender,
            ctx,
        );

        if let Err(err) = engine.prepare_deployment(request, ctx) {
            if !self.config.admission.decide_deployment(ctx.epoch, false).is_included() {
                receipt.status = TxStatus::Excluded;
                receipt.error = Some(err.to_string());
                return Ok(receipt);
            }
        }

        let outcome = engine.deploy_contract(&mut self.ledger, sender, &fee, request, ctx);
        receipt.status = status_of(self.config.admission.decide_deployment(ctx.epoch, outcome.result.is_ok()));
        receipt.fee_charged = outcome.fee_charged;
        match outcome.result {
            Ok(contract) => receipt.result = Some(contract.to_string()),
            Err(err) => receipt.error = Some(err.to_string()),
        }

        tracing::info!(
            "Deployment of {} at height {}: {:?}",
            request.contract,
            ctx.height,
            receipt.status
        );
        Ok(receipt)
    }

    /// Dispatch a public call in the current block
    pub fn call(
        &mut self,
        sender: &AccountId,
        contract: ContractId,
        function: &str,
        args: Vec<CallArg>,
        fee: Amount,
    ) -> NodeResult<TransactionReceipt> {
        let ctx = self.context();
        let engine = self.engine.read().map_err(|_| NodeError::LockPoisoned)?;
        let mut receipt = receipt(
            TransactionKind::ContractCall {
                contract: contract.to_string(),
                function: function.to_string(),
            },
            sender,
            ctx,
        );

        let call = DispatchCall {
            sender: sender.clone(),
            fee,
            contract,
            function: function.to_string(),
            args,
        };
        let outcome = engine.dispatch_call(&mut self.ledger, call, ctx);

        receipt.status = status_of(self.config.admission.decide_call(outcome.is_success()));
        receipt.fee_charged = outcome.fee_charged;
        match outcome.result {
            Ok(value) => receipt.result = Some(value.to_string()),
            Err(err) => receipt.error = Some(err.to_string()),
        }

        tracing::info!("Call {} at height {}: {:?}", function, ctx.height, receipt.status);
        Ok(receipt)
    }

    /// Last block whose contents are final; none before the first advance
    pub fn finalized_context(&self) -> Option<BlockContext> {
        self.height
            .checked_sub(1)
            .map(|height| BlockContext::from_schedule(&self.config.epochs, height))
    }

    /// Fee-less query against state committed up to the last finalized block
    pub fn read_only(&self, contract: &ContractId, function: &str, args: Vec<CallArg>) -> anyhow::Result<Value> {
        let at = self
            .finalized_context()
            .ok_or_else(|| EngineError::from(DispatchError::NoSuchContract(contract.clone())))?;
        let engine = self.engine.read().map_err(|_| NodeError::LockPoisoned)?;
        Ok(engine.read_only_call(contract, function, args, at)?)
    }

    pub fn apply(&mut self, step: &PlanStep) -> anyhow::Result<StepOutput> {
        match step {
            PlanStep::Deploy {
                sender,
                contract,
                source,
                version,
                fee,
                ..
            } => {
                let contract = parse_contract_id(contract)?;
                let source = source
                    .clone()
                    .ok_or_else(|| NodeError::MissingSource(contract.to_string()))?;
                let fee = fee.map(Amount::from_u64).unwrap_or_else(|| self.config.fees.deploy());
                let request = DeployRequest {
                    contract,
                    source,
                    language_version: *version,
                };
                Ok(StepOutput::Receipt(self.deploy(sender, &request, fee)?))
            }
            PlanStep::Call {
                sender,
                contract,
                function,
                args,
                fee,
            } => {
                let contract = parse_contract_id(contract)?;
                let args = parse_args(args)?;
                let fee = fee.map(Amount::from_u64).unwrap_or_else(|| self.config.fees.call());
                Ok(StepOutput::Receipt(self.call(sender, contract, function, args, fee)?))
            }
            PlanStep::ReadOnly {
                contract,
                function,
                args,
            } => {
                let id = parse_contract_id(contract)?;
                let result = self.read_only(&id, function, parse_args(args)?);
                let (result, error) = match result {
                    Ok(value) => (Some(value.to_string()), None),
                    Err(err) => (None, Some(err.to_string())),
                };
                Ok(StepOutput::ReadOnly {
                    contract: contract.clone(),
                    function: function.clone(),
                    height: self.finalized_context().map_or(0, |ctx| ctx.height),
                    result,
                    error,
                })
            }
            PlanStep::Advance { blocks } => {
                let ctx = self.advance(*blocks);
                Ok(StepOutput::Advanced {
                    height: ctx.height,
                    epoch: ctx.epoch,
                })
            }
        }
    }

    pub fn run(&mut self, plan: &Plan) -> anyhow::Result<Vec<StepOutput>> {
        tracing::info!("Applying plan with {} steps", plan.steps.len());
        plan.steps.iter().map(|step| self.apply(step)).collect()
    }
}

fn receipt(kind: TransactionKind, sender: &AccountId, ctx: BlockContext) -> TransactionReceipt {
    TransactionReceipt {
        kind,
        sender: sender.clone(),
        block_number: ctx.height,
        epoch: ctx.epoch,
        status: TxStatus::Failed,
        fee_charged: Amount::zero(),
        result: None,
        error: None,
    }
}

fn status_of(decision: AdmissionDecision) -> TxStatus {
    match decision {
        AdmissionDecision::Include { success: true } => TxStatus::Success,
        AdmissionDecision::Include { success: false } => TxStatus::Failed,
        AdmissionDecision::Exclude => TxStatus::Excluded,
    }
}
