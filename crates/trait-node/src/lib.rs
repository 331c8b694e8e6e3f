// trait-node/src/lib.rs
pub mod config;
pub mod plan;
pub mod runtime;

pub use config::{FeeConfig, GenesisAccount, NodeConfig};
pub use plan::{Plan, PlanStep};
pub use runtime::{Node, StepOutput};

pub type NodeResult<T> = Result<T, NodeError>;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Invalid contract principal `{0}`")]
    InvalidContract(String),

    #[error("Invalid call argument `{0}`")]
    InvalidArgument(String),

    #[error("Deployment of {0} has no source")]
    MissingSource(String),

    #[error("Engine lock poisoned")]
    LockPoisoned,
}
