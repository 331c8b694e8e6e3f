// trait-node/src/config.rs
use chain_core::{AccountId, AdmissionPolicy, Amount, EpochSchedule};
use serde::{Deserialize, Serialize};
use trait_engine::EngineConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub fees: FeeConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub admission: AdmissionPolicy,
    /// Height at which each epoch activates
    #[serde(default)]
    pub epochs: EpochSchedule,
    /// Balances credited before the first block
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub deploy_fee: u64,
    pub call_fee: u64,
}

impl FeeConfig {
    pub fn deploy(&self) -> Amount {
        Amount::from_u64(self.deploy_fee)
    }

    pub fn call(&self) -> Amount {
        Amount::from_u64(self.call_fee)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub account: AccountId,
    pub balance: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            fees: FeeConfig {
                deploy_fee: 1_000,
                call_fee: 100,
            },
            engine: EngineConfig::default(),
            admission: AdmissionPolicy::default(),
            epochs: EpochSchedule::default(),
            accounts: vec![GenesisAccount {
                account: AccountId::new("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM"),
                balance: 1_000_000,
            }],
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
