// chain-core/src/types.rs

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Block number/height
pub type BlockNumber = u64;

/// Fee amount in micro-units; unbounded so fee sums never wrap
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(BigUint);

impl Amount {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(BigUint::from(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// `None` when `other` exceeds `self`
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        (self.0 >= other.0).then(|| Amount(&self.0 - &other.0))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, other: Amount) -> Amount {
        Amount(self.0 + other.0)
    }
}

impl Sub for Amount {
    type Output = Amount;

    /// Panics on underflow; use [`Amount::checked_sub`] for untrusted values
    fn sub(self, other: Amount) -> Amount {
        Amount(self.0 - other.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account principal paying fees (e.g. `ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(principal: impl Into<String>) -> Self {
        Self(principal.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(principal: &str) -> Self {
        Self::new(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_sums() {
        let deploy = Amount::from_u64(1_000);
        let call = Amount::from_u64(100);

        let total = deploy.clone() + call.clone();
        assert_eq!(total.to_string(), "1100");
        assert_eq!(total.checked_sub(&call), Some(deploy));
    }

    #[test]
    fn test_fee_exceeding_balance() {
        let balance = Amount::from_u64(50);
        assert!(balance.checked_sub(&Amount::from_u64(51)).is_none());
        assert!(balance.checked_sub(&balance).unwrap().is_zero());
    }

    #[test]
    fn test_account_id_display() {
        let id = AccountId::from("ST000SENDER");
        assert_eq!(id.to_string(), "ST000SENDER");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ST000SENDER\"");
    }
}
