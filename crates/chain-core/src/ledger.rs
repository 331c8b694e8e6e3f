// chain-core/src/ledger.rs

use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Returned by [`FeeLedger::debit`] when an account cannot cover a fee
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("insufficient funds in {account}: balance {balance}, required {required}")]
pub struct InsufficientFunds {
    pub account: AccountId,
    pub balance: Amount,
    pub required: Amount,
}

/// Fee debit boundary consumed by the contract engine.
///
/// A successful debit is final: nothing downstream of it may refund.
pub trait FeeLedger {
    /// Debit `amount` from `account`
    fn debit(&mut self, account: &AccountId, amount: &Amount) -> Result<(), InsufficientFunds>;

    /// Current balance of `account`
    fn balance(&self, account: &AccountId) -> Amount;
}

/// Fee-paying account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Number of successful debits made from this account
    pub nonce: u64,
    pub balance: Amount,
}

/// In-memory ledger of account balances
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryLedger {
    accounts: HashMap<AccountId, Account>,
    /// Total fees collected since genesis
    fees_collected: Amount,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account (genesis allocation, faucets in tests)
    pub fn credit(&mut self, account: &AccountId, amount: &Amount) {
        let entry = self.accounts.entry(account.clone()).or_default();
        entry.balance = entry.balance.clone() + amount.clone();
    }

    /// Get account (empty account if unknown)
    pub fn account(&self, account: &AccountId) -> Account {
        self.accounts.get(account).cloned().unwrap_or_default()
    }

    pub fn fees_collected(&self) -> &Amount {
        &self.fees_collected
    }
}

impl FeeLedger for InMemoryLedger {
    fn debit(&mut self, account: &AccountId, amount: &Amount) -> Result<(), InsufficientFunds> {
        let insufficient = |balance: Amount| InsufficientFunds {
            account: account.clone(),
            balance,
            required: amount.clone(),
        };

        if !amount.is_zero() && !self.accounts.contains_key(account) {
            return Err(insufficient(Amount::zero()));
        }
        let entry = self.accounts.entry(account.clone()).or_default();
        entry.balance = entry
            .balance
            .checked_sub(amount)
            .ok_or_else(|| insufficient(entry.balance.clone()))?;
        entry.nonce += 1;
        self.fees_collected = self.fees_collected.clone() + amount.clone();

        tracing::trace!("debited fee {} from {}", amount, account);
        Ok(())
    }

    fn balance(&self, account: &AccountId) -> Amount {
        self.accounts
            .get(account)
            .map(|acc| acc.balance.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_debit_reduces_balance() {
        let mut ledger = InMemoryLedger::new();
        let alice = AccountId::from("ST1ALICE");
        ledger.credit(&alice, &Amount::from_u64(1000));

        ledger.debit(&alice, &Amount::from_u64(300)).unwrap();

        assert_eq!(ledger.balance(&alice), Amount::from_u64(700));
        assert_eq!(ledger.account(&alice).nonce, 1);
        assert_eq!(ledger.fees_collected(), &Amount::from_u64(300));
    }

    #[test]
    fn test_insufficient_funds_leaves_balance() {
        let mut ledger = InMemoryLedger::new();
        let bob = AccountId::from("ST1BOB");
        ledger.credit(&bob, &Amount::from_u64(10));

        let err = ledger.debit(&bob, &Amount::from_u64(11)).unwrap_err();

        assert_eq!(err.balance, Amount::from_u64(10));
        assert_eq!(err.required, Amount::from_u64(11));
        assert_eq!(ledger.balance(&bob), Amount::from_u64(10));
        assert_eq!(ledger.account(&bob).nonce, 0);
    }

    #[test]
    fn test_unknown_account_has_zero_balance() {
        let mut ledger = InMemoryLedger::new();
        let nobody = AccountId::from("ST1NOBODY");
        assert!(ledger.balance(&nobody).is_zero());

        let err = ledger.debit(&nobody, &Amount::from_u64(1)).unwrap_err();
        assert!(err.balance.is_zero());
        assert_eq!(ledger.account(&nobody), Account::default());
    }

    proptest! {
        #[test]
        fn prop_debit_is_exact(initial in 0u64..1_000_000, fee in 0u64..1_000_000) {
            let mut ledger = InMemoryLedger::new();
            let acct = AccountId::from("ST1PROP");
            ledger.credit(&acct, &Amount::from_u64(initial));

            let result = ledger.debit(&acct, &Amount::from_u64(fee));

            if fee <= initial {
                prop_assert!(result.is_ok());
                prop_assert_eq!(ledger.balance(&acct), Amount::from_u64(initial - fee));
            } else {
                prop_assert!(result.is_err());
                prop_assert_eq!(ledger.balance(&acct), Amount::from_u64(initial));
            }
        }
    }
}
