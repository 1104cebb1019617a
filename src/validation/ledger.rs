//! Account balance ledger
//!
//! Balances are never stored; they are replayed from genesis whenever a
//! chain is validated or a balance is queried.

use std::collections::HashMap;
use thiserror::Error;

use super::Transaction;

/// Ledger errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance in {address}: have {have}, need {need}")]
    InsufficientBalance { address: String, have: u64, need: u64 },
    #[error("Balance overflow in {0}")]
    Overflow(String),
}

/// Derived mapping of address to balance
#[derive(Debug, Default, Clone)]
pub struct BalanceLedger {
    balances: HashMap<String, u64>,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current balance of an address (zero if never seen)
    pub fn balance(&self, address: &str) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Apply a single transaction.
    ///
    /// Block rewards only credit. Any other transaction must be covered by
    /// the input's balance; a failed debit leaves the ledger untouched.
    pub fn apply(&mut self, tx: &Transaction) -> Result<(), LedgerError> {
        if !tx.is_block_reward() {
            let have = self.balance(&tx.input);
            if tx.amount > have {
                return Err(LedgerError::InsufficientBalance {
                    address: tx.input.clone(),
                    have,
                    need: tx.amount,
                });
            }
            self.balances.insert(tx.input.clone(), have - tx.amount);
        }

        self.credit(&tx.output, tx.amount)
    }

    /// Add `amount` to an address
    pub fn credit(&mut self, address: &str, amount: u64) -> Result<(), LedgerError> {
        let credited = self
            .balance(address)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(address.to_string()))?;
        self.balances.insert(address.to_string(), credited);
        Ok(())
    }

    /// Apply transactions in order, stopping at the first failure
    pub fn apply_all<'a, I>(&mut self, txs: I) -> Result<(), LedgerError>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        for tx in txs {
            self.apply(tx)?;
        }
        Ok(())
    }
}
