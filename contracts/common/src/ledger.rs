//! Token Ledger
//!
//! Fungible-token bookkeeping for every asset in the environment: underlying
//! assets, reward tokens, pair liquidity tokens and vault shares. Balances
//! and allowances are keyed by token address.
//!
//! ## Key Features
//!
//! - **Supply Tracking**: `mint`/`burn` keep `total_supply` exact
//! - **Allowances**: `transfer_from` consumes allowance unless it is unlimited
//! - **Conservation**: transfers never create or destroy units

use crate::errors::{YieldmillError, YieldmillResult};
use crate::types::Address;
use crate::validation::require_sufficient_balance;
use crate::{BTreeMap, String};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Allowance value that is never consumed
pub const UNLIMITED_ALLOWANCE: u64 = u64::MAX;

/// Token metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TokenInfo {
    /// Display symbol
    pub symbol: String,
    /// Units in existence
    pub total_supply: u64,
}

/// Balances and allowances for every registered token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TokenLedger {
    tokens: BTreeMap<Address, TokenInfo>,
    /// (token, account) -> balance
    balances: BTreeMap<(Address, Address), u64>,
    /// (token, owner, spender) -> allowance
    allowances: BTreeMap<(Address, Address, Address), u64>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new token
    pub fn register(&mut self, token: Address, symbol: &str) -> YieldmillResult<()> {
        if self.tokens.contains_key(&token) {
            return Err(YieldmillError::InvalidParameter {
                param: "token",
                reason: "token already registered",
            });
        }
        self.tokens.insert(
            token,
            TokenInfo {
                symbol: String::from(symbol),
                total_supply: 0,
            },
        );
        Ok(())
    }

    pub fn is_token(&self, token: &Address) -> bool {
        self.tokens.contains_key(token)
    }

    pub fn token_info(&self, token: &Address) -> YieldmillResult<&TokenInfo> {
        self.tokens
            .get(token)
            .ok_or(YieldmillError::UnknownToken { token: *token })
    }

    pub fn symbol(&self, token: &Address) -> Option<&str> {
        self.tokens.get(token).map(|info| info.symbol.as_str())
    }

    pub fn total_supply(&self, token: &Address) -> u64 {
        self.tokens.get(token).map_or(0, |info| info.total_supply)
    }

    pub fn balance_of(&self, token: &Address, account: &Address) -> u64 {
        self.balances.get(&(*token, *account)).copied().unwrap_or(0)
    }

    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(&(*token, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    // ============ Supply ============

    /// Create `amount` new units for `to`
    pub fn mint(&mut self, token: &Address, to: &Address, amount: u64) -> YieldmillResult<()> {
        let info = self
            .tokens
            .get_mut(token)
            .ok_or(YieldmillError::UnknownToken { token: *token })?;
        info.total_supply = info
            .total_supply
            .checked_add(amount)
            .ok_or(YieldmillError::Overflow)?;
        let balance = self.balance_of(token, to);
        self.set_balance(token, to, balance.checked_add(amount).ok_or(YieldmillError::Overflow)?);
        Ok(())
    }

    /// Destroy `amount` units held by `from`
    pub fn burn(&mut self, token: &Address, from: &Address, amount: u64) -> YieldmillResult<()> {
        let balance = self.balance_of(token, from);
        if balance < amount {
            return Err(YieldmillError::InsufficientBalance {
                available: balance,
                requested: amount,
            });
        }
        let info = self
            .tokens
            .get_mut(token)
            .ok_or(YieldmillError::UnknownToken { token: *token })?;
        info.total_supply = info
            .total_supply
            .checked_sub(amount)
            .ok_or(YieldmillError::Underflow)?;
        self.set_balance(token, from, balance - amount);
        Ok(())
    }

    // ============ Transfers ============

    /// Move `amount` from `from` to `to`
    pub fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> YieldmillResult<()> {
        if !self.is_token(token) {
            return Err(YieldmillError::UnknownToken { token: *token });
        }
        let from_balance = self.balance_of(token, from);
        require_sufficient_balance(from_balance, amount)?;
        if amount == 0 || from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(token, to)
            .checked_add(amount)
            .ok_or(YieldmillError::Overflow)?;
        self.set_balance(token, from, from_balance - amount);
        self.set_balance(token, to, to_balance);
        Ok(())
    }

    /// Let `spender` move up to `amount` of `owner`'s balance
    pub fn approve(&mut self, token: &Address, owner: &Address, spender: &Address, amount: u64) {
        if amount == 0 {
            self.allowances.remove(&(*token, *owner, *spender));
        } else {
            self.allowances.insert((*token, *owner, *spender), amount);
        }
    }

    /// Move `amount` from `from` to `to` on behalf of `spender`
    pub fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> YieldmillResult<()> {
        let allowance = self.allowance(token, from, spender);
        if spender != from && allowance < amount {
            return Err(YieldmillError::InsufficientAllowance {
                available: allowance,
                requested: amount,
            });
        }
        self.transfer(token, from, to, amount)?;
        if spender != from && allowance != UNLIMITED_ALLOWANCE {
            self.approve(token, from, spender, allowance - amount);
        }
        Ok(())
    }

    fn set_balance(&mut self, token: &Address, account: &Address, balance: u64) {
        if balance == 0 {
            self.balances.remove(&(*token, *account));
        } else {
            self.balances.insert((*token, *account), balance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: Address = [1u8; 32];
    const ALICE: Address = [2u8; 32];
    const BOB: Address = [3u8; 32];

    fn test_ledger() -> TokenLedger {
        let mut ledger = TokenLedger::new();
        ledger.register(TOKEN, "WMATIC").unwrap();
        ledger.mint(&TOKEN, &ALICE, 1_000).unwrap();
        ledger
    }

    #[test]
    fn test_register_twice_fails() {
        let mut ledger = test_ledger();
        assert!(ledger.register(TOKEN, "WMATIC").is_err());
        assert_eq!(ledger.symbol(&TOKEN), Some("WMATIC"));
    }

    #[test]
    fn test_mint_and_burn_track_supply() {
        let mut ledger = test_ledger();
        assert_eq!(ledger.total_supply(&TOKEN), 1_000);

        ledger.burn(&TOKEN, &ALICE, 400).unwrap();
        assert_eq!(ledger.total_supply(&TOKEN), 600);
        assert_eq!(ledger.balance_of(&TOKEN, &ALICE), 600);

        assert!(matches!(
            ledger.burn(&TOKEN, &ALICE, 601),
            Err(YieldmillError::InsufficientBalance { .. })
        ));
        assert!(ledger.mint(&[9u8; 32], &ALICE, 1).is_err());
    }

    #[test]
    fn test_transfer() {
        let mut ledger = test_ledger();
        ledger.transfer(&TOKEN, &ALICE, &BOB, 250).unwrap();

        assert_eq!(ledger.balance_of(&TOKEN, &ALICE), 750);
        assert_eq!(ledger.balance_of(&TOKEN, &BOB), 250);
        assert!(ledger.transfer(&TOKEN, &BOB, &ALICE, 251).is_err());
        assert_eq!(ledger.total_supply(&TOKEN), 1_000);
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let mut ledger = test_ledger();
        assert!(matches!(
            ledger.transfer_from(&TOKEN, &BOB, &ALICE, &BOB, 1),
            Err(YieldmillError::InsufficientAllowance { available: 0, requested: 1 })
        ));

        ledger.approve(&TOKEN, &ALICE, &BOB, 300);
        ledger.transfer_from(&TOKEN, &BOB, &ALICE, &BOB, 200).unwrap();
        assert_eq!(ledger.allowance(&TOKEN, &ALICE, &BOB), 100);
        assert_eq!(ledger.balance_of(&TOKEN, &BOB), 200);
    }

    #[test]
    fn test_unlimited_allowance() {
        let mut ledger = test_ledger();
        ledger.approve(&TOKEN, &ALICE, &BOB, UNLIMITED_ALLOWANCE);
        ledger.transfer_from(&TOKEN, &BOB, &ALICE, &BOB, 500).unwrap();
        assert_eq!(ledger.allowance(&TOKEN, &ALICE, &BOB), UNLIMITED_ALLOWANCE);
    }
}
