//! Auto-Compounding Vault
//!
//! Holds a want token and issues shares against it. Yield reaches the vault
//! as want donated to its account, which raises the price per share; the
//! vault has no reward token, so claims always pay nothing.

use crate::constants::precision::SCALE_FACTOR;
use crate::errors::{YieldmillError, YieldmillResult};
use crate::ledger::TokenLedger;
use crate::math::checked_mul_div;
use crate::source::YieldSource;
use crate::types::{Address, YieldSourceKind};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Vault state; balances live in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct YieldVault {
    pub address: Address,
    /// Token deposited and returned
    pub want: Address,
    /// Share token minted to depositors
    pub share_token: Address,
}

impl YieldVault {
    pub fn new(address: Address, want: Address, share_token: Address) -> Self {
        Self {
            address,
            want,
            share_token,
        }
    }

    /// Want held by the vault
    pub fn balance(&self, ledger: &TokenLedger) -> u64 {
        ledger.balance_of(&self.want, &self.address)
    }

    pub fn total_shares(&self, ledger: &TokenLedger) -> u64 {
        ledger.total_supply(&self.share_token)
    }

    /// Want per share, scaled by 1e18
    pub fn price_per_share(&self, ledger: &TokenLedger) -> YieldmillResult<u128> {
        let shares = self.total_shares(ledger);
        if shares == 0 {
            return Ok(SCALE_FACTOR);
        }
        checked_mul_div(self.balance(ledger) as u128, SCALE_FACTOR, shares as u128)
    }

    /// Want redeemable for `shares`
    pub fn shares_to_want(&self, ledger: &TokenLedger, shares: u64) -> YieldmillResult<u64> {
        let total = self.total_shares(ledger);
        if total == 0 {
            return Ok(0);
        }
        let want = checked_mul_div(shares as u128, self.balance(ledger) as u128, total as u128)?;
        u64::try_from(want).map_err(|_| YieldmillError::Overflow)
    }

    /// Shares needed to redeem at least `want`, capped at `available`
    fn want_to_shares(&self, ledger: &TokenLedger, want: u64, available: u64) -> YieldmillResult<u64> {
        let total = self.total_shares(ledger) as u128;
        let balance = self.balance(ledger) as u128;
        if balance == 0 {
            return Ok(0);
        }
        let product = (want as u128)
            .checked_mul(total)
            .ok_or(YieldmillError::Overflow)?;
        let shares = product.div_ceil(balance);
        Ok(shares.min(available as u128) as u64)
    }

    /// Redeem `shares` of `account` for want
    pub fn withdraw_shares(
        &mut self,
        ledger: &mut TokenLedger,
        account: &Address,
        shares: u64,
    ) -> YieldmillResult<u64> {
        let held = ledger.balance_of(&self.share_token, account);
        if held < shares {
            return Err(YieldmillError::InsufficientBalance {
                available: held,
                requested: shares,
            });
        }
        let want = self.shares_to_want(ledger, shares)?;
        ledger.burn(&self.share_token, account, shares)?;
        ledger.transfer(&self.want, &self.address, account, want)?;
        Ok(want)
    }
}

impl YieldSource for YieldVault {
    fn address(&self) -> Address {
        self.address
    }

    fn kind(&self) -> YieldSourceKind {
        YieldSourceKind::Vault
    }

    fn staking_token(&self) -> Address {
        self.want
    }

    fn reward_token(&self) -> Option<Address> {
        None
    }

    fn receipt_token(&self) -> Option<Address> {
        Some(self.share_token)
    }

    fn deposit(
        &mut self,
        ledger: &mut TokenLedger,
        account: &Address,
        amount: u64,
        _block_height: u64,
    ) -> YieldmillResult<()> {
        if amount == 0 {
            return Err(YieldmillError::ZeroAmount);
        }
        let pool = self.balance(ledger);
        let total = self.total_shares(ledger);
        ledger.transfer_from(&self.want, &self.address, account, &self.address, amount)?;

        let shares = if total == 0 || pool == 0 {
            amount
        } else {
            let shares = checked_mul_div(amount as u128, total as u128, pool as u128)?;
            u64::try_from(shares).map_err(|_| YieldmillError::Overflow)?
        };
        if shares == 0 {
            return Err(YieldmillError::ZeroAmount);
        }
        ledger.mint(&self.share_token, account, shares)
    }

    fn withdraw(
        &mut self,
        ledger: &mut TokenLedger,
        account: &Address,
        amount: u64,
        _block_height: u64,
    ) -> YieldmillResult<u64> {
        let staked = self.balance_of(ledger, account)?;
        if staked < amount {
            return Err(YieldmillError::InsufficientBalance {
                available: staked,
                requested: amount,
            });
        }
        let held = ledger.balance_of(&self.share_token, account);
        let shares = if amount == staked {
            held
        } else {
            self.want_to_shares(ledger, amount, held)?
        };
        self.withdraw_shares(ledger, account, shares)
    }

    fn balance_of(&self, ledger: &TokenLedger, account: &Address) -> YieldmillResult<u64> {
        let shares = ledger.balance_of(&self.share_token, account);
        self.shares_to_want(ledger, shares)
    }

    fn pending_reward(&self, _account: &Address, _block_height: u64) -> YieldmillResult<u64> {
        Ok(0)
    }

    fn claim(
        &mut self,
        _ledger: &mut TokenLedger,
        _account: &Address,
        _block_height: u64,
    ) -> YieldmillResult<u64> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VAULT: Address = [20u8; 32];
    const WANT: Address = [21u8; 32];
    const SHARE: Address = [22u8; 32];
    const ALICE: Address = [1u8; 32];
    const BOB: Address = [2u8; 32];

    fn setup() -> (YieldVault, TokenLedger) {
        let mut ledger = TokenLedger::new();
        ledger.register(WANT, "LP").unwrap();
        ledger.register(SHARE, "mooLP").unwrap();
        ledger.mint(&WANT, &ALICE, 10_000).unwrap();
        ledger.mint(&WANT, &BOB, 10_000).unwrap();
        ledger.approve(&WANT, &ALICE, &VAULT, u64::MAX);
        ledger.approve(&WANT, &BOB, &VAULT, u64::MAX);
        (YieldVault::new(VAULT, WANT, SHARE), ledger)
    }

    #[test]
    fn test_first_deposit_mints_one_to_one() {
        let (mut vault, mut ledger) = setup();
        vault.deposit(&mut ledger, &ALICE, 1_000, 0).unwrap();

        assert_eq!(ledger.balance_of(&SHARE, &ALICE), 1_000);
        assert_eq!(vault.balance(&ledger), 1_000);
        assert_eq!(vault.price_per_share(&ledger).unwrap(), SCALE_FACTOR);
    }

    #[test]
    fn test_donation_raises_price_per_share() {
        let (mut vault, mut ledger) = setup();
        vault.deposit(&mut ledger, &ALICE, 1_000, 0).unwrap();
        ledger.transfer(&WANT, &BOB, &VAULT, 500).unwrap();

        assert_eq!(vault.price_per_share(&ledger).unwrap(), SCALE_FACTOR * 3 / 2);
        assert_eq!(vault.balance_of(&ledger, &ALICE).unwrap(), 1_500);

        // Later depositors get fewer shares
        vault.deposit(&mut ledger, &BOB, 1_500, 0).unwrap();
        assert_eq!(ledger.balance_of(&SHARE, &BOB), 1_000);
    }

    #[test]
    fn test_withdraw_full_and_partial() {
        let (mut vault, mut ledger) = setup();
        vault.deposit(&mut ledger, &ALICE, 1_000, 0).unwrap();
        ledger.transfer(&WANT, &BOB, &VAULT, 1_000).unwrap();

        let received = vault.withdraw(&mut ledger, &ALICE, 500, 0).unwrap();
        assert_eq!(received, 500);
        assert_eq!(vault.balance_of(&ledger, &ALICE).unwrap(), 1_500);

        let staked = vault.balance_of(&ledger, &ALICE).unwrap();
        let received = vault.withdraw(&mut ledger, &ALICE, staked, 0).unwrap();
        assert_eq!(received, 1_500);
        assert_eq!(ledger.balance_of(&SHARE, &ALICE), 0);
        assert!(vault.withdraw(&mut ledger, &ALICE, 1, 0).is_err());
    }

    #[test]
    fn test_vault_pays_no_reward() {
        let (mut vault, mut ledger) = setup();
        vault.deposit(&mut ledger, &ALICE, 1_000, 0).unwrap();
        assert_eq!(vault.pending_reward(&ALICE, 100).unwrap(), 0);
        assert_eq!(vault.claim(&mut ledger, &ALICE, 100).unwrap(), 0);
    }
}
