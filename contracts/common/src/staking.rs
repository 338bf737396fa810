//! Reward-Emitting Staking Pool
//!
//! Stakers deposit a liquidity token and earn a reward token at a fixed rate
//! per block, shared pro rata. Emission is bounded by the reward the pool has
//! been funded with, so everything it ever pays out is already on its ledger
//! account.
//!
//! ## Accounting
//!
//! reward_per_token += emitted * SCALE / total_staked
//! earned(account) = stake * (reward_per_token - paid(account)) / SCALE + owed(account)

use crate::constants::precision::SCALE_FACTOR;
use crate::errors::{YieldmillError, YieldmillResult};
use crate::ledger::TokenLedger;
use crate::source::YieldSource;
use crate::types::{Address, YieldSourceKind};
use crate::BTreeMap;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Per-account staking position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct StakerInfo {
    /// Staked amount
    pub balance: u64,
    /// Reward-per-token checkpoint at the last update
    pub reward_per_token_paid: u128,
    /// Reward earned but not yet claimed
    pub rewards: u64,
}

/// Staking pool state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct StakingPool {
    pub address: Address,
    pub staking_token: Address,
    pub reward_token: Address,
    /// Reward emitted per block while anything is staked
    pub reward_rate: u64,
    /// Pay accrued reward alongside every withdrawal
    pub auto_claim_on_withdraw: bool,
    /// Funded reward not yet emitted
    pub reward_remaining: u64,
    pub total_staked: u64,
    pub reward_per_token_stored: u128,
    pub last_update_block: u64,
    stakers: BTreeMap<Address, StakerInfo>,
}

impl StakingPool {
    pub fn new(
        address: Address,
        staking_token: Address,
        reward_token: Address,
        reward_rate: u64,
        block_height: u64,
    ) -> Self {
        Self {
            address,
            staking_token,
            reward_token,
            reward_rate,
            auto_claim_on_withdraw: false,
            reward_remaining: 0,
            total_staked: 0,
            reward_per_token_stored: 0,
            last_update_block: block_height,
            stakers: BTreeMap::new(),
        }
    }

    pub fn staker(&self, account: &Address) -> StakerInfo {
        self.stakers.get(account).copied().unwrap_or_default()
    }

    /// Add `amount` of reward from `funder` to the emission budget
    pub fn fund(
        &mut self,
        ledger: &mut TokenLedger,
        funder: &Address,
        amount: u64,
        block_height: u64,
    ) -> YieldmillResult<()> {
        self.update_pool(block_height)?;
        ledger.transfer(&self.reward_token, funder, &self.address, amount)?;
        self.reward_remaining = self
            .reward_remaining
            .checked_add(amount)
            .ok_or(YieldmillError::Overflow)?;
        Ok(())
    }

    /// Reward-per-token and remaining budget as of `block_height`
    fn accrued(&self, block_height: u64) -> YieldmillResult<(u128, u64)> {
        if block_height <= self.last_update_block || self.total_staked == 0 {
            return Ok((self.reward_per_token_stored, self.reward_remaining));
        }
        let blocks = block_height - self.last_update_block;
        let emitted = (self.reward_rate as u128)
            .saturating_mul(blocks as u128)
            .min(self.reward_remaining as u128);
        let increment = emitted
            .checked_mul(SCALE_FACTOR)
            .ok_or(YieldmillError::Overflow)?
            / self.total_staked as u128;
        let reward_per_token = self
            .reward_per_token_stored
            .checked_add(increment)
            .ok_or(YieldmillError::Overflow)?;
        Ok((reward_per_token, self.reward_remaining - emitted as u64))
    }

    fn update_pool(&mut self, block_height: u64) -> YieldmillResult<()> {
        let (reward_per_token, remaining) = self.accrued(block_height)?;
        self.reward_per_token_stored = reward_per_token;
        self.reward_remaining = remaining;
        self.last_update_block = self.last_update_block.max(block_height);
        Ok(())
    }

    fn earned(info: &StakerInfo, reward_per_token: u128) -> YieldmillResult<u64> {
        let delta = reward_per_token.saturating_sub(info.reward_per_token_paid);
        let fresh = (info.balance as u128)
            .checked_mul(delta)
            .ok_or(YieldmillError::Overflow)?
            / SCALE_FACTOR;
        let fresh = u64::try_from(fresh).map_err(|_| YieldmillError::Overflow)?;
        info.rewards.checked_add(fresh).ok_or(YieldmillError::Overflow)
    }

    /// Checkpoint `account` and return its updated position
    fn update_account(&mut self, account: &Address, block_height: u64) -> YieldmillResult<StakerInfo> {
        self.update_pool(block_height)?;
        let mut info = self.staker(account);
        info.rewards = Self::earned(&info, self.reward_per_token_stored)?;
        info.reward_per_token_paid = self.reward_per_token_stored;
        Ok(info)
    }

    fn store(&mut self, account: &Address, info: StakerInfo) {
        if info == StakerInfo::default() {
            self.stakers.remove(account);
        } else {
            self.stakers.insert(*account, info);
        }
    }

    fn pay_rewards(
        &mut self,
        ledger: &mut TokenLedger,
        account: &Address,
        info: &mut StakerInfo,
    ) -> YieldmillResult<u64> {
        let amount = info.rewards;
        if amount > 0 {
            ledger.transfer(&self.reward_token, &self.address, account, amount)?;
            info.rewards = 0;
        }
        Ok(amount)
    }
}

impl YieldSource for StakingPool {
    fn address(&self) -> Address {
        self.address
    }

    fn kind(&self) -> YieldSourceKind {
        YieldSourceKind::StakingPool
    }

    fn staking_token(&self) -> Address {
        self.staking_token
    }

    fn reward_token(&self) -> Option<Address> {
        Some(self.reward_token)
    }

    fn receipt_token(&self) -> Option<Address> {
        None
    }

    fn deposit(
        &mut self,
        ledger: &mut TokenLedger,
        account: &Address,
        amount: u64,
        block_height: u64,
    ) -> YieldmillResult<()> {
        if amount == 0 {
            return Err(YieldmillError::ZeroAmount);
        }
        let mut info = self.update_account(account, block_height)?;
        ledger.transfer_from(&self.staking_token, &self.address, account, &self.address, amount)?;

        info.balance = info.balance.checked_add(amount).ok_or(YieldmillError::Overflow)?;
        self.total_staked = self
            .total_staked
            .checked_add(amount)
            .ok_or(YieldmillError::Overflow)?;
        self.store(account, info);
        Ok(())
    }

    fn withdraw(
        &mut self,
        ledger: &mut TokenLedger,
        account: &Address,
        amount: u64,
        block_height: u64,
    ) -> YieldmillResult<u64> {
        let mut info = self.update_account(account, block_height)?;
        if info.balance < amount {
            return Err(YieldmillError::InsufficientBalance {
                available: info.balance,
                requested: amount,
            });
        }

        info.balance -= amount;
        self.total_staked -= amount;
        ledger.transfer(&self.staking_token, &self.address, account, amount)?;
        if self.auto_claim_on_withdraw {
            self.pay_rewards(ledger, account, &mut info)?;
        }
        self.store(account, info);
        Ok(amount)
    }

    fn balance_of(&self, _ledger: &TokenLedger, account: &Address) -> YieldmillResult<u64> {
        Ok(self.staker(account).balance)
    }

    fn pending_reward(&self, account: &Address, block_height: u64) -> YieldmillResult<u64> {
        let (reward_per_token, _) = self.accrued(block_height)?;
        Self::earned(&self.staker(account), reward_per_token)
    }

    fn claim(
        &mut self,
        ledger: &mut TokenLedger,
        account: &Address,
        block_height: u64,
    ) -> YieldmillResult<u64> {
        let mut info = self.update_account(account, block_height)?;
        let paid = self.pay_rewards(ledger, account, &mut info)?;
        self.store(account, info);
        Ok(paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL: Address = [10u8; 32];
    const LP: Address = [11u8; 32];
    const REWARD: Address = [12u8; 32];
    const FUNDER: Address = [13u8; 32];
    const ALICE: Address = [1u8; 32];
    const BOB: Address = [2u8; 32];

    fn setup() -> (StakingPool, TokenLedger) {
        let mut ledger = TokenLedger::new();
        ledger.register(LP, "LP").unwrap();
        ledger.register(REWARD, "MUST").unwrap();
        ledger.mint(&LP, &ALICE, 1_000).unwrap();
        ledger.mint(&LP, &BOB, 1_000).unwrap();
        ledger.mint(&REWARD, &FUNDER, 1_000_000).unwrap();
        ledger.approve(&LP, &ALICE, &POOL, u64::MAX);
        ledger.approve(&LP, &BOB, &POOL, u64::MAX);

        let mut pool = StakingPool::new(POOL, LP, REWARD, 100, 0);
        pool.fund(&mut ledger, &FUNDER, 1_000_000, 0).unwrap();
        (pool, ledger)
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let (mut pool, mut ledger) = setup();
        pool.deposit(&mut ledger, &ALICE, 400, 1).unwrap();
        assert_eq!(pool.balance_of(&ledger, &ALICE).unwrap(), 400);
        assert_eq!(ledger.balance_of(&LP, &POOL), 400);

        assert!(matches!(
            pool.withdraw(&mut ledger, &ALICE, 401, 2),
            Err(YieldmillError::InsufficientBalance { available: 400, requested: 401 })
        ));
        pool.withdraw(&mut ledger, &ALICE, 400, 2).unwrap();
        assert_eq!(ledger.balance_of(&LP, &ALICE), 1_000);
        assert_eq!(pool.total_staked, 0);
    }

    #[test]
    fn test_rewards_accrue_pro_rata() {
        let (mut pool, mut ledger) = setup();
        pool.deposit(&mut ledger, &ALICE, 300, 0).unwrap();
        pool.deposit(&mut ledger, &BOB, 100, 0).unwrap();

        // 10 blocks * 100 per block shared 3:1
        assert_eq!(pool.pending_reward(&ALICE, 10).unwrap(), 750);
        assert_eq!(pool.pending_reward(&BOB, 10).unwrap(), 250);

        let paid = pool.claim(&mut ledger, &ALICE, 10).unwrap();
        assert_eq!(paid, 750);
        assert_eq!(ledger.balance_of(&REWARD, &ALICE), 750);
        assert_eq!(pool.pending_reward(&ALICE, 10).unwrap(), 0);
    }

    #[test]
    fn test_no_emission_without_stake() {
        let (mut pool, mut ledger) = setup();
        pool.deposit(&mut ledger, &ALICE, 100, 50).unwrap();
        assert_eq!(pool.pending_reward(&ALICE, 50).unwrap(), 0);
        assert_eq!(pool.pending_reward(&ALICE, 51).unwrap(), 100);
    }

    #[test]
    fn test_emission_capped_by_funding() {
        let (mut pool, mut ledger) = setup();
        pool.deposit(&mut ledger, &ALICE, 100, 0).unwrap();

        // 20_000 blocks would emit 2_000_000 but only 1_000_000 was funded
        let paid = pool.claim(&mut ledger, &ALICE, 20_000).unwrap();
        assert_eq!(paid, 1_000_000);
        assert_eq!(pool.reward_remaining, 0);
        assert_eq!(pool.pending_reward(&ALICE, 30_000).unwrap(), 0);
    }

    #[test]
    fn test_pending_reward_reports_overflow() {
        let (mut pool, mut ledger) = setup();
        pool.deposit(&mut ledger, &ALICE, 400, 0).unwrap();
        pool.reward_per_token_stored = u128::MAX / 2;

        assert!(matches!(pool.pending_reward(&ALICE, 0), Err(YieldmillError::Overflow)));
        assert!(matches!(pool.claim(&mut ledger, &ALICE, 0), Err(YieldmillError::Overflow)));
    }

    #[test]
    fn test_auto_claim_on_withdraw() {
        let (mut pool, mut ledger) = setup();
        pool.auto_claim_on_withdraw = true;
        pool.deposit(&mut ledger, &ALICE, 100, 0).unwrap();

        pool.withdraw(&mut ledger, &ALICE, 50, 5).unwrap();
        assert_eq!(ledger.balance_of(&REWARD, &ALICE), 500);
        assert_eq!(pool.pending_reward(&ALICE, 5).unwrap(), 0);
    }
}
