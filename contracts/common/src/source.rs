//! Yield Source Interface
//!
//! The boundary between an optimizer and wherever its liquidity token earns.
//! Amounts are always in units of the staked (want) token; a vault converts
//! to and from its shares internally.

use crate::errors::YieldmillResult;
use crate::ledger::TokenLedger;
use crate::types::{Address, YieldSourceKind};

/// A staking pool or vault an account can deposit liquidity into
pub trait YieldSource {
    /// Address of the pool or vault
    fn address(&self) -> Address;

    fn kind(&self) -> YieldSourceKind;

    /// Token accepted by `deposit`
    fn staking_token(&self) -> Address;

    /// Token paid out by `claim`, if any
    fn reward_token(&self) -> Option<Address>;

    /// Token held by depositors as a receipt, if any
    fn receipt_token(&self) -> Option<Address>;

    /// Pull `amount` of the staking token from `account` (which must have
    /// approved the source) and credit it to `account`
    fn deposit(
        &mut self,
        ledger: &mut TokenLedger,
        account: &Address,
        amount: u64,
        block_height: u64,
    ) -> YieldmillResult<()>;

    /// Return up to `amount` of `account`'s stake to `account`
    ///
    /// Returns the staking-token amount actually transferred.
    fn withdraw(
        &mut self,
        ledger: &mut TokenLedger,
        account: &Address,
        amount: u64,
        block_height: u64,
    ) -> YieldmillResult<u64>;

    /// Staked balance attributed to `account`
    fn balance_of(&self, ledger: &TokenLedger, account: &Address) -> YieldmillResult<u64>;

    /// Reward `account` could claim at `block_height`
    fn pending_reward(&self, account: &Address, block_height: u64) -> YieldmillResult<u64>;

    /// Transfer all accrued reward to `account`; returns the amount paid
    fn claim(
        &mut self,
        ledger: &mut TokenLedger,
        account: &Address,
        block_height: u64,
    ) -> YieldmillResult<u64>;
}
