//! Access Control Module
//!
//! Ownership checks and per-instance reentrancy guards.
//!
//! Every optimizer, zap registry and treasury has exactly one account allowed
//! to drive it. Optimizers additionally hold a `ReentrancyGuard`: a mutating
//! entry point acquires it before touching any external contract and
//! releases it on the way out, so a callback into the same instance is
//! rejected with `Reentrancy` instead of observing half-applied state.

use crate::errors::{YieldmillError, YieldmillResult};
use crate::types::Address;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

// ============================================================================
// Ownership
// ============================================================================

/// Single-owner authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Ownership {
    owner: Address,
}

impl Ownership {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Fail with `Unauthorized` unless `caller` is the owner
    pub fn ensure(&self, caller: Address) -> YieldmillResult<()> {
        require_owner(self.owner, caller)
    }
}

/// Require the signer to be the owner.
pub fn require_owner(owner: Address, signer: Address) -> YieldmillResult<()> {
    if owner != signer {
        return Err(YieldmillError::Unauthorized {
            expected: owner,
            actual: signer,
        });
    }
    Ok(())
}

// ============================================================================
// Reentrancy Guard
// ============================================================================

/// Non-reentrant execution flag for one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self { entered: false }
    }

    /// Mark `instance` as executing
    ///
    /// # Errors
    /// `Reentrancy` if a call on the same instance has not finished yet.
    pub fn enter(&mut self, instance: Address) -> YieldmillResult<()> {
        if self.entered {
            return Err(YieldmillError::Reentrancy { instance });
        }
        self.entered = true;
        Ok(())
    }

    /// Clear the executing flag
    pub fn exit(&mut self) {
        self.entered = false;
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_owner() {
        let owner = [1u8; 32];
        assert!(require_owner(owner, owner).is_ok());
        assert!(matches!(
            require_owner(owner, [2u8; 32]),
            Err(YieldmillError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_reentrancy_guard() {
        let instance = [9u8; 32];
        let mut guard = ReentrancyGuard::new();

        guard.enter(instance).unwrap();
        assert!(guard.is_entered());
        assert!(matches!(
            guard.enter(instance),
            Err(YieldmillError::Reentrancy { .. })
        ));

        guard.exit();
        assert!(guard.enter(instance).is_ok());
    }
}
