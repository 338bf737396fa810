//! Yieldmill Common Library
//!
//! Shared types, constants and math for every Yieldmill contract crate, plus
//! the in-process reference environment (token ledger, staking pools, vaults
//! and constant-product routers) the contracts run against.
//!
//! ## Layout
//!
//! - **Engine support**: `errors`, `types`, `constants`, `math`, `events`,
//!   `access_control`, `validation`, `transaction`
//! - **Reference environment**: `ledger`, `source`, `staking`, `vault`, `amm`,
//!   `world`
//!
//! Every external collaborator is reached through `World`. The staking pool
//! and the vault both implement `YieldSource`, which is the only surface an
//! optimizer sees of where its liquidity earns.
//!
//! This crate is `no_std` compatible when built without the default `std`
//! feature.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Re-export collections for submodules based on feature
#[cfg(not(feature = "std"))]
pub use alloc::{collections::BTreeMap, string::String, vec::Vec};
#[cfg(feature = "std")]
pub use std::{collections::BTreeMap, string::String, vec::Vec};

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod events;
pub mod access_control;
pub mod validation;
pub mod transaction;
pub mod ledger;
pub mod source;
pub mod staking;
pub mod vault;
pub mod amm;
pub mod world;

// Re-exports for convenience
pub use errors::*;
pub use types::*;
pub use math::*;
pub use events::*;
pub use access_control::*;
pub use validation::*;
pub use transaction::*;
pub use ledger::*;
pub use source::*;
pub use staking::*;
pub use vault::*;
pub use amm::*;
pub use world::*;
