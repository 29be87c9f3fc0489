//! Bankrate Common Types
//!
//! This crate contains shared types used across the bankrate engine,
//! including the normalized rate record, currency codes, bank descriptors,
//! date helpers and query preferences.

pub mod currency;
pub mod descriptor;
pub mod error;
pub mod preferences;
pub mod rate;
pub mod time;

pub use currency::*;
pub use descriptor::*;
pub use error::*;
pub use preferences::*;
pub use rate::*;
pub use time::*;
