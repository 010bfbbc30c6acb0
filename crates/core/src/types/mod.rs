//! Core types for Stockroom.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod actor;
pub mod id;
pub mod money;
pub mod status;

pub use actor::{Actor, ActorError};
pub use id::*;
pub use money::{CURRENCY_DECIMAL_PLACES, ExchangeRate, round_currency};
pub use status::*;
