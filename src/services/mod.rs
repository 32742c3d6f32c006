//! Business logic services.

pub mod actor;
pub mod aggregate;
pub mod balance;
pub mod deposits;
pub mod ledger;
pub mod withdrawals;
