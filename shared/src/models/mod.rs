//! Domain models for the Kios Stock Ledger

mod availability;
mod catalog;
mod user;

pub use availability::*;
pub use catalog::*;
pub use user::*;
