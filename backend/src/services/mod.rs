//! Business logic services for the Kios Stock Ledger

pub mod availability;
pub mod catalog;
pub mod ledger;
pub mod pair_lock;
pub mod stock_in;
pub mod stock_out;
