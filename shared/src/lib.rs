//! Shared types and domain logic for the Kios Stock Ledger
//!
//! This crate holds everything that does not touch the database: the ledger
//! aggregation, the snapshot resync planning, role scoping, the movement
//! validator and the sales ranking. The backend executes the resulting
//! plans against PostgreSQL.

pub mod error;
pub mod ledger;
pub mod models;
pub mod ranking;
pub mod snapshot;
pub mod types;
pub mod validation;

pub use error::*;
pub use ledger::*;
pub use models::*;
pub use ranking::*;
pub use snapshot::*;
pub use types::*;
pub use validation::*;
