//! HTTP request handlers

pub mod availability;
pub mod health;
pub mod stock_in;
pub mod stock_out;

pub use availability::*;
pub use health::*;
pub use stock_in::*;
pub use stock_out::*;
