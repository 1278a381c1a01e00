//! Repository implementations for database operations

pub mod backtests;
pub mod games;
pub mod odds;

pub use backtests::*;
pub use games::*;
pub use odds::*;
