//! picks-core: Scoring engine and shared types for the playoff picks service
//!
//! Everything in this crate is pure: no I/O, no clocks beyond wager creation
//! timestamps. The service crate feeds it events and wagers and persists what
//! comes back.

pub mod errors;
pub mod leaderboard;
pub mod margin;
pub mod outcome;
pub mod rules;
pub mod season;
pub mod types;
pub mod validation;

pub use errors::*;
pub use leaderboard::*;
pub use margin::*;
pub use outcome::*;
pub use rules::*;
pub use season::*;
pub use types::*;
pub use validation::*;
