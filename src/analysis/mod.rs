//! Analysis modules.
//!
//! Voting over prediction sets and evaluation of the voted result.

pub mod aggregator;
pub mod evaluation;

pub use aggregator::*;
pub use evaluation::*;
