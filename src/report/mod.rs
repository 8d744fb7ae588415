//! Run report output.

pub mod generator;

pub use generator::write_report;
