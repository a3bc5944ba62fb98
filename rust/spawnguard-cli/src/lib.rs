//! Spawnguard CLI library: load checked units, run the analyzer, report findings.

pub mod check;
pub mod colors;
pub mod config;
