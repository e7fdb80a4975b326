//! Compiles energy network snapshots into linear capacity-expansion problems and solves them.
#![warn(missing_docs)]
pub mod config;
pub mod constraints;
pub mod expression;
pub mod id;
pub mod index;
pub mod log;
pub mod model;
pub mod network;
pub mod objective;
pub mod parameters;
pub mod results;
pub mod solver;
pub mod variables;

#[cfg(test)]
mod fixture;
