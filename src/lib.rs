//! Sizing of hybrid solar PV and battery facilities which also draw from the grid.
#![warn(missing_docs)]
pub mod allocation;
pub mod battery;
pub mod cli;
pub mod cost;
pub mod demand;
pub mod economics;
pub mod finance;
pub mod input;
pub mod log;
pub mod model;
pub mod output;
pub mod search;
pub mod series;
pub mod settings;
pub mod simulation;
pub mod units;

#[cfg(test)]
mod fixture;
