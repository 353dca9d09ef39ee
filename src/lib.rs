//! Mortgage payoff planner.
//!
//! `core` validates loan inputs and runs the amortization and scenario
//! calculations as pure functions. `export` renders results as CSV, and
//! `api` serves the web app and drives the command-line report.

pub mod api;
pub mod core;
pub mod export;
