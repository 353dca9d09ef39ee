//! Input bounds shared by validation, the HTTP API and the CLI.

/// Largest property price accepted.
pub const MAX_PRICE: f64 = 50_000_000.0;

/// Annual interest rate ceiling, in percent.
pub const MAX_RATE_PERCENT: f64 = 30.0;

/// Smallest amount borrowed; anything less has no schedule to show.
pub const MIN_LOAN_AMOUNT: f64 = 1.0;

pub const MIN_TERM_YEARS: u32 = 1;
pub const MAX_TERM_YEARS: u32 = 50;

/// Upper bound on the number of points a rate range may expand to.
pub const MAX_SCENARIO_STEPS: f64 = 300.0;

/// Overpayments land on every month that is a multiple of this.
pub const OVERPAYMENT_CADENCE_MONTHS: u32 = 12;

/// Balances at or below this are treated as repaid.
pub const BALANCE_EPSILON: f64 = 1e-8;
