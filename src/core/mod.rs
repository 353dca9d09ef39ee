mod engine;
mod error;
pub mod limits;
mod types;

pub use engine::{
    Schedule, ScheduleIter, analyze, annual_view, compare, compute_schedule, monthly_payment,
    overpayment_grid, overpayment_savings, rate_sensitivity, summarize,
};
pub use error::ValidationError;
pub use types::{
    AmortizationRow, AnnualRow, ComparedPlan, ComparisonSet, Kpis, LoanInputs, MetricDelta,
    MetricRow, OverpaymentSavings, RatePoint, RateRange, RawLoanInputs, ScenarioGrid,
    ScenarioResult, SweepAxis, validate_overpayment_levels,
};
