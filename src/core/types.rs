use serde::Serialize;

use super::error::ValidationError;
use super::limits::{
    MAX_PRICE, MAX_RATE_PERCENT, MAX_SCENARIO_STEPS, MAX_TERM_YEARS, MIN_LOAN_AMOUNT,
    MIN_TERM_YEARS,
};

/// Loan parameters as submitted, before any checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawLoanInputs {
    pub price: f64,
    pub deposit: f64,
    pub annual_rate_percent: f64,
    pub term_years: u32,
    pub annual_insurance: f64,
    pub annual_fee: f64,
    pub annual_overpayment: f64,
}

impl RawLoanInputs {
    /// Every constraint violation, in validation order.
    pub fn problems(&self) -> Vec<ValidationError> {
        let mut problems = Vec::new();
        let mut all_finite = true;
        for (field, value) in self.float_fields() {
            if !value.is_finite() {
                problems.push(ValidationError::NonFinite { field });
                all_finite = false;
            }
        }

        if self.price.is_finite() && !(self.price > 0.0 && self.price <= MAX_PRICE) {
            problems.push(ValidationError::out_of_range(
                "price",
                format!("greater than 0 and at most {MAX_PRICE}"),
            ));
        }
        if self.deposit.is_finite() && self.deposit < 0.0 {
            problems.push(ValidationError::out_of_range("deposit", "at least 0"));
        }
        if self.annual_rate_percent.is_finite()
            && !(self.annual_rate_percent > 0.0 && self.annual_rate_percent <= MAX_RATE_PERCENT)
        {
            problems.push(ValidationError::out_of_range(
                "annual_rate_percent",
                format!("greater than 0 and at most {MAX_RATE_PERCENT}"),
            ));
        }
        if !(MIN_TERM_YEARS..=MAX_TERM_YEARS).contains(&self.term_years) {
            problems.push(ValidationError::out_of_range(
                "term_years",
                format!("between {MIN_TERM_YEARS} and {MAX_TERM_YEARS}"),
            ));
        }
        for (field, value) in [
            ("annual_insurance", self.annual_insurance),
            ("annual_fee", self.annual_fee),
            ("annual_overpayment", self.annual_overpayment),
        ] {
            if value.is_finite() && value < 0.0 {
                problems.push(ValidationError::out_of_range(field, "at least 0"));
            }
        }

        if all_finite && self.price > 0.0 && self.deposit >= 0.0 {
            if self.deposit >= self.price {
                problems.push(ValidationError::DepositNotBelowPrice);
            } else if self.price - self.deposit < MIN_LOAN_AMOUNT {
                problems.push(ValidationError::out_of_range(
                    "loan_amount",
                    format!("at least {MIN_LOAN_AMOUNT}"),
                ));
            }
        }

        problems
    }

    fn float_fields(&self) -> [(&'static str, f64); 6] {
        [
            ("price", self.price),
            ("deposit", self.deposit),
            ("annual_rate_percent", self.annual_rate_percent),
            ("annual_insurance", self.annual_insurance),
            ("annual_fee", self.annual_fee),
            ("annual_overpayment", self.annual_overpayment),
        ]
    }
}

/// Validated loan parameters. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanInputs {
    price: f64,
    deposit: f64,
    annual_rate_percent: f64,
    term_years: u32,
    annual_insurance: f64,
    annual_fee: f64,
    annual_overpayment: f64,
}

impl LoanInputs {
    pub fn new(raw: RawLoanInputs) -> Result<Self, ValidationError> {
        if let Some(first) = raw.problems().into_iter().next() {
            return Err(first);
        }
        Ok(Self {
            price: raw.price,
            deposit: raw.deposit,
            annual_rate_percent: raw.annual_rate_percent,
            term_years: raw.term_years,
            annual_insurance: raw.annual_insurance,
            annual_fee: raw.annual_fee,
            annual_overpayment: raw.annual_overpayment,
        })
    }

    /// Generic starter values, not tied to any real borrower.
    pub fn generic_defaults() -> Self {
        Self {
            price: 300_000.0,
            deposit: 60_000.0,
            annual_rate_percent: 5.0,
            term_years: 30,
            annual_insurance: 1_200.0,
            annual_fee: 0.0,
            annual_overpayment: 6_000.0,
        }
    }

    pub fn to_raw(&self) -> RawLoanInputs {
        RawLoanInputs {
            price: self.price,
            deposit: self.deposit,
            annual_rate_percent: self.annual_rate_percent,
            term_years: self.term_years,
            annual_insurance: self.annual_insurance,
            annual_fee: self.annual_fee,
            annual_overpayment: self.annual_overpayment,
        }
    }

    pub fn with_rate(&self, annual_rate_percent: f64) -> Result<Self, ValidationError> {
        Self::new(RawLoanInputs {
            annual_rate_percent,
            ..self.to_raw()
        })
    }

    pub fn with_term(&self, term_years: u32) -> Result<Self, ValidationError> {
        Self::new(RawLoanInputs {
            term_years,
            ..self.to_raw()
        })
    }

    pub fn with_overpayment(&self, annual_overpayment: f64) -> Result<Self, ValidationError> {
        Self::new(RawLoanInputs {
            annual_overpayment,
            ..self.to_raw()
        })
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn deposit(&self) -> f64 {
        self.deposit
    }

    pub fn annual_rate_percent(&self) -> f64 {
        self.annual_rate_percent
    }

    pub fn term_years(&self) -> u32 {
        self.term_years
    }

    pub fn annual_insurance(&self) -> f64 {
        self.annual_insurance
    }

    pub fn annual_fee(&self) -> f64 {
        self.annual_fee
    }

    pub fn annual_overpayment(&self) -> f64 {
        self.annual_overpayment
    }

    pub fn loan_amount(&self) -> f64 {
        self.price - self.deposit
    }

    /// Loan-to-value as a fraction of price.
    pub fn ltv(&self) -> f64 {
        self.loan_amount() / self.price
    }

    pub fn ltv_percent(&self) -> f64 {
        self.ltv() * 100.0
    }

    pub fn monthly_rate(&self) -> f64 {
        self.annual_rate_percent / 100.0 / 12.0
    }

    pub fn scheduled_months(&self) -> u32 {
        self.term_years * 12
    }

    /// Recurring non-mortgage housing costs per year.
    pub fn annual_costs(&self) -> f64 {
        self.annual_insurance + self.annual_fee
    }
}

/// Evenly spaced interest rates, in percent, for sensitivity tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRange {
    low: f64,
    high: f64,
    step: f64,
}

impl RateRange {
    /// Bounds given in either order are normalised so that `low <= high`.
    pub fn new(low: f64, high: f64, step: f64) -> Result<Self, ValidationError> {
        for (field, value) in [
            ("scenario_low", low),
            ("scenario_high", high),
            ("scenario_step", step),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NonFinite { field });
            }
        }
        if step <= 0.0 {
            return Err(ValidationError::out_of_range(
                "scenario_step",
                "greater than 0",
            ));
        }

        let (low, high) = (low.min(high), low.max(high));
        if low <= 0.0 {
            return Err(ValidationError::out_of_range(
                "scenario_low",
                format!("greater than 0 and at most {MAX_RATE_PERCENT}"),
            ));
        }
        if high > MAX_RATE_PERCENT {
            return Err(ValidationError::out_of_range(
                "scenario_high",
                format!("at most {MAX_RATE_PERCENT}"),
            ));
        }
        if (high - low) / step > MAX_SCENARIO_STEPS {
            return Err(ValidationError::out_of_range(
                "scenario_step",
                format!("large enough to keep the range within {MAX_SCENARIO_STEPS} steps"),
            ));
        }

        Ok(Self { low, high, step })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// `low, low + step, ...` never past `high`, rounded to four decimals.
    pub fn values(&self) -> Vec<f64> {
        let stop = self.high + RANGE_TOLERANCE;
        let mut values = Vec::new();
        let mut index = 0u32;
        loop {
            let value = self.low + self.step * f64::from(index);
            if value > stop {
                break;
            }
            values.push((value * 10_000.0).round() / 10_000.0);
            index += 1;
        }
        values
    }
}

// Absorbs float drift so that an exact multiple of `step` still lands on `high`.
const RANGE_TOLERANCE: f64 = 1e-9;

/// Rejects empty, negative or non-finite overpayment levels.
pub fn validate_overpayment_levels(levels: &[f64]) -> Result<(), ValidationError> {
    const FIELD: &str = "overpayment_levels";
    if levels.is_empty() {
        return Err(ValidationError::EmptySweep { field: FIELD });
    }
    for level in levels {
        if !level.is_finite() || *level < 0.0 {
            return Err(ValidationError::InvalidList {
                field: FIELD,
                value: level.to_string(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmortizationRow {
    pub month: u32,
    pub opening_balance: f64,
    pub interest: f64,
    pub principal: f64,
    pub overpayment: f64,
    pub closing_balance: f64,
}

impl AmortizationRow {
    /// Scheduled payment for the month, excluding any overpayment.
    pub fn payment(&self) -> f64 {
        self.interest + self.principal
    }

    /// 1-based loan year the month falls in.
    pub fn year(&self) -> u32 {
        self.month.div_ceil(12)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualRow {
    pub year: u32,
    pub payment: f64,
    pub interest: f64,
    pub principal: f64,
    pub overpayment: f64,
    pub closing_balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub monthly_payment: f64,
    pub payoff_months: u32,
    pub payoff_years: f64,
    pub loan_amount: f64,
    pub ltv: f64,
    pub total_interest: f64,
    pub total_principal: f64,
    pub total_overpayment: f64,
    pub total_paid_to_lender: f64,
    pub all_in_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverpaymentSavings {
    pub months_saved: u32,
    pub years_saved: f64,
    pub interest_saved: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub inputs: LoanInputs,
    pub kpis: Kpis,
    pub rows: Vec<AmortizationRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatePoint {
    pub rate: f64,
    pub kpis: Kpis,
}

/// The parameter swept against overpayment levels in a grid.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepAxis {
    Rate(Vec<f64>),
    Term(Vec<u32>),
}

impl SweepAxis {
    pub fn len(&self) -> usize {
        match self {
            SweepAxis::Rate(values) => values.len(),
            SweepAxis::Term(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &'static str {
        match self {
            SweepAxis::Rate(_) => "rate",
            SweepAxis::Term(_) => "term",
        }
    }

    pub(crate) fn values_f64(&self) -> Vec<f64> {
        match self {
            SweepAxis::Rate(values) => values.clone(),
            SweepAxis::Term(values) => values.iter().map(|v| f64::from(*v)).collect(),
        }
    }
}

/// Overpayment levels down the rows, axis values across the columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioGrid {
    pub axis: &'static str,
    pub axis_values: Vec<f64>,
    pub overpayments: Vec<f64>,
    pub cells: Vec<Vec<Kpis>>,
}

impl ScenarioGrid {
    pub fn cell(&self, overpayment_index: usize, axis_index: usize) -> Option<&Kpis> {
        self.cells.get(overpayment_index)?.get(axis_index)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparedPlan {
    pub label: String,
    pub result: ScenarioResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRow {
    pub metric: &'static str,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDelta {
    pub metric: &'static str,
    pub first: f64,
    pub second: f64,
    pub difference: f64,
}

const COMPARISON_METRICS: [(&str, fn(&Kpis) -> f64); 5] = [
    ("Monthly Payment", |k| k.monthly_payment),
    ("Mortgage-Free Years", |k| k.payoff_years),
    ("Total Interest", |k| k.total_interest),
    ("Total Paid to Lender", |k| k.total_paid_to_lender),
    ("All-in Cost", |k| k.all_in_cost),
];

/// Named plans in the order they were supplied.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSet {
    pub plans: Vec<ComparedPlan>,
}

impl ComparisonSet {
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&ScenarioResult> {
        self.plans
            .iter()
            .find(|plan| plan.label == label)
            .map(|plan| &plan.result)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.plans.iter().map(|plan| plan.label.as_str()).collect()
    }

    /// One row per headline metric, one value per plan.
    pub fn metric_table(&self) -> Vec<MetricRow> {
        COMPARISON_METRICS
            .iter()
            .map(|&(metric, read)| MetricRow {
                metric,
                values: self.plans.iter().map(|p| read(&p.result.kpis)).collect(),
            })
            .collect()
    }

    /// `first - second` for each headline metric.
    pub fn difference(&self, first: &str, second: &str) -> Option<Vec<MetricDelta>> {
        let a = self.get(first)?;
        let b = self.get(second)?;
        Some(
            COMPARISON_METRICS
                .iter()
                .map(|&(metric, read)| {
                    let first = read(&a.kpis);
                    let second = read(&b.kpis);
                    MetricDelta {
                        metric,
                        first,
                        second,
                        difference: first - second,
                    }
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> RawLoanInputs {
        RawLoanInputs {
            price: 300_000.0,
            deposit: 60_000.0,
            annual_rate_percent: 4.5,
            term_years: 25,
            annual_insurance: 1_200.0,
            annual_fee: 0.0,
            annual_overpayment: 0.0,
        }
    }

    #[test]
    fn valid_inputs_expose_derived_values() {
        let inputs = LoanInputs::new(sample_raw()).expect("valid inputs");
        assert_eq!(inputs.loan_amount(), 240_000.0);
        assert!((inputs.ltv() - 0.8).abs() < 1e-12);
        assert!((inputs.ltv_percent() - 80.0).abs() < 1e-9);
        assert_eq!(inputs.scheduled_months(), 300);
        assert!((inputs.monthly_rate() - 0.00375).abs() < 1e-15);
    }

    #[test]
    fn rejects_non_finite_values_in_any_field() {
        let cases: [(&str, fn(&mut RawLoanInputs, f64)); 6] = [
            ("price", |r, v| r.price = v),
            ("deposit", |r, v| r.deposit = v),
            ("annual_rate_percent", |r, v| r.annual_rate_percent = v),
            ("annual_insurance", |r, v| r.annual_insurance = v),
            ("annual_fee", |r, v| r.annual_fee = v),
            ("annual_overpayment", |r, v| r.annual_overpayment = v),
        ];
        for (field, set) in cases {
            for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
                let mut raw = sample_raw();
                set(&mut raw, bad);
                let err = LoanInputs::new(raw).expect_err("must reject non-finite");
                assert_eq!(err, ValidationError::NonFinite { field });
            }
        }
    }

    #[test]
    fn rejects_deposit_at_or_above_price() {
        let mut raw = sample_raw();
        raw.deposit = raw.price;
        assert_eq!(
            LoanInputs::new(raw),
            Err(ValidationError::DepositNotBelowPrice)
        );

        raw.deposit = raw.price + 1.0;
        let err = LoanInputs::new(raw).expect_err("deposit above price");
        assert_eq!(err.field(), "deposit");
        assert_eq!(err.to_string(), "deposit must be less than price");
    }

    #[test]
    fn rejects_loans_too_small_to_schedule() {
        let mut raw = sample_raw();
        raw.price = 1e-9;
        raw.deposit = 0.0;
        let err = LoanInputs::new(raw).expect_err("loan below minimum");
        assert_eq!(err.field(), "loan_amount");
        assert_eq!(err.to_string(), "loan_amount must be at least 1");

        raw.price = 100.0;
        raw.deposit = 99.5;
        assert!(LoanInputs::new(raw).is_err());

        raw.deposit = 99.0;
        assert!(LoanInputs::new(raw).is_ok());
    }

    #[test]
    fn rejects_rate_outside_bounds() {
        for rate in [0.0, -1.0, 30.01, 45.0] {
            let mut raw = sample_raw();
            raw.annual_rate_percent = rate;
            let err = LoanInputs::new(raw).expect_err("rate out of range");
            assert_eq!(err.field(), "annual_rate_percent");
            assert!(err.to_string().contains("at most 30"));
        }

        let mut raw = sample_raw();
        raw.annual_rate_percent = MAX_RATE_PERCENT;
        assert!(LoanInputs::new(raw).is_ok());
    }

    #[test]
    fn rejects_term_outside_bounds() {
        for term in [0, 51] {
            let mut raw = sample_raw();
            raw.term_years = term;
            let err = LoanInputs::new(raw).expect_err("term out of range");
            assert_eq!(err.field(), "term_years");
        }
    }

    #[test]
    fn rejects_negative_costs() {
        let mut raw = sample_raw();
        raw.annual_fee = -1.0;
        let err = LoanInputs::new(raw).expect_err("negative fee");
        assert_eq!(err.field(), "annual_fee");
    }

    #[test]
    fn finiteness_is_reported_before_cross_field_checks() {
        let mut raw = sample_raw();
        raw.deposit = 400_000.0;
        raw.annual_rate_percent = f64::NAN;
        let problems = raw.problems();
        assert_eq!(
            problems.first(),
            Some(&ValidationError::NonFinite {
                field: "annual_rate_percent"
            })
        );
        assert!(!problems.contains(&ValidationError::DepositNotBelowPrice));
    }

    #[test]
    fn problems_lists_every_violation_in_order() {
        let mut raw = sample_raw();
        raw.price = -5.0;
        raw.term_years = 0;
        raw.annual_overpayment = -10.0;
        let fields: Vec<String> = raw
            .problems()
            .iter()
            .map(|e| e.field().to_string())
            .collect();
        assert_eq!(fields, ["price", "term_years", "annual_overpayment"]);
    }

    #[test]
    fn generic_defaults_pass_validation() {
        let defaults = LoanInputs::generic_defaults();
        assert_eq!(LoanInputs::new(defaults.to_raw()), Ok(defaults));
        assert_eq!(defaults.loan_amount(), 240_000.0);
    }

    #[test]
    fn with_rate_revalidates() {
        let inputs = LoanInputs::new(sample_raw()).expect("valid inputs");
        assert!(inputs.with_rate(35.0).is_err());
        let changed = inputs.with_rate(3.0).expect("valid rate");
        assert_eq!(changed.annual_rate_percent(), 3.0);
        assert_eq!(changed.price(), inputs.price());
    }

    #[test]
    fn rate_range_normalises_reversed_bounds() {
        let range = RateRange::new(7.0, 3.0, 0.5).expect("valid range");
        assert_eq!(range.low(), 3.0);
        assert_eq!(range.high(), 7.0);
    }

    #[test]
    fn rate_range_values_include_both_ends() {
        let range = RateRange::new(3.0, 4.0, 0.5).expect("valid range");
        assert_eq!(range.values(), vec![3.0, 3.5, 4.0]);

        let fine = RateRange::new(3.0, 3.3, 0.1).expect("valid range");
        assert_eq!(fine.values(), vec![3.0, 3.1, 3.2, 3.3]);
    }

    #[test]
    fn rate_range_values_never_pass_high_or_the_ceiling() {
        let uneven = RateRange::new(3.0, 7.0, 2.5).expect("valid range");
        assert_eq!(uneven.values(), vec![3.0, 5.5]);

        let near_ceiling = RateRange::new(29.0, 30.0, 0.6).expect("valid range");
        let values = near_ceiling.values();
        assert_eq!(values, vec![29.0, 29.6]);
        let inputs = LoanInputs::new(sample_raw()).expect("valid inputs");
        assert!(values.iter().all(|&rate| inputs.with_rate(rate).is_ok()));

        let to_ceiling = RateRange::new(29.0, 30.0, 0.25).expect("valid range");
        assert_eq!(to_ceiling.values().last(), Some(&30.0));
    }

    #[test]
    fn rate_range_rejects_bad_steps_and_ceilings() {
        assert_eq!(
            RateRange::new(3.0, 4.0, 0.0).map_err(|e| e.field().to_string()),
            Err("scenario_step".to_string())
        );
        assert!(RateRange::new(3.0, 31.0, 0.5).is_err());
        assert!(RateRange::new(0.0, 5.0, 0.5).is_err());
        assert!(RateRange::new(0.01, 30.0, 0.05).is_err());
        assert!(RateRange::new(3.0, f64::NAN, 0.5).is_err());
    }

    #[test]
    fn overpayment_levels_must_be_non_empty_and_non_negative() {
        assert!(validate_overpayment_levels(&[0.0, 3_000.0]).is_ok());
        assert_eq!(
            validate_overpayment_levels(&[]),
            Err(ValidationError::EmptySweep {
                field: "overpayment_levels"
            })
        );
        assert!(validate_overpayment_levels(&[-1.0]).is_err());
        assert!(validate_overpayment_levels(&[f64::NAN]).is_err());
    }

    #[test]
    fn amortization_row_year_rolls_over_every_twelve_months() {
        let row = |month| AmortizationRow {
            month,
            opening_balance: 1.0,
            interest: 0.25,
            principal: 0.5,
            overpayment: 0.0,
            closing_balance: 0.5,
        };
        assert_eq!(row(1).year(), 1);
        assert_eq!(row(12).year(), 1);
        assert_eq!(row(13).year(), 2);
        assert_eq!(row(1).payment(), 0.75);
    }
}
