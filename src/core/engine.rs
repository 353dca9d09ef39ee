use std::collections::HashSet;

use super::error::ValidationError;
use super::limits::{BALANCE_EPSILON, OVERPAYMENT_CADENCE_MONTHS};
use super::types::{
    AmortizationRow, AnnualRow, ComparedPlan, ComparisonSet, Kpis, LoanInputs,
    OverpaymentSavings, RatePoint, ScenarioGrid, ScenarioResult, SweepAxis,
    validate_overpayment_levels,
};

/// Fixed-rate annuity payment. Falls back to straight-line repayment at 0%.
pub fn monthly_payment(principal: f64, annual_rate_percent: f64, term_years: u32) -> f64 {
    let months = f64::from(term_years) * 12.0;
    if principal <= 0.0 || months <= 0.0 {
        return 0.0;
    }
    let r = annual_rate_percent / 100.0 / 12.0;
    if r == 0.0 {
        return principal / months;
    }
    let growth = (1.0 + r).powf(months);
    principal * (r * growth) / (growth - 1.0)
}

/// Month-by-month repayment plan for one set of inputs.
///
/// Holds no rows itself; every call to [`Schedule::iter`] starts a fresh pass
/// from month 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    inputs: LoanInputs,
    monthly_payment: f64,
    annual_overpayment: f64,
}

pub fn compute_schedule(inputs: &LoanInputs) -> Schedule {
    Schedule {
        inputs: *inputs,
        monthly_payment: monthly_payment(
            inputs.loan_amount(),
            inputs.annual_rate_percent(),
            inputs.term_years(),
        ),
        annual_overpayment: inputs.annual_overpayment(),
    }
}

impl Schedule {
    pub fn inputs(&self) -> &LoanInputs {
        &self.inputs
    }

    pub fn monthly_payment(&self) -> f64 {
        self.monthly_payment
    }

    /// Same loan repaid with no overpayments.
    pub fn baseline(&self) -> Schedule {
        Schedule {
            annual_overpayment: 0.0,
            ..*self
        }
    }

    pub fn iter(&self) -> ScheduleIter {
        ScheduleIter {
            monthly_rate: self.inputs.monthly_rate(),
            payment: self.monthly_payment,
            annual_overpayment: self.annual_overpayment,
            max_months: self.inputs.scheduled_months(),
            month: 0,
            balance: self.inputs.loan_amount(),
        }
    }

    pub fn rows(&self) -> Vec<AmortizationRow> {
        self.iter().collect()
    }
}

impl IntoIterator for &Schedule {
    type Item = AmortizationRow;
    type IntoIter = ScheduleIter;

    fn into_iter(self) -> ScheduleIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleIter {
    monthly_rate: f64,
    payment: f64,
    annual_overpayment: f64,
    max_months: u32,
    month: u32,
    balance: f64,
}

impl Iterator for ScheduleIter {
    type Item = AmortizationRow;

    fn next(&mut self) -> Option<AmortizationRow> {
        if self.balance <= BALANCE_EPSILON || self.month >= self.max_months {
            return None;
        }
        self.month += 1;

        let opening_balance = self.balance;
        let interest = opening_balance * self.monthly_rate;
        let mut principal = (self.payment - interest).max(0.0).min(opening_balance);
        // The last scheduled month absorbs floating-point residue.
        if self.month == self.max_months || opening_balance - principal <= BALANCE_EPSILON {
            principal = opening_balance;
        }
        let mut closing_balance = opening_balance - principal;

        let mut overpayment = 0.0;
        if self.annual_overpayment > 0.0
            && self.month % OVERPAYMENT_CADENCE_MONTHS == 0
            && closing_balance > 0.0
        {
            overpayment = self.annual_overpayment.min(closing_balance);
            closing_balance -= overpayment;
            if closing_balance <= BALANCE_EPSILON {
                overpayment += closing_balance;
                closing_balance = 0.0;
            }
        }

        self.balance = closing_balance;
        Some(AmortizationRow {
            month: self.month,
            opening_balance,
            interest,
            principal,
            overpayment,
            closing_balance,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.balance <= BALANCE_EPSILON {
            return (0, Some(0));
        }
        let remaining = self.max_months.saturating_sub(self.month) as usize;
        (remaining.min(1), Some(remaining))
    }
}

pub fn summarize(schedule: &Schedule) -> Kpis {
    summarize_rows(schedule.inputs(), schedule.monthly_payment(), schedule.iter())
}

fn summarize_rows<I>(inputs: &LoanInputs, monthly_payment: f64, rows: I) -> Kpis
where
    I: IntoIterator<Item = AmortizationRow>,
{
    let mut payoff_months = 0u32;
    let mut total_interest = 0.0;
    let mut total_principal = 0.0;
    let mut total_overpayment = 0.0;
    for row in rows {
        if row.opening_balance > 0.0 {
            payoff_months += 1;
        }
        total_interest += row.interest;
        total_principal += row.principal;
        total_overpayment += row.overpayment;
    }

    let payoff_years = f64::from(payoff_months) / 12.0;
    let total_paid_to_lender = total_interest + total_principal + total_overpayment;
    Kpis {
        monthly_payment,
        payoff_months,
        payoff_years,
        loan_amount: inputs.loan_amount(),
        ltv: inputs.ltv(),
        total_interest,
        total_principal,
        total_overpayment,
        total_paid_to_lender,
        all_in_cost: total_paid_to_lender + inputs.annual_costs() * payoff_years,
    }
}

/// Full schedule plus headline figures for one set of inputs.
pub fn analyze(inputs: &LoanInputs) -> ScenarioResult {
    let schedule = compute_schedule(inputs);
    let rows = schedule.rows();
    let kpis = summarize_rows(inputs, schedule.monthly_payment(), rows.iter().copied());
    ScenarioResult {
        inputs: *inputs,
        kpis,
        rows,
    }
}

/// Per-year totals. The closing balance is the balance after the year's last month.
pub fn annual_view(rows: &[AmortizationRow]) -> Vec<AnnualRow> {
    let mut years: Vec<AnnualRow> = Vec::new();
    for row in rows {
        let year = row.year();
        match years.last_mut() {
            Some(current) if current.year == year => {
                current.payment += row.payment();
                current.interest += row.interest;
                current.principal += row.principal;
                current.overpayment += row.overpayment;
                current.closing_balance = row.closing_balance;
            }
            _ => years.push(AnnualRow {
                year,
                payment: row.payment(),
                interest: row.interest,
                principal: row.principal,
                overpayment: row.overpayment,
                closing_balance: row.closing_balance,
            }),
        }
    }
    years
}

/// Time and interest saved by the overpayments against the same loan without them.
pub fn overpayment_savings(inputs: &LoanInputs) -> OverpaymentSavings {
    let schedule = compute_schedule(inputs);
    let with = summarize(&schedule);
    let without = summarize(&schedule.baseline());
    let months_saved = without.payoff_months.saturating_sub(with.payoff_months);
    OverpaymentSavings {
        months_saved,
        years_saved: f64::from(months_saved) / 12.0,
        interest_saved: without.total_interest - with.total_interest,
    }
}

/// Headline figures for each rate, in the order given.
pub fn rate_sensitivity(
    inputs: &LoanInputs,
    rates: &[f64],
) -> Result<Vec<RatePoint>, ValidationError> {
    if rates.is_empty() {
        return Err(ValidationError::EmptySweep { field: "rates" });
    }
    rates
        .iter()
        .map(|&rate| {
            let scenario = inputs.with_rate(rate)?;
            Ok(RatePoint {
                rate,
                kpis: summarize(&compute_schedule(&scenario)),
            })
        })
        .collect()
}

/// Every combination of an overpayment level with a rate or term value.
pub fn overpayment_grid(
    inputs: &LoanInputs,
    axis: &SweepAxis,
    overpayments: &[f64],
) -> Result<ScenarioGrid, ValidationError> {
    if axis.is_empty() {
        return Err(ValidationError::EmptySweep { field: axis.name() });
    }
    validate_overpayment_levels(overpayments)?;

    let mut cells = Vec::with_capacity(overpayments.len());
    for &overpayment in overpayments {
        let base = inputs.with_overpayment(overpayment)?;
        let row = match axis {
            SweepAxis::Rate(rates) => rates
                .iter()
                .map(|&rate| base.with_rate(rate))
                .collect::<Result<Vec<_>, _>>()?,
            SweepAxis::Term(terms) => terms
                .iter()
                .map(|&term| base.with_term(term))
                .collect::<Result<Vec<_>, _>>()?,
        };
        cells.push(
            row.iter()
                .map(|scenario| summarize(&compute_schedule(scenario)))
                .collect(),
        );
    }

    Ok(ScenarioGrid {
        axis: axis.name(),
        axis_values: axis.values_f64(),
        overpayments: overpayments.to_vec(),
        cells,
    })
}

/// Runs each labelled plan independently. Labels must be unique.
pub fn compare(plans: &[(String, LoanInputs)]) -> Result<ComparisonSet, ValidationError> {
    let mut seen = HashSet::new();
    for (label, _) in plans {
        if !seen.insert(label.as_str()) {
            return Err(ValidationError::DuplicateLabel {
                label: label.clone(),
            });
        }
    }

    Ok(ComparisonSet {
        plans: plans
            .iter()
            .map(|(label, inputs)| ComparedPlan {
                label: label.clone(),
                result: analyze(inputs),
            })
            .collect(),
    })
}
