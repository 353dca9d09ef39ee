//! CSV downloads. Values are rounded here and nowhere earlier.

use std::io::Write;

use thiserror::Error;

use crate::core::{AnnualRow, ScenarioResult};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub const SCHEDULE_COLUMNS: [&str; 6] = [
    "month",
    "opening_balance",
    "interest",
    "principal",
    "overpayment",
    "closing_balance",
];

pub const ANNUAL_COLUMNS: [&str; 6] = [
    "year",
    "payment",
    "interest",
    "principal",
    "overpayment",
    "closing_balance",
];

fn money(value: f64) -> String {
    format!("{value:.2}")
}

/// `name,value` pairs describing the inputs and headline figures.
pub fn summary_fields(result: &ScenarioResult) -> Vec<(&'static str, String)> {
    let inputs = &result.inputs;
    let kpis = &result.kpis;
    vec![
        ("price", money(inputs.price())),
        ("deposit", money(inputs.deposit())),
        ("loan_amount", money(kpis.loan_amount)),
        ("annual_rate_percent", format!("{:.4}", inputs.annual_rate_percent())),
        ("term_years", inputs.term_years().to_string()),
        ("annual_insurance", money(inputs.annual_insurance())),
        ("annual_fee", money(inputs.annual_fee())),
        ("annual_overpayment", money(inputs.annual_overpayment())),
        ("ltv_percent", format!("{:.2}", kpis.ltv * 100.0)),
        ("monthly_payment", money(kpis.monthly_payment)),
        ("payoff_months", kpis.payoff_months.to_string()),
        ("payoff_years", format!("{:.2}", kpis.payoff_years)),
        ("total_interest", money(kpis.total_interest)),
        ("total_principal", money(kpis.total_principal)),
        ("total_overpayment", money(kpis.total_overpayment)),
        ("total_paid_to_lender", money(kpis.total_paid_to_lender)),
        ("all_in_cost", money(kpis.all_in_cost)),
    ]
}

/// Summary fields, a blank line, then one row per month.
pub fn write_schedule_csv<W: Write>(mut out: W, result: &ScenarioResult) -> Result<(), ExportError> {
    {
        let mut wtr = csv::Writer::from_writer(&mut out);
        for (field, value) in summary_fields(result) {
            wtr.write_record([field, value.as_str()])?;
        }
        wtr.flush()?;
    }
    out.write_all(b"\n")?;

    let mut wtr = csv::Writer::from_writer(&mut out);
    wtr.write_record(SCHEDULE_COLUMNS)?;
    for row in &result.rows {
        wtr.write_record([
            row.month.to_string(),
            money(row.opening_balance),
            money(row.interest),
            money(row.principal),
            money(row.overpayment),
            money(row.closing_balance),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_annual_csv<W: Write>(out: W, years: &[AnnualRow]) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(ANNUAL_COLUMNS)?;
    for year in years {
        wtr.write_record([
            year.year.to_string(),
            money(year.payment),
            money(year.interest),
            money(year.principal),
            money(year.overpayment),
            money(year.closing_balance),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn schedule_csv_string(result: &ScenarioResult) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_schedule_csv(&mut buf, result)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn annual_csv_string(years: &[AnnualRow]) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_annual_csv(&mut buf, years)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LoanInputs, RawLoanInputs, analyze, annual_view};

    fn small_loan(term_years: u32, annual_overpayment: f64) -> ScenarioResult {
        let inputs = LoanInputs::new(RawLoanInputs {
            price: 2_000.0,
            deposit: 800.0,
            annual_rate_percent: 12.0,
            term_years,
            annual_insurance: 100.0,
            annual_fee: 0.0,
            annual_overpayment,
        })
        .expect("valid inputs");
        analyze(&inputs)
    }

    #[test]
    fn schedule_csv_has_summary_blank_line_and_rows() {
        let result = small_loan(1, 0.0);
        let csv = schedule_csv_string(&result).expect("csv renders");
        let lines: Vec<&str> = csv.lines().collect();

        let summary_len = summary_fields(&result).len();
        assert_eq!(lines.len(), summary_len + 1 + 1 + 12);
        assert_eq!(lines[0], "price,2000.00");
        assert_eq!(lines[1], "deposit,800.00");
        assert_eq!(lines[2], "loan_amount,1200.00");
        assert_eq!(lines[3], "annual_rate_percent,12.0000");
        assert!(lines.contains(&"ltv_percent,60.00"));
        assert!(lines.contains(&"payoff_months,12"));
        assert!(lines.contains(&"monthly_payment,106.62"));

        assert_eq!(lines[summary_len], "");
        assert_eq!(
            lines[summary_len + 1],
            "month,opening_balance,interest,principal,overpayment,closing_balance"
        );
        assert_eq!(lines[summary_len + 2], "1,1200.00,12.00,94.62,0.00,1105.38");
        assert!(lines[lines.len() - 1].starts_with("12,"));
        assert!(lines[lines.len() - 1].ends_with(",0.00"));
    }

    #[test]
    fn schedule_csv_shows_overpayment_in_twelfth_month() {
        let result = small_loan(2, 50.0);
        let csv = schedule_csv_string(&result).expect("csv renders");
        let rows: Vec<Vec<&str>> = csv
            .lines()
            .skip_while(|line| !line.starts_with("month,"))
            .skip(1)
            .map(|line| line.split(',').collect())
            .collect();
        assert_eq!(rows[11][0], "12");
        assert_eq!(rows[11][4], "50.00");
        assert_eq!(rows[10][4], "0.00");
        assert_eq!(rows.last().expect("rows")[5], "0.00");
    }

    #[test]
    fn annual_csv_lists_each_year() {
        let result = small_loan(1, 0.0);
        let csv = annual_csv_string(&annual_view(&result.rows)).expect("csv renders");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "year,payment,interest,principal,overpayment,closing_balance");
        assert!(lines[1].starts_with("1,"));
        assert!(lines[1].ends_with(",0.00,0.00"));
    }
}
