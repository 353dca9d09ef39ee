use serde::Serialize;
use tabled::{Table, builder::Builder};
use thiserror::Error;

use super::{
    Cli, OutputFormat, PLAN_A, PLAN_B, PlanRequest, build_compare_response, build_request,
    build_scenarios_response,
};
use crate::core::{
    Kpis, LoanInputs, OverpaymentSavings, ValidationError, analyze, overpayment_savings,
};
use crate::export::{ExportError, schedule_csv_string};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Input validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CliReport {
    inputs: LoanInputs,
    kpis: Kpis,
    savings: OverpaymentSavings,
    scenarios: super::ScenariosResponse,
    comparison: super::CompareResponse,
}

/// Runs one analysis from command-line flags and renders it in the requested format.
pub fn run_cli(cli: &Cli) -> Result<String, CliError> {
    let request = build_request(cli)?;
    log::debug!("cli run: format={:?}", cli.format());
    match cli.format() {
        OutputFormat::Csv => Ok(schedule_csv_string(&analyze(&request.inputs))?),
        OutputFormat::Json => {
            let report = build_report(&request)?;
            Ok(format!("{}\n", serde_json::to_string_pretty(&report)?))
        }
        OutputFormat::Summary => Ok(render_summary(&build_report(&request)?)),
    }
}

fn build_report(request: &PlanRequest) -> Result<CliReport, ValidationError> {
    let result = analyze(&request.inputs);
    Ok(CliReport {
        inputs: request.inputs,
        kpis: result.kpis,
        savings: overpayment_savings(&request.inputs),
        scenarios: build_scenarios_response(request)?,
        comparison: build_compare_response(request)?,
    })
}

fn render_summary(report: &CliReport) -> String {
    let kpis = &report.kpis;
    let savings = &report.savings;

    let mut headline = Builder::default();
    headline.push_record(["Metric", "Value"]);
    headline.push_record([
        "Loan amount".to_string(),
        format!("{} (LTV {:.1}%)", money(kpis.loan_amount), kpis.ltv * 100.0),
    ]);
    headline.push_record(["Monthly payment".to_string(), money(kpis.monthly_payment)]);
    headline.push_record([
        "Mortgage-free in".to_string(),
        format!(
            "{:.1} years ({} months), {:.2} years faster",
            kpis.payoff_years, kpis.payoff_months, savings.years_saved
        ),
    ]);
    headline.push_record(["Total interest".to_string(), money(kpis.total_interest)]);
    headline.push_record(["Interest saved".to_string(), money(savings.interest_saved)]);
    headline.push_record(["Paid to lender".to_string(), money(kpis.total_paid_to_lender)]);
    headline.push_record(["All-in cost".to_string(), money(kpis.all_in_cost)]);

    let mut rates = Builder::default();
    rates.push_record(["Rate %", "Payment", "Years", "Total interest"]);
    for point in &report.scenarios.rates {
        rates.push_record([
            format!("{:.2}", point.rate),
            money(point.kpis.monthly_payment),
            format!("{:.2}", point.kpis.payoff_years),
            money(point.kpis.total_interest),
        ]);
    }

    let grid = &report.scenarios.grid;
    let mut heatmap = Builder::default();
    heatmap.push_record(
        std::iter::once("Overpayment".to_string())
            .chain(grid.axis_values.iter().map(|value| format!("{value:.2}"))),
    );
    for (overpayment, row) in grid.overpayments.iter().zip(&grid.cells) {
        heatmap.push_record(
            std::iter::once(money(*overpayment))
                .chain(row.iter().map(|cell| format!("{:.1}", cell.payoff_years))),
        );
    }

    let mut comparison = Builder::default();
    comparison.push_record(["Metric", PLAN_A, PLAN_B, "Difference (A-B)"]);
    for delta in &report.comparison.differences {
        comparison.push_record([
            delta.metric.to_string(),
            format!("{:.2}", delta.first),
            format!("{:.2}", delta.second),
            format!("{:.2}", delta.difference),
        ]);
    }

    [
        (
            "Mortgage plan (scenario estimate, not financial advice)",
            headline,
        ),
        ("Rate scenarios", rates),
        (
            "Mortgage-free years by overpayment (rows) and rate (columns)",
            heatmap,
        ),
        ("Plan comparison", comparison),
    ]
    .into_iter()
    .map(|(title, builder)| format!("{title}\n{}\n", Table::from(builder)))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Two decimals with thousands separators.
fn money(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (whole, fraction) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{fraction}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::default_cli_for_api;

    #[test]
    fn money_groups_thousands() {
        assert_eq!(money(0.0), "0.00");
        assert_eq!(money(999.994), "999.99");
        assert_eq!(money(1_288.3719), "1,288.37");
        assert_eq!(money(240_000.0), "240,000.00");
        assert_eq!(money(-1_234_567.891), "-1,234,567.89");
        assert_eq!(money(-0.001), "0.00");
    }

    #[test]
    fn summary_output_covers_every_section() {
        let out = run_cli(&default_cli_for_api()).expect("defaults are valid");
        assert!(out.contains("Monthly payment"));
        assert!(out.contains("1,288.37"));
        assert!(out.contains("(202 months)"));
        assert!(out.contains("Rate scenarios"));
        assert!(out.contains("Plan comparison"));
        assert!(out.contains("Total Interest"));
    }

    #[test]
    fn summary_sections_are_bordered_tables() {
        let out = run_cli(&default_cli_for_api()).expect("defaults are valid");
        assert!(out.contains("| Monthly payment "));
        assert!(out.contains("| Rate % "));
        assert!(out.contains("| Overpayment "));
        assert!(out.contains("| Difference (A-B) |"));
        assert!(out.lines().any(|line| line.starts_with("+-")));
        assert_eq!(out.matches("| Metric ").count(), 2);
    }

    #[test]
    fn csv_output_is_the_schedule_export() {
        let mut cli = default_cli_for_api();
        cli.format = OutputFormat::Csv;
        let out = run_cli(&cli).expect("defaults are valid");
        assert!(out.starts_with("price,300000.00\n"));
        assert!(out.contains("month,opening_balance,interest,principal,overpayment,closing_balance"));
    }

    #[test]
    fn json_output_is_parseable() {
        let mut cli = default_cli_for_api();
        cli.format = OutputFormat::Json;
        let out = run_cli(&cli).expect("defaults are valid");
        let value: serde_json::Value = serde_json::from_str(&out).expect("valid json");
        assert_eq!(value["kpis"]["payoffMonths"], 202);
        assert_eq!(value["comparison"]["plans"][1]["label"], "Plan B");
        assert_eq!(value["scenarios"]["rates"].as_array().map(Vec::len), Some(17));
    }

    #[test]
    fn invalid_flags_surface_validation_errors() {
        let mut cli = default_cli_for_api();
        cli.deposit = cli.price;
        let err = run_cli(&cli).expect_err("deposit equal to price");
        assert_eq!(
            err.to_string(),
            "Input validation error: deposit must be less than price"
        );
    }
}
