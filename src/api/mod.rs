use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    AmortizationRow, AnnualRow, Kpis, LoanInputs, MetricDelta, OverpaymentSavings, RatePoint,
    RateRange, RawLoanInputs, ScenarioGrid, SweepAxis, ValidationError, analyze, annual_view,
    compare, compute_schedule, overpayment_grid, overpayment_savings, rate_sensitivity, summarize,
    validate_overpayment_levels,
};
use crate::export::{annual_csv_string, schedule_csv_string};

mod report;

pub use report::{CliError, run_cli};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

const DEFAULT_OVERPAYMENT_LEVELS: [f64; 5] = [0.0, 3_000.0, 6_000.0, 12_000.0, 18_000.0];

pub const PLAN_A: &str = "Plan A";
pub const PLAN_B: &str = "Plan B";

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Summary,
    Json,
    Csv,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mortgage-planner",
    about = "Mortgage payoff planner: KPIs, rate scenarios, overpayment grids and plan comparison",
    after_help = "Run `mortgage-planner serve [port]` to start the web app instead."
)]
pub struct Cli {
    #[arg(long, default_value_t = 300_000.0, help = "Property price")]
    price: f64,
    #[arg(long, default_value_t = 60_000.0, help = "Deposit paid up front")]
    deposit: f64,
    #[arg(
        long = "rate",
        default_value_t = 5.0,
        help = "Annual interest rate in percent, e.g. 4.5"
    )]
    annual_rate: f64,
    #[arg(long, default_value_t = 30, help = "Loan term in years (1-50)")]
    term_years: u32,
    #[arg(
        long,
        default_value_t = 1_200.0,
        help = "Fixed annual running costs: insurance, service charge and similar"
    )]
    annual_insurance: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual recurring property fee")]
    annual_fee: f64,
    #[arg(
        long,
        default_value_t = 6_000.0,
        help = "Extra principal paid every 12th month"
    )]
    annual_overpayment: f64,
    #[arg(long, default_value_t = 3.0, help = "Lowest scenario rate in percent")]
    scenario_low: f64,
    #[arg(long, default_value_t = 7.0, help = "Highest scenario rate in percent")]
    scenario_high: f64,
    #[arg(long, default_value_t = 0.25, help = "Scenario rate step in percent")]
    scenario_step: f64,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Comma-separated annual overpayments for the grid [default: 0,3000,6000,12000,18000]"
    )]
    overpayment_levels: Vec<f64>,
    #[arg(long, help = "Plan A rate in percent, defaults to --rate")]
    plan_a_rate: Option<f64>,
    #[arg(long, help = "Plan A annual overpayment, defaults to --annual-overpayment")]
    plan_a_overpayment: Option<f64>,
    #[arg(long, help = "Plan B rate in percent, defaults to one point below --rate")]
    plan_b_rate: Option<f64>,
    #[arg(long, help = "Plan B annual overpayment, defaults to --annual-overpayment")]
    plan_b_overpayment: Option<f64>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
    format: OutputFormat,
}

impl Cli {
    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlanPayload {
    price: Option<f64>,
    deposit: Option<f64>,
    rate: Option<f64>,
    term_years: Option<u32>,
    annual_insurance: Option<f64>,
    annual_fee: Option<f64>,
    annual_overpayment: Option<f64>,

    scenario_low: Option<f64>,
    scenario_high: Option<f64>,
    scenario_step: Option<f64>,
    overpayment_levels: Option<String>,

    plan_a_rate: Option<f64>,
    plan_a_overpayment: Option<f64>,
    plan_b_rate: Option<f64>,
    plan_b_overpayment: Option<f64>,
}

/// Everything one submission asks for, already validated.
#[derive(Debug, Clone)]
pub(crate) struct PlanRequest {
    inputs: LoanInputs,
    rates: RateRange,
    overpayment_levels: Vec<f64>,
    plan_a: LoanInputs,
    plan_b: LoanInputs,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    inputs: LoanInputs,
    ltv_percent: f64,
    kpis: Kpis,
    baseline: Kpis,
    savings: OverpaymentSavings,
    annual: Vec<AnnualRow>,
    schedule: Vec<AmortizationRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenariosResponse {
    rate_range: RateRange,
    rates: Vec<RatePoint>,
    grid: ScenarioGrid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanSummary {
    label: String,
    rate: f64,
    annual_overpayment: f64,
    kpis: Kpis,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    plans: Vec<PlanSummary>,
    differences: Vec<MetricDelta>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    field: Option<String>,
}

pub(crate) fn build_request(cli: &Cli) -> Result<PlanRequest, ValidationError> {
    let inputs = LoanInputs::new(RawLoanInputs {
        price: cli.price,
        deposit: cli.deposit,
        annual_rate_percent: cli.annual_rate,
        term_years: cli.term_years,
        annual_insurance: cli.annual_insurance,
        annual_fee: cli.annual_fee,
        annual_overpayment: cli.annual_overpayment,
    })?;

    let rates = RateRange::new(cli.scenario_low, cli.scenario_high, cli.scenario_step)?;

    let overpayment_levels = if cli.overpayment_levels.is_empty() {
        DEFAULT_OVERPAYMENT_LEVELS.to_vec()
    } else {
        cli.overpayment_levels.clone()
    };
    validate_overpayment_levels(&overpayment_levels)?;

    let plan_a = inputs
        .with_rate(cli.plan_a_rate.unwrap_or(cli.annual_rate))?
        .with_overpayment(cli.plan_a_overpayment.unwrap_or(cli.annual_overpayment))?;
    let plan_b_rate = cli.plan_b_rate.unwrap_or_else(|| {
        if cli.annual_rate > 1.0 {
            cli.annual_rate - 1.0
        } else {
            cli.annual_rate
        }
    });
    let plan_b = inputs
        .with_rate(plan_b_rate)?
        .with_overpayment(cli.plan_b_overpayment.unwrap_or(cli.annual_overpayment))?;

    Ok(PlanRequest {
        inputs,
        rates,
        overpayment_levels,
        plan_a,
        plan_b,
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/analyze",
            get(analyze_get_handler).post(analyze_post_handler),
        )
        .route(
            "/api/scenarios",
            get(scenarios_get_handler).post(scenarios_post_handler),
        )
        .route(
            "/api/compare",
            get(compare_get_handler).post(compare_post_handler),
        )
        .route("/api/export.csv", get(export_schedule_handler))
        .route("/api/annual.csv", get(export_annual_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    log::info!("mortgage planner listening on http://{addr}");
    println!("Mortgage planner listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found", None)
}

async fn analyze_get_handler(Query(payload): Query<PlanPayload>) -> Response {
    analyze_handler_impl(payload).await
}

async fn analyze_post_handler(Json(payload): Json<PlanPayload>) -> Response {
    analyze_handler_impl(payload).await
}

async fn scenarios_get_handler(Query(payload): Query<PlanPayload>) -> Response {
    scenarios_handler_impl(payload).await
}

async fn scenarios_post_handler(Json(payload): Json<PlanPayload>) -> Response {
    scenarios_handler_impl(payload).await
}

async fn compare_get_handler(Query(payload): Query<PlanPayload>) -> Response {
    compare_handler_impl(payload).await
}

async fn compare_post_handler(Json(payload): Json<PlanPayload>) -> Response {
    compare_handler_impl(payload).await
}

async fn analyze_handler_impl(payload: PlanPayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return validation_error_response(&err),
    };
    log::debug!(
        "analyze: loan={} rate={} term={}",
        request.inputs.loan_amount(),
        request.inputs.annual_rate_percent(),
        request.inputs.term_years()
    );
    json_response(StatusCode::OK, build_analyze_response(&request.inputs))
}

async fn scenarios_handler_impl(payload: PlanPayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return validation_error_response(&err),
    };
    match build_scenarios_response(&request) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => validation_error_response(&err),
    }
}

async fn compare_handler_impl(payload: PlanPayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return validation_error_response(&err),
    };
    match build_compare_response(&request) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => validation_error_response(&err),
    }
}

async fn export_schedule_handler(Query(payload): Query<PlanPayload>) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return validation_error_response(&err),
    };
    match schedule_csv_string(&analyze(&request.inputs)) {
        Ok(body) => csv_response(body, "mortgage_schedule.csv"),
        Err(err) => {
            log::error!("schedule export failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string(), None)
        }
    }
}

async fn export_annual_handler(Query(payload): Query<PlanPayload>) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return validation_error_response(&err),
    };
    let result = analyze(&request.inputs);
    match annual_csv_string(&annual_view(&result.rows)) {
        Ok(body) => csv_response(body, "annual_cashflow.csv"),
        Err(err) => {
            log::error!("annual export failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string(), None)
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn csv_response(body: String, filename: &str) -> Response {
    let disposition = format!("attachment; filename=\"{filename}\"");
    with_cache_control((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

fn error_response(status: StatusCode, msg: &str, field: Option<&str>) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            field: field.map(str::to_string),
        },
    )
}

fn validation_error_response(err: &ValidationError) -> Response {
    log::warn!("rejected submission: {err}");
    error_response(StatusCode::BAD_REQUEST, &err.to_string(), Some(err.field()))
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<PlanRequest, String> {
    let payload = serde_json::from_str::<PlanPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload).map_err(|e| e.to_string())
}

fn api_request_from_payload(payload: PlanPayload) -> Result<PlanRequest, ValidationError> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.price {
        cli.price = v;
    }
    if let Some(v) = payload.deposit {
        cli.deposit = v;
    }
    if let Some(v) = payload.rate {
        cli.annual_rate = v;
    }
    if let Some(v) = payload.term_years {
        cli.term_years = v;
    }
    if let Some(v) = payload.annual_insurance {
        cli.annual_insurance = v;
    }
    if let Some(v) = payload.annual_fee {
        cli.annual_fee = v;
    }
    if let Some(v) = payload.annual_overpayment {
        cli.annual_overpayment = v;
    }

    if let Some(v) = payload.scenario_low {
        cli.scenario_low = v;
    }
    if let Some(v) = payload.scenario_high {
        cli.scenario_high = v;
    }
    if let Some(v) = payload.scenario_step {
        cli.scenario_step = v;
    }
    if let Some(v) = payload.overpayment_levels {
        cli.overpayment_levels = parse_overpayment_levels(&v)?;
    }

    cli.plan_a_rate = payload.plan_a_rate;
    cli.plan_a_overpayment = payload.plan_a_overpayment;
    cli.plan_b_rate = payload.plan_b_rate;
    cli.plan_b_overpayment = payload.plan_b_overpayment;

    build_request(&cli)
}

/// Parses `"0, 3000, 6000"`. Blank entries are skipped; anything else must be a number.
fn parse_overpayment_levels(raw: &str) -> Result<Vec<f64>, ValidationError> {
    let mut levels = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let value = item
            .parse::<f64>()
            .map_err(|_| ValidationError::InvalidList {
                field: "overpayment_levels",
                value: item.to_string(),
            })?;
        levels.push(value);
    }
    if levels.is_empty() {
        return Err(ValidationError::EmptySweep {
            field: "overpayment_levels",
        });
    }
    Ok(levels)
}

pub(crate) fn default_cli_for_api() -> Cli {
    let defaults = LoanInputs::generic_defaults();
    Cli {
        price: defaults.price(),
        deposit: defaults.deposit(),
        annual_rate: defaults.annual_rate_percent(),
        term_years: defaults.term_years(),
        annual_insurance: defaults.annual_insurance(),
        annual_fee: defaults.annual_fee(),
        annual_overpayment: defaults.annual_overpayment(),
        scenario_low: 3.0,
        scenario_high: 7.0,
        scenario_step: 0.25,
        overpayment_levels: Vec::new(),
        plan_a_rate: None,
        plan_a_overpayment: None,
        plan_b_rate: None,
        plan_b_overpayment: None,
        format: OutputFormat::Summary,
    }
}

fn build_analyze_response(inputs: &LoanInputs) -> AnalyzeResponse {
    let result = analyze(inputs);
    let baseline = summarize(&compute_schedule(inputs).baseline());
    AnalyzeResponse {
        inputs: *inputs,
        ltv_percent: inputs.ltv_percent(),
        kpis: result.kpis,
        baseline,
        savings: overpayment_savings(inputs),
        annual: annual_view(&result.rows),
        schedule: result.rows,
    }
}

fn build_scenarios_response(request: &PlanRequest) -> Result<ScenariosResponse, ValidationError> {
    let rate_values = request.rates.values();
    let rates = rate_sensitivity(&request.inputs, &rate_values)?;
    let grid = overpayment_grid(
        &request.inputs,
        &SweepAxis::Rate(rate_values),
        &request.overpayment_levels,
    )?;
    Ok(ScenariosResponse {
        rate_range: request.rates,
        rates,
        grid,
    })
}

fn build_compare_response(request: &PlanRequest) -> Result<CompareResponse, ValidationError> {
    let set = compare(&[
        (PLAN_A.to_string(), request.plan_a),
        (PLAN_B.to_string(), request.plan_b),
    ])?;
    let differences = set.difference(PLAN_A, PLAN_B).unwrap_or_default();
    let plans = set
        .plans
        .into_iter()
        .map(|plan| PlanSummary {
            label: plan.label,
            rate: plan.result.inputs.annual_rate_percent(),
            annual_overpayment: plan.result.inputs.annual_overpayment(),
            kpis: plan.result.kpis,
        })
        .collect();
    Ok(CompareResponse { plans, differences })
}
