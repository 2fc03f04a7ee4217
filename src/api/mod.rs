use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Json, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::{
    AccumulationSummary, EngineError, FieldErrors, HORIZON_END_YEAR, InitialInvestmentMode,
    PriceModelVariant, PricePoint, RawAccumulationInputs, RawWithdrawalInputs, WithdrawalMode,
    WithdrawalSummary, YearlyAccumulationRecord, YearlyWithdrawalRecord, price, price_curve,
    run_accumulation, run_withdrawal, summarize_accumulation, summarize_withdrawal,
    validate_accumulation, validate_withdrawal,
};

/// Form values arrive as text from query strings and as either text or numbers from JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Text(String),
    Number(f64),
}

fn text(value: Option<RawValue>) -> String {
    match value {
        Some(RawValue::Text(text)) => text,
        Some(RawValue::Number(number)) => number.to_string(),
        None => String::new(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AccumulationPayload {
    initial_investment_mode: Option<InitialInvestmentMode>,
    initial_investment: Option<RawValue>,
    initial_btc_holding: Option<RawValue>,
    monthly_investment: Option<RawValue>,
    years: Option<RawValue>,
    price_model: Option<PriceModelVariant>,
    exchange_rate: Option<RawValue>,
    inflation_rate: Option<RawValue>,
}

impl AccumulationPayload {
    fn into_raw(self) -> RawAccumulationInputs {
        RawAccumulationInputs {
            initial_investment_mode: self.initial_investment_mode.unwrap_or_default(),
            initial_investment: text(self.initial_investment),
            initial_btc_holding: text(self.initial_btc_holding),
            monthly_investment: text(self.monthly_investment),
            years: text(self.years),
            price_model: self.price_model.unwrap_or_default(),
            exchange_rate: text(self.exchange_rate),
            inflation_rate: text(self.inflation_rate),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WithdrawalPayload {
    initial_btc: Option<RawValue>,
    start_year: Option<RawValue>,
    price_model: Option<PriceModelVariant>,
    withdrawal_mode: Option<WithdrawalMode>,
    withdrawal_amount: Option<RawValue>,
    withdrawal_rate: Option<RawValue>,
    second_phase_enabled: Option<bool>,
    second_phase_year: Option<RawValue>,
    second_phase_mode: Option<WithdrawalMode>,
    second_phase_amount: Option<RawValue>,
    second_phase_rate: Option<RawValue>,
    tax_rate: Option<RawValue>,
    exchange_rate: Option<RawValue>,
    inflation_rate: Option<RawValue>,
}

impl WithdrawalPayload {
    fn into_raw(self) -> RawWithdrawalInputs {
        RawWithdrawalInputs {
            initial_btc: text(self.initial_btc),
            start_year: text(self.start_year),
            price_model: self.price_model.unwrap_or_default(),
            withdrawal_mode: self.withdrawal_mode.unwrap_or_default(),
            withdrawal_amount: text(self.withdrawal_amount),
            withdrawal_rate: text(self.withdrawal_rate),
            second_phase_enabled: self.second_phase_enabled.unwrap_or(false),
            second_phase_year: text(self.second_phase_year),
            second_phase_mode: self.second_phase_mode.unwrap_or_default(),
            second_phase_amount: text(self.second_phase_amount),
            second_phase_rate: text(self.second_phase_rate),
            tax_rate: text(self.tax_rate),
            exchange_rate: text(self.exchange_rate),
            inflation_rate: text(self.inflation_rate),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PriceQuery {
    year: Option<String>,
    model: Option<PriceModelVariant>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PriceCurveQuery {
    model: Option<PriceModelVariant>,
    from: Option<String>,
    to: Option<String>,
    exchange_rate: Option<String>,
}

/// Yearly series plus the headline figures derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection<R, S> {
    pub records: Vec<R>,
    pub summary: S,
}

pub type AccumulationProjection = Projection<YearlyAccumulationRecord, AccumulationSummary>;
pub type WithdrawalProjection = Projection<YearlyWithdrawalRecord, WithdrawalSummary>;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error(transparent)]
    Fields(#[from] FieldErrors),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub year: i32,
    pub model: PriceModelVariant,
    pub price_usd: f64,
}

#[derive(Serialize)]
struct PriceCurveResponse {
    points: Vec<PricePoint>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    current_year: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldErrorResponse<'a> {
    field_errors: &'a FieldErrors,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn project_accumulation(
    raw: &RawAccumulationInputs,
    current_year: i32,
) -> Result<AccumulationProjection, ProjectionError> {
    let params = validate_accumulation(raw, current_year)?;
    let records = run_accumulation(&params)?;
    let summary = summarize_accumulation(&params, &records);
    Ok(Projection { records, summary })
}

pub fn project_withdrawal(
    raw: &RawWithdrawalInputs,
    current_year: i32,
) -> Result<WithdrawalProjection, ProjectionError> {
    let params = validate_withdrawal(raw, current_year)?;
    let records = run_withdrawal(&params)?;
    let summary = summarize_withdrawal(&params, &records);
    Ok(Projection { records, summary })
}

pub fn quote_price(year: i32, model: PriceModelVariant) -> Result<PriceQuote, EngineError> {
    Ok(PriceQuote {
        year,
        model,
        price_usd: price(year, model)?,
    })
}

pub fn app(config: Config) -> Router {
    Router::new()
        .route(
            "/api/accumulation",
            get(accumulation_get_handler).post(accumulation_post_handler),
        )
        .route(
            "/api/withdrawal",
            get(withdrawal_get_handler).post(withdrawal_post_handler),
        )
        .route("/api/price", get(price_handler))
        .route("/api/price-curve", get(price_curve_handler))
        .route("/api/health", get(health_handler))
        .fallback(not_found_handler)
        .layer(middleware::map_response(with_cache_control))
        .with_state(Arc::new(config))
}

pub async fn run_http_server(config: Config) -> std::io::Result<()> {
    let addr = config.listen_addr;
    let current_year = config.current_year;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, current_year, "btc-horizon HTTP API listening");

    axum::serve(listener, app(config)).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn health_handler(State(config): State<Arc<Config>>) -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "ok",
            current_year: config.current_year,
        },
    )
}

async fn accumulation_get_handler(
    State(config): State<Arc<Config>>,
    payload: Result<Query<AccumulationPayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => accumulation_handler_impl(&config, payload),
        Err(rejection) => rejected_request(rejection.body_text()),
    }
}

async fn accumulation_post_handler(
    State(config): State<Arc<Config>>,
    payload: Result<Json<AccumulationPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => accumulation_handler_impl(&config, payload),
        Err(rejection) => rejected_request(rejection.body_text()),
    }
}

fn accumulation_handler_impl(config: &Config, payload: AccumulationPayload) -> Response {
    let mut raw = payload.into_raw();
    config.fill_accumulation_defaults(&mut raw);

    match project_accumulation(&raw, config.current_year) {
        Ok(projection) => {
            info!(
                records = projection.records.len(),
                model = ?raw.price_model,
                "accumulation projection served"
            );
            json_response(StatusCode::OK, projection)
        }
        Err(err) => projection_error_response(err),
    }
}

async fn withdrawal_get_handler(
    State(config): State<Arc<Config>>,
    payload: Result<Query<WithdrawalPayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => withdrawal_handler_impl(&config, payload),
        Err(rejection) => rejected_request(rejection.body_text()),
    }
}

async fn withdrawal_post_handler(
    State(config): State<Arc<Config>>,
    payload: Result<Json<WithdrawalPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => withdrawal_handler_impl(&config, payload),
        Err(rejection) => rejected_request(rejection.body_text()),
    }
}

fn withdrawal_handler_impl(config: &Config, payload: WithdrawalPayload) -> Response {
    let mut raw = payload.into_raw();
    config.fill_withdrawal_defaults(&mut raw);

    match project_withdrawal(&raw, config.current_year) {
        Ok(projection) => {
            info!(
                records = projection.records.len(),
                depletion_year = ?projection.summary.depletion_year,
                "withdrawal projection served"
            );
            json_response(StatusCode::OK, projection)
        }
        Err(err) => projection_error_response(err),
    }
}

async fn price_handler(
    State(config): State<Arc<Config>>,
    query: Result<Query<PriceQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => return rejected_request(rejection.body_text()),
    };
    let year = match parse_year(query.year.as_deref(), config.current_year) {
        Ok(year) => year,
        Err(msg) => return rejected_request(msg),
    };

    match quote_price(year, query.model.unwrap_or_default()) {
        Ok(quote) => json_response(StatusCode::OK, quote),
        Err(err) => engine_error_response(err),
    }
}

async fn price_curve_handler(
    State(config): State<Arc<Config>>,
    query: Result<Query<PriceCurveQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => return rejected_request(rejection.body_text()),
    };
    let from = match parse_year(query.from.as_deref(), config.current_year) {
        Ok(year) => year,
        Err(msg) => return rejected_request(format!("from: {msg}")),
    };
    let to = match parse_year(query.to.as_deref(), HORIZON_END_YEAR) {
        Ok(year) => year,
        Err(msg) => return rejected_request(format!("to: {msg}")),
    };
    let exchange_rate = match parse_exchange_rate(query.exchange_rate.as_deref(), config.exchange_rate)
    {
        Ok(rate) => rate,
        Err(msg) => return rejected_request(msg),
    };

    match price_curve(query.model.unwrap_or_default(), from, to, exchange_rate) {
        Ok(points) => json_response(StatusCode::OK, PriceCurveResponse { points }),
        Err(err) => engine_error_response(err),
    }
}

fn parse_year(raw: Option<&str>, default: i32) -> Result<i32, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse::<i32>()
            .map_err(|_| "year must be a whole number".to_string()),
    }
}

fn parse_exchange_rate(raw: Option<&str>, default: f64) -> Result<f64, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse::<f64>()
            .ok()
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .ok_or_else(|| "exchangeRate must be a number greater than 0".to_string()),
    }
}

async fn with_cache_control(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, Json(body)).into_response()
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn rejected_request(msg: impl Into<String>) -> Response {
    let msg = msg.into();
    warn!(error = %msg, "rejected malformed request");
    error_response(StatusCode::BAD_REQUEST, &msg)
}

fn engine_error_response(err: EngineError) -> Response {
    warn!(error = %err, "projection failed");
    error_response(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string())
}

fn projection_error_response(err: ProjectionError) -> Response {
    match err {
        ProjectionError::Fields(errors) => {
            warn!(fields = errors.len(), "rejected invalid inputs");
            json_response(
                StatusCode::BAD_REQUEST,
                FieldErrorResponse {
                    field_errors: &errors,
                },
            )
        }
        ProjectionError::Engine(err) => engine_error_response(err),
    }
}
