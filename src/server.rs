use crate::cache::CacheStats;
use crate::chain::ChainAssembler;
use crate::error::MarketError;
use crate::models::{NseIndexRow, OptionChainResult};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::info;

// -----------------------------------------------
// API REQUEST/RESPONSE MODELS
// -----------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChainQuery {
    pub symbol: String,
    /// Optional expiry pin, YYYY-MM-DD.
    pub expiry: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ExpiriesQuery {
    pub symbol: String,
}

#[derive(Debug, Deserialize)]
pub struct QuotesQuery {
    /// Comma-separated Fyers symbols.
    pub symbols: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub processing_time_ms: Option<u64>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T, start: Instant) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            processing_time_ms: Some(start.elapsed().as_millis() as u64),
        }
    }

    fn err(error: &MarketError, start: Instant) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            processing_time_ms: Some(start.elapsed().as_millis() as u64),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpiriesResponse {
    pub symbol: String,
    pub expiries: Vec<NaiveDate>,
}

// -----------------------------------------------
// APPLICATION STATE
// -----------------------------------------------

#[derive(Clone)]
pub struct AppState {
    assembler: Arc<ChainAssembler>,
}

impl AppState {
    pub fn new(assembler: Arc<ChainAssembler>) -> Self {
        Self { assembler }
    }
}

// -----------------------------------------------
// API HANDLERS
// -----------------------------------------------

/// GET /api/option-chain?symbol=NIFTY&expiry=2026-02-12
async fn get_option_chain(
    Query(query): Query<ChainQuery>,
    State(state): State<AppState>,
) -> Json<ApiResponse<OptionChainResult>> {
    let start = Instant::now();
    let symbol = query.symbol.to_uppercase();

    match state.assembler.build_chain(&symbol, query.expiry).await {
        Ok(chain) => Json(ApiResponse::ok(chain, start)),
        Err(e) => Json(ApiResponse::err(&e, start)),
    }
}

/// GET /api/expiries?symbol=NIFTY
async fn get_expiries(
    Query(query): Query<ExpiriesQuery>,
    State(state): State<AppState>,
) -> Json<ApiResponse<ExpiriesResponse>> {
    let start = Instant::now();
    let symbol = query.symbol.to_uppercase();

    match state.assembler.expiries(&symbol) {
        Ok(expiries) => Json(ApiResponse::ok(ExpiriesResponse { symbol, expiries }, start)),
        Err(e) => Json(ApiResponse::err(&e, start)),
    }
}

/// GET /api/quotes?symbols=NSE:SBIN-EQ,NSE:TCS-EQ
async fn get_quotes(
    Query(query): Query<QuotesQuery>,
    State(state): State<AppState>,
) -> Json<ApiResponse<Value>> {
    let start = Instant::now();
    let symbols: Vec<String> = query
        .symbols
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    match state.assembler.raw_quotes(symbols).await {
        Ok(quotes) => match serde_json::to_value(quotes) {
            Ok(value) => Json(ApiResponse::ok(value, start)),
            Err(e) => Json(ApiResponse::err(
                &MarketError::UpstreamUnavailable(e.to_string()),
                start,
            )),
        },
        Err(e) => Json(ApiResponse::err(&e, start)),
    }
}

/// GET /api/indices
async fn get_indices(State(state): State<AppState>) -> Json<ApiResponse<Vec<NseIndexRow>>> {
    let start = Instant::now();

    match state.assembler.key_indices().await {
        Ok(rows) => Json(ApiResponse::ok(rows, start)),
        Err(e) => Json(ApiResponse::err(&e, start)),
    }
}

/// GET /api/cache-stats
async fn get_cache_stats(State(state): State<AppState>) -> Json<ApiResponse<CacheStats>> {
    let start = Instant::now();
    let stats = state.assembler.cache_stats().await;
    Json(ApiResponse::ok(stats, start))
}

// -----------------------------------------------
// SERVER SETUP
// -----------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/option-chain", get(get_option_chain))
        .route("/api/expiries", get(get_expiries))
        .route("/api/quotes", get(get_quotes))
        .route("/api/indices", get(get_indices))
        .route("/api/cache-stats", get(get_cache_stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(assembler: Arc<ChainAssembler>, port: u16) -> Result<()> {
    let app = build_router(AppState::new(assembler));

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "option-clock API server listening");
    println!("Option Clock API running on http://{}", addr);
    println!("Available endpoints:");
    println!("   GET /api/option-chain?symbol=NIFTY&expiry=2026-02-12");
    println!("   GET /api/expiries?symbol=NIFTY");
    println!("   GET /api/quotes?symbols=NSE:SBIN-EQ,NSE:TCS-EQ");
    println!("   GET /api/indices");
    println!("   GET /api/cache-stats");
    println!();

    axum::serve(listener, app).await?;
    Ok(())
}
