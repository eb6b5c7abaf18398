mod cache;
mod chain;
mod config;
mod error;
mod expiry;
mod fetch;
mod fyers_client;
mod logging;
mod models;
mod nse_client;
mod server;
mod singleflight;
mod symbols;

use anyhow::Result;
use chain::ChainAssembler;
use colored::Colorize;
use fetch::KeyedFetcher;
use fyers_client::FyersClient;
use nse_client::NseClient;
use std::sync::Arc;

fn build_assembler() -> Result<Arc<ChainAssembler>> {
    let market_config = config::MarketConfig::default();

    // Broker client is optional; without a token the assembler works off the
    // exchange fallback alone.
    let fyers = match (config::get_fyers_client_id(), config::get_fyers_access_token()) {
        (Some(client_id), Some(token)) => Some(FyersClient::new(&client_id, &token)?),
        _ => {
            println!(
                "{} FYERS_CLIENT_ID / FYERS_ACCESS_TOKEN not set, exchange-only mode",
                "ℹ".blue()
            );
            None
        }
    };

    Ok(Arc::new(ChainAssembler::new(
        market_config,
        Arc::new(KeyedFetcher::new()),
        fyers,
        NseClient::new()?,
    )))
}

/// Fetch and print one option chain (for quick manual checks).
async fn run_chain(symbol: &str, expiry: Option<String>) -> Result<()> {
    println!("{}", "=".repeat(60).blue());
    println!("{}", "Option Clock Chain Fetch".green().bold());
    println!("{}", "=".repeat(60).blue());
    println!();

    let assembler = build_assembler()?;
    let expiry = expiry
        .map(|e| e.parse::<chrono::NaiveDate>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("invalid OC_EXPIRY: {}", e))?;

    println!("{} Fetching option chain for {}...", "→".cyan(), symbol.yellow());
    let chain = assembler.build_chain(symbol, expiry).await?;

    println!("{}", "=".repeat(60).blue());
    println!("{}", "Results".cyan().bold());
    println!("{}", "=".repeat(60).blue());
    println!("{} Symbol: {}", "✓".green(), chain.symbol.yellow());
    println!(
        "{} Spot: {:.2} (source: {:?})",
        "✓".green(),
        chain.spot_price,
        chain.spot_source
    );
    println!("{} Expiry: {}", "✓".green(), chain.expiry);
    println!("{} Quote source: {:?}", "✓".green(), chain.quote_source);
    println!("{} Strikes: {}", "✓".green(), chain.strikes.len());
    println!(
        "{} PCR: {:.3} ({})",
        "ℹ".blue(),
        chain.pcr,
        chain.sentiment
    );
    println!("{} Max pain: {}", "ℹ".blue(), chain.max_pain_strike);
    println!(
        "{} Highest OI — CE: {} / PE: {}",
        "ℹ".blue(),
        chain.highest_call_oi_strike,
        chain.highest_put_oi_strike
    );
    println!();
    println!("{}", serde_json::to_string_pretty(&chain)?);

    Ok(())
}

/// Run API server mode.
async fn run_server(port: u16) -> Result<()> {
    println!("{}", "=".repeat(60).blue());
    println!("{}", "Option Clock API Server".green().bold());
    println!("{}", "=".repeat(60).blue());
    println!();

    let assembler = build_assembler()?;
    server::start_server(assembler, port).await
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let mode = config::get_execution_mode();
    let port = config::get_server_port();
    let symbol = config::get_single_symbol();
    let expiry = config::get_single_expiry();

    match mode.as_str() {
        "server" => run_server(port).await?,
        "chain" => run_chain(&symbol, expiry).await?,
        _ => {
            eprintln!("Invalid mode '{}'. Use 'server' or 'chain'", mode);
            eprintln!("Set OC_MODE to control execution mode. Examples:");
            eprintln!("  OC_MODE=server OC_PORT=3001 cargo run");
            eprintln!("  OC_MODE=chain OC_SYMBOL=NIFTY cargo run");
            eprintln!("  OC_MODE=chain OC_SYMBOL=NIFTY OC_EXPIRY=2026-02-12 cargo run");
            std::process::exit(1);
        }
    }

    Ok(())
}
