pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod expiry;
pub mod fetch;
pub mod fyers_client;
pub mod logging;
pub mod models;
pub mod nse_client;
pub mod server;
pub mod singleflight;
pub mod symbols;

// Re-exports for convenience
pub use cache::RawCache;
pub use chain::ChainAssembler;
pub use config::MarketConfig;
pub use error::{MarketError, MarketResult};
pub use fetch::KeyedFetcher;
pub use fyers_client::FyersClient;
pub use models::{OptionChainResult, OptionStrike, QuoteFields, QuoteSource, SpotSource};
pub use nse_client::NseClient;
pub use singleflight::FlightGate;
