//! Constants for the price synchronization engine
//!
//! These are the compile-time defaults. `SyncConfig` and `CoinGeckoConfig`
//! start from them and may be overridden from the environment.

/// Maximum number of external ids sent to the provider in one market-data call
pub const CHUNK_SIZE: usize = 400;

/// Maximum number of chunks allowed to run their provider call and write phase at once
pub const MAX_CONCURRENT_CHUNKS: usize = 2;

/// Price points newer than this are considered fresh by the scheduler (in minutes)
pub const RECENT_WINDOW_MINS: i64 = 30;

/// Largest accepted freshness window (one year, in minutes)
pub const MAX_RECENT_WINDOW_MINS: i64 = 525_600;

/// Quote currency requested from the provider
pub const DEFAULT_VS_CURRENCY: &str = "usd";

/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// HTTP request timeout when talking to the provider (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko endpoint listing every known coin
pub const COINGECKO_COIN_LIST_ENDPOINT: &str = "/coins/list";

/// CoinGecko endpoint returning market data for a set of ids
pub const COINGECKO_MARKETS_ENDPOINT: &str = "/coins/markets";

/// Header carrying the CoinGecko demo API key
pub const COINGECKO_API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "crypto-price-sync/0.1.0";
