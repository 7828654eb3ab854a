//! Market-data source implementations

pub mod coingecko;
pub mod failover;

pub use coingecko::CoinGeckoSource;
pub use failover::FailoverSource;
