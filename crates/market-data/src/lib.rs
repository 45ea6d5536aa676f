pub mod collector;
pub mod http_source;

pub use collector::DataCollector;
pub use http_source::{HttpMarketData, MarketDataConfig};
