pub mod batch_fetcher;
pub mod finnhub_client;
pub mod forex_client;
pub mod quote_cache;
pub mod quote_group;
pub mod quote_source;
pub mod symbols;
