use thiserror::Error;

/// Problems that abort the current cycle but leave the next one unaffected.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("missing sheet: {0}")]
    MissingSheet(String),
}

/// Failure to obtain a quote for a single symbol.
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("quote request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("quote api error {code}: {message}")]
    Api { code: String, message: String },

    #[error("no quote data for {0}")]
    NoData(String),

    #[error("failed to decode quote response: {0}")]
    Decode(#[from] serde_json::Error),
}
