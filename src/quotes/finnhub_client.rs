use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::config::app_config::FinnhubSettings;
use crate::config::credentials::FinnhubCredentials;
use crate::error::QuoteError;
use crate::quotes::quote_source::QuoteSource;
use crate::types::quote::Quote;

#[derive(Clone, Debug)]
pub struct FinnhubClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FinnhubClient {
    pub fn new(
        settings: &FinnhubSettings,
        credentials: FinnhubCredentials,
    ) -> Result<Self, QuoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key,
        })
    }

    fn quote_url(&self, symbol: &str) -> Result<Url, QuoteError> {
        Url::parse_with_params(
            &format!("{}/quote", self.base_url),
            &[("symbol", symbol), ("token", self.api_key.as_str())],
        )
        .map_err(|error| QuoteError::Api {
            code: "invalid_url".to_string(),
            message: error.to_string(),
        })
    }
}

#[async_trait]
impl QuoteSource for FinnhubClient {
    fn name(&self) -> &'static str {
        "finnhub"
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let response = self.http.get(self.quote_url(symbol)?).send().await?;

        let status = response.status();
        let text = response.text().await?;

        parse_quote_response(symbol, status, &text)
    }
}

#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    c: Option<f64>,
    d: Option<f64>,
    dp: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    o: Option<f64>,
    pc: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

pub(crate) fn parse_quote_response(
    symbol: &str,
    status: StatusCode,
    text: &str,
) -> Result<Quote, QuoteError> {
    if !status.is_success() {
        let message = serde_json::from_str::<FinnhubQuote>(text)
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| text.trim().to_string());

        return Err(QuoteError::Api {
            code: status.as_u16().to_string(),
            message,
        });
    }

    let body: FinnhubQuote = serde_json::from_str(text)?;

    if let Some(message) = body.error {
        return Err(QuoteError::Api {
            code: "error".to_string(),
            message,
        });
    }

    let current = match body.c {
        Some(current) => current,
        None => return Err(QuoteError::NoData(symbol.to_string())),
    };

    /* unknown symbols come back as all zeros with null changes */
    if current == 0.0 && body.d.is_none() {
        return Err(QuoteError::NoData(symbol.to_string()));
    }

    Ok(Quote {
        symbol: symbol.to_string(),
        current,
        change: body.d,
        percent_change: body.dp,
        high: body.h,
        low: body.l,
        open: body.o,
        previous_close: body.pc,
    })
}
