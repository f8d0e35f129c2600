use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::config::app_config::OpenExchangeRatesSettings;
use crate::config::credentials::OpenExchangeRatesCredentials;
use crate::error::QuoteError;
use crate::quotes::quote_source::QuoteSource;
use crate::types::quote::Quote;

/// Spot rates for `BASE/QUOTE` pairs from openexchangerates.org.
#[derive(Clone, Debug)]
pub struct OpenExchangeRatesClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
}

impl OpenExchangeRatesClient {
    pub fn new(
        settings: &OpenExchangeRatesSettings,
        credentials: OpenExchangeRatesCredentials,
    ) -> Result<Self, QuoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            app_id: credentials.app_id,
        })
    }
}

fn split_pair(pair: &str) -> Result<(String, String), QuoteError> {
    match pair.trim().split_once('/') {
        Some((base, quote)) if !base.trim().is_empty() && !quote.trim().is_empty() => {
            Ok((base.trim().to_uppercase(), quote.trim().to_uppercase()))
        }
        _ => Err(QuoteError::Api {
            code: "invalid_pair".to_string(),
            message: format!("expected BASE/QUOTE, got {pair}"),
        }),
    }
}

#[async_trait]
impl QuoteSource for OpenExchangeRatesClient {
    fn name(&self) -> &'static str {
        "open_exchange_rates"
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
        let (base, target) = split_pair(symbol)?;

        let url = Url::parse_with_params(
            &format!("{}/latest.json", self.base_url),
            &[
                ("app_id", self.app_id.as_str()),
                ("base", base.as_str()),
                ("symbols", target.as_str()),
            ],
        )
        .map_err(|error| QuoteError::Api {
            code: "invalid_url".to_string(),
            message: error.to_string(),
        })?;

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let text = response.text().await?;

        parse_latest_response(symbol, &target, status, &text)
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    rates: HashMap<String, f64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

pub(crate) fn parse_latest_response(
    pair: &str,
    target: &str,
    status: StatusCode,
    text: &str,
) -> Result<Quote, QuoteError> {
    let body: LatestResponse = match serde_json::from_str(text) {
        Ok(body) => body,
        Err(_) if !status.is_success() => {
            return Err(QuoteError::Api {
                code: status.as_u16().to_string(),
                message: text.trim().to_string(),
            });
        }
        Err(error) => return Err(error.into()),
    };

    if !status.is_success() {
        return Err(QuoteError::Api {
            code: body
                .message
                .unwrap_or_else(|| status.as_u16().to_string()),
            message: body.description.unwrap_or_default(),
        });
    }

    let rate = body
        .rates
        .get(target)
        .copied()
        .ok_or_else(|| QuoteError::NoData(pair.to_string()))?;

    /* a single spot rate: no intraday range is available */
    Ok(Quote {
        symbol: pair.to_string(),
        current: rate,
        change: Some(0.0),
        percent_change: Some(0.0),
        high: Some(rate),
        low: Some(rate),
        open: Some(rate),
        previous_close: Some(rate),
    })
}
