use std::env;

use anyhow::Result;

use crate::error::ConfigError;
use crate::store::property_store::{PropertyStore, keys};

pub const FINNHUB_API_KEY_ENV: &str = "FINNHUB_API_KEY";
pub const OXR_APP_ID_ENV: &str = "OXR_APP_ID";
pub const WEBHOOK_URL_ENV: &str = "WEBHOOK_URL";

/// Property store first, then the environment.
fn resolve(
    properties: &dyn PropertyStore,
    property_key: &str,
    env_var: &'static str,
) -> Result<String> {
    if let Some(value) = properties
        .get(property_key)?
        .filter(|value| !value.trim().is_empty())
    {
        return Ok(value.trim().to_string());
    }

    env::var(env_var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(|value| value.trim().to_string())
        .ok_or_else(|| ConfigError::MissingCredential(env_var).into())
}

pub struct FinnhubCredentials {
    pub api_key: String,
}

impl FinnhubCredentials {
    pub fn resolve(properties: &dyn PropertyStore) -> Result<Self> {
        let api_key = resolve(properties, keys::FINNHUB_API_KEY, FINNHUB_API_KEY_ENV)?;

        Ok(Self { api_key })
    }
}

pub struct OpenExchangeRatesCredentials {
    pub app_id: String,
}

impl OpenExchangeRatesCredentials {
    pub fn resolve(properties: &dyn PropertyStore) -> Result<Self> {
        let app_id = resolve(properties, keys::OXR_APP_ID, OXR_APP_ID_ENV)?;

        Ok(Self { app_id })
    }
}

pub struct WebhookCredentials {
    pub url: String,
}

impl WebhookCredentials {
    pub fn resolve(properties: &dyn PropertyStore) -> Result<Self> {
        let url = resolve(properties, keys::WEBHOOK_URL, WEBHOOK_URL_ENV)?;

        Ok(Self { url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::property_store::InMemoryPropertyStore;

    #[test]
    fn property_store_value_wins() {
        let properties = InMemoryPropertyStore::new();
        properties
            .set(keys::WEBHOOK_URL, " https://hook.example/token ")
            .unwrap();

        let credentials = WebhookCredentials::resolve(&properties).unwrap();

        assert_eq!(credentials.url, "https://hook.example/token");
    }

    #[test]
    fn missing_everywhere_is_a_config_error() {
        let properties = InMemoryPropertyStore::new();

        let error = resolve(&properties, "nothing.here", "QUOTEWATCH_TEST_UNSET_VARIABLE")
            .err()
            .unwrap();

        assert!(matches!(
            error.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingCredential(_))
        ));
    }
}
