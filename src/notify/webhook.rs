use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use url::Url;

use crate::notify::notifier::Notifier;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Chat-bot webhook taking `{"msgtype":"text","text":{"content":...}}`.
#[derive(Clone, Debug)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: Url,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url.trim()).context("invalid webhook url")?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("webhook url must be http(s), got {}", url.scheme());
        }

        let http = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .context("failed to build http client")?;

        Ok(Self { http, url })
    }

    /// Host and path only; the query usually carries the token.
    pub fn redacted_url(&self) -> String {
        format!(
            "{}://{}{}",
            self.url.scheme(),
            self.url.host_str().unwrap_or_default(),
            self.url.path()
        )
    }
}

pub fn text_payload(content: &str) -> serde_json::Value {
    json!({
        "msgtype": "text",
        "text": { "content": content }
    })
}

#[derive(Debug, Deserialize)]
struct WebhookResponse {
    errcode: Option<i64>,
    #[serde(default)]
    errmsg: Option<String>,
}

/// Delivery succeeded iff the body carries `errcode == 0`.
pub(crate) fn check_response(text: &str) -> Result<()> {
    let response: WebhookResponse =
        serde_json::from_str(text).with_context(|| format!("unexpected webhook response: {text}"))?;

    match response.errcode {
        Some(0) => Ok(()),
        Some(code) => Err(anyhow!(
            "webhook rejected message: errcode {code}, {}",
            response.errmsg.unwrap_or_default()
        )),
        None => Err(anyhow!("webhook response missing errcode: {text}")),
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, content: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url.clone())
            .json(&text_payload(content))
            .send()
            .await
            .context("webhook POST failed")?;

        let status = response.status();
        let text = response.text().await.context("read webhook response failed")?;

        if !status.is_success() {
            bail!("webhook http error {status}: {text}");
        }

        check_response(&text)?;

        info!(url = %self.redacted_url(), bytes = content.len(), "webhook message delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shape() {
        assert_eq!(
            text_payload("hello"),
            json!({"msgtype": "text", "text": {"content": "hello"}})
        );
    }

    #[test]
    fn only_errcode_zero_is_success() {
        assert!(check_response(r#"{"errcode":0,"errmsg":"ok"}"#).is_ok());
        assert!(check_response(r#"{"errcode":93000,"errmsg":"invalid webhook url"}"#).is_err());
        assert!(check_response(r#"{"ok":true}"#).is_err());
        assert!(check_response("not json").is_err());
    }

    #[test]
    fn redacts_query_token() {
        let notifier =
            WebhookNotifier::new("https://qyapi.example.com/cgi-bin/webhook/send?key=secret").unwrap();

        assert_eq!(
            notifier.redacted_url(),
            "https://qyapi.example.com/cgi-bin/webhook/send"
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(WebhookNotifier::new("ftp://example.com/hook").is_err());
        assert!(WebhookNotifier::new("not a url").is_err());
    }
}
