use async_trait::async_trait;

use crate::error::QuoteError;
use crate::types::quote::Quote;

#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn quote(&self, symbol: &str) -> Result<Quote, QuoteError>;
}
