use crate::types::asset_class::AssetClass;

pub const DEFAULT_CRYPTO_EXCHANGE: &str = "BINANCE";

/// Provider symbol for a sheet code: `USD/CNY` becomes `OANDA:USD_CNY` and a
/// crypto pair is prefixed with its exchange. Codes that already carry a
/// prefix are passed through.
pub fn finnhub_symbol(asset_class: AssetClass, code: &str, exchange: Option<&str>) -> String {
    let code = code.trim().to_uppercase();
    if code.contains(':') {
        return code;
    }

    match asset_class {
        AssetClass::Stock => code,
        AssetClass::Forex => match code.split_once('/') {
            Some((base, quote)) => format!("OANDA:{}_{}", base.trim(), quote.trim()),
            None => code,
        },
        AssetClass::Crypto => {
            let exchange = exchange
                .map(str::trim)
                .filter(|exchange| !exchange.is_empty())
                .unwrap_or(DEFAULT_CRYPTO_EXCHANGE)
                .to_uppercase();

            format!("{exchange}:{code}")
        }
    }
}
