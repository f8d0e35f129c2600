use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Stock,
    Forex,
    Crypto,
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stock => write!(f, "stock"),
            Self::Forex => write!(f, "forex"),
            Self::Crypto => write!(f, "crypto"),
        }
    }
}

impl FromStr for AssetClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stock" | "stocks" | "equity" => Ok(Self::Stock),
            "forex" | "fx" => Ok(Self::Forex),
            "crypto" => Ok(Self::Crypto),
            other => Err(anyhow!("unknown asset class: {other}")),
        }
    }
}
