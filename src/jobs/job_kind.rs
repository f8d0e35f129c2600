use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use clap::ValueEnum;

/// Every recurring job the runner knows how to dispatch. The trigger
/// registry addresses them by their handler name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobKind {
    #[clap(name = "quotes-window")]
    QuotesWindow,
    #[clap(name = "quotes-always")]
    QuotesAlways,
    #[clap(name = "monitor")]
    MonitorDecisions,
    #[clap(name = "reconcile")]
    WindowReconcile,
    #[clap(name = "health")]
    HealthCheck,
}

impl JobKind {
    pub fn handler(&self) -> &'static str {
        match self {
            Self::QuotesWindow => "quotes.window",
            Self::QuotesAlways => "quotes.always",
            Self::MonitorDecisions => "monitor.decisions",
            Self::WindowReconcile => "window.reconcile",
            Self::HealthCheck => "health.check",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.handler())
    }
}

impl FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "quotes.window" | "quotes-window" => Ok(Self::QuotesWindow),
            "quotes.always" | "quotes-always" => Ok(Self::QuotesAlways),
            "monitor.decisions" | "monitor" => Ok(Self::MonitorDecisions),
            "window.reconcile" | "reconcile" => Ok(Self::WindowReconcile),
            "health.check" | "health" => Ok(Self::HealthCheck),
            other => Err(anyhow!("unknown job handler: {other}")),
        }
    }
}
