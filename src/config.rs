use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::io::Read;
use std::net::SocketAddr;

/// Webhook notifier configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "webhook-notify")]
#[command(about = "Send a JSON payload to a webhook, best effort")]
pub struct Config {
    /// Webhook URL notifications are POSTed to
    #[arg(long, env = "NOTIFY_URL")]
    pub notify_url: Option<String>,

    /// Token sent as a bearer Authorization header
    #[arg(long, env = "NOTIFY_TOKEN", hide_env_values = true)]
    pub notify_token: Option<String>,

    /// JSON payload to send, or "-" to read it from stdin
    #[arg(long, env = "PAYLOAD")]
    pub payload: Option<String>,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR")]
    pub metrics_addr: Option<String>,
}

impl Config {
    /// Load configuration from environment and CLI arguments
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors)
        let _ = dotenvy::dotenv();

        let config = Config::try_parse().context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(url) = self.notify_url.as_deref().filter(|url| !url.is_empty()) {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("NOTIFY_URL must be an http(s) URL, got {}", url);
            }
        }
        Ok(())
    }

    /// Parse metrics address as SocketAddr
    pub fn metrics_socket_addr(&self) -> Result<Option<SocketAddr>> {
        self.metrics_addr
            .as_deref()
            .map(|addr| {
                addr.parse()
                    .with_context(|| format!("Invalid METRICS_ADDR: {}", addr))
            })
            .transpose()
    }

    /// Parse the payload argument, reading stdin for "-"
    pub fn parse_payload(&self) -> Result<Option<Value>> {
        let raw = match self.payload.as_deref() {
            None => return Ok(None),
            Some("-") => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read payload from stdin")?;
                buf
            }
            Some(raw) => raw.to_string(),
        };

        let payload = serde_json::from_str(&raw).context("Payload is not valid JSON")?;
        Ok(Some(payload))
    }
}
