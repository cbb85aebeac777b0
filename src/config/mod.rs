use anyhow::{Context, Result, bail};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Runtime configuration, sourced from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// LINE Messaging API channel access token.
    pub line_access_token: String,
    /// LINE channel secret, used for webhook signature verification.
    pub line_channel_secret: String,
    /// OpenAI API key.
    pub openai_api_key: String,
    /// Completion model name.
    pub model: String,
    /// Webhook listening port.
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Seam for tests — the
    /// process environment is global state and racy to mutate in parallel.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            match lookup(key) {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => bail!("{} is not set", key),
            }
        };

        let line_access_token = required("LINE_ACCESS_TOKEN")?;
        let line_channel_secret = required("LINE_SECRET")?;
        let openai_api_key = required("OPENAI_API_KEY")?;

        let model = lookup("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT is not a valid port number: {}", raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            line_access_token,
            line_channel_secret,
            openai_api_key,
            model,
            port,
        })
    }
}
