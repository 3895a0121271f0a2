use anyhow::{Context, Result};
use dotenv::dotenv;
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "IMGTK_";

/// Defaults read from `IMGTK_*` environment variables (and `.env`).
/// Command line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppConfig {
    pub threads: Option<usize>,
    pub tesseract: Option<PathBuf>,
    #[serde(default)]
    pub fail_fast: bool,
    /// Comma separated, e.g. `IMGTK_EXTENSIONS=png,jpg`.
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let config = Self::from_iter(std::env::vars())
            .context(format!("invalid {}* environment variable", ENV_PREFIX))?;
        debug!("Loaded config: {:?}", config);
        Ok(config)
    }

    fn from_iter<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(ENV_PREFIX).from_iter(vars)?)
    }
}
