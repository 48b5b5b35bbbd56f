// In crates/app-config/src/lib.rs

use config::{Config, Environment, File};
use std::collections::HashSet;
use std::path::Path;

pub mod error;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use types::{MarketSettings, PollerSettings, PortfolioConfig, Settings};

/// Loads the application settings from various sources.
///
/// This function orchestrates the layered configuration loading:
/// 1. Reads from a default `base.toml` file.
/// 2. Merges settings from an environment-specific file (e.g., `development.toml`).
/// 3. Merges settings from environment variables.
pub fn load_settings() -> Result<Settings> {
    load_settings_from("config")
}

/// Same as [`load_settings`], reading the TOML files from `dir`.
pub fn load_settings_from(dir: &str) -> Result<Settings> {
    // Get the current environment. Default to "development" if not set.
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

    let settings = Config::builder()
        // 1. Load the base configuration file.
        .add_source(File::with_name(&format!("{}/base", dir)))
        // 2. Load the environment-specific configuration file.
        .add_source(File::with_name(&format!("{}/{}", dir, environment)).required(false))
        // 3. Load settings from environment variables (e.g., `APP__POLLER__POLL_INTERVAL_SECS=30`).
        // The prefix is `APP`, separator is `__`.
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    check_settings(&settings)?;

    Ok(settings)
}

/// Rejects values the loader accepts but the service cannot run with.
pub fn check_settings(settings: &Settings) -> Result<()> {
    if settings.poller.poll_interval_secs == 0 {
        return Err(Error::InvalidSettings(
            "poller.poll_interval_secs must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Loads the portfolio seed file (accounts, holdings and orders).
pub fn load_portfolio(path: impl AsRef<Path>) -> Result<PortfolioConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_portfolio(&content)
}

/// Parses and cross-checks a portfolio seed.
pub fn parse_portfolio(content: &str) -> Result<PortfolioConfig> {
    let portfolio: PortfolioConfig = toml::from_str(content)?;

    let mut names = HashSet::new();
    for account in &portfolio.accounts {
        if !names.insert(account.name.as_str()) {
            return Err(Error::InvalidPortfolio(format!(
                "duplicate account name '{}'",
                account.name
            )));
        }
    }

    let referenced = portfolio
        .holdings
        .iter()
        .map(|h| h.account.as_str())
        .chain(portfolio.orders.iter().map(|o| o.account.as_str()));
    for account in referenced {
        if !names.contains(account) {
            return Err(Error::InvalidPortfolio(format!("unknown account '{}'", account)));
        }
    }

    Ok(portfolio)
}
