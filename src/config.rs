use std::env;
use std::net::{AddrParseError, SocketAddr};

use chrono::{Datelike, Local};
use thiserror::Error;

use crate::core::{GENESIS_YEAR, HORIZON_END_YEAR, RawAccumulationInputs, RawWithdrawalInputs};

const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_EXCHANGE_RATE: f64 = 150.0;
pub const DEFAULT_INFLATION_RATE: f64 = 2.0;
pub const DEFAULT_TAX_RATE: f64 = 20.315;

const ENV_LISTEN_ADDR: &str = "BTC_HORIZON_LISTEN_ADDR";
const ENV_CURRENT_YEAR: &str = "BTC_HORIZON_CURRENT_YEAR";
const ENV_EXCHANGE_RATE: &str = "BTC_HORIZON_EXCHANGE_RATE";
const ENV_INFLATION_RATE: &str = "BTC_HORIZON_INFLATION_RATE";
const ENV_TAX_RATE: &str = "BTC_HORIZON_TAX_RATE";

/// Process-wide settings. Rates are in percent, as a user would type them.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub current_year: i32,
    pub exchange_rate: f64,
    pub inflation_rate: f64,
    pub tax_rate: f64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BTC_HORIZON_LISTEN_ADDR is not a valid socket address: {0}")]
    InvalidListenAddr(#[source] AddrParseError),
    #[error("BTC_HORIZON_CURRENT_YEAR must be a year between 2009 and 2050")]
    InvalidCurrentYear,
    #[error("BTC_HORIZON_EXCHANGE_RATE must be a finite number greater than 0")]
    InvalidExchangeRate,
    #[error("BTC_HORIZON_INFLATION_RATE must be a finite percentage between 0 and 100")]
    InvalidInflationRate,
    #[error("BTC_HORIZON_TAX_RATE must be a finite percentage from 0 up to, but not including, 100")]
    InvalidTaxRate,
}

impl Config {
    /// Defaults for every setting, pinned to `current_year`.
    pub fn for_year(current_year: i32) -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            current_year,
            exchange_rate: DEFAULT_EXCHANGE_RATE,
            inflation_rate: DEFAULT_INFLATION_RATE,
            tax_rate: DEFAULT_TAX_RATE,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var_os(key).map(|value| value.to_string_lossy().into_owned()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::for_year(Local::now().year());

        if let Some(value) = lookup(ENV_LISTEN_ADDR) {
            config.listen_addr = value
                .trim()
                .parse()
                .map_err(ConfigError::InvalidListenAddr)?;
        }

        if let Some(value) = lookup(ENV_CURRENT_YEAR) {
            config.current_year = value
                .trim()
                .parse::<i32>()
                .ok()
                .filter(|year| (GENESIS_YEAR..=HORIZON_END_YEAR).contains(year))
                .ok_or(ConfigError::InvalidCurrentYear)?;
        }

        if let Some(value) = lookup(ENV_EXCHANGE_RATE) {
            config.exchange_rate = parse_finite(&value)
                .filter(|rate| *rate > 0.0)
                .ok_or(ConfigError::InvalidExchangeRate)?;
        }

        if let Some(value) = lookup(ENV_INFLATION_RATE) {
            config.inflation_rate = parse_finite(&value)
                .filter(|rate| (0.0..=100.0).contains(rate))
                .ok_or(ConfigError::InvalidInflationRate)?;
        }

        if let Some(value) = lookup(ENV_TAX_RATE) {
            config.tax_rate = parse_finite(&value)
                .filter(|rate| (0.0..100.0).contains(rate))
                .ok_or(ConfigError::InvalidTaxRate)?;
        }

        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.listen_addr.set_port(port);
        self
    }

    /// Fills blank exchange and inflation fields with the configured defaults.
    pub fn fill_accumulation_defaults(&self, raw: &mut RawAccumulationInputs) {
        fill_blank(&mut raw.exchange_rate, self.exchange_rate);
        fill_blank(&mut raw.inflation_rate, self.inflation_rate);
    }

    /// Fills blank tax, exchange and inflation fields with the configured defaults.
    pub fn fill_withdrawal_defaults(&self, raw: &mut RawWithdrawalInputs) {
        fill_blank(&mut raw.tax_rate, self.tax_rate);
        fill_blank(&mut raw.exchange_rate, self.exchange_rate);
        fill_blank(&mut raw.inflation_rate, self.inflation_rate);
    }
}

fn fill_blank(field: &mut String, default: f64) {
    if field.trim().is_empty() {
        *field = default.to_string();
    }
}

fn parse_finite(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
}
