use std::process::ExitCode;

use anyhow::Context;
use btc_horizon::api::{self, ProjectionError};
use btc_horizon::config::Config;
use btc_horizon::core::{
    InitialInvestmentMode, PriceModelVariant, RawAccumulationInputs, RawWithdrawalInputs,
    WithdrawalMode,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "btc-horizon",
    version,
    about = "Project BTC accumulation and withdrawal plans under a power-law price model"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API over HTTP.
    Serve {
        /// Overrides the port of the configured listen address.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Project a recurring-purchase plan through 2050.
    Accumulate(AccumulateArgs),
    /// Project a withdrawal schedule through 2050.
    Withdraw(WithdrawArgs),
    /// Print the projected USD price for a year.
    Price {
        #[arg(long)]
        year: i32,
        #[arg(long, value_enum, default_value_t = CliPriceModel::Standard)]
        model: CliPriceModel,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliPriceModel {
    Standard,
    Conservative,
}

impl From<CliPriceModel> for PriceModelVariant {
    fn from(value: CliPriceModel) -> Self {
        match value {
            CliPriceModel::Standard => PriceModelVariant::Standard,
            CliPriceModel::Conservative => PriceModelVariant::Conservative,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliInitialMode {
    Btc,
    Jpy,
}

impl From<CliInitialMode> for InitialInvestmentMode {
    fn from(value: CliInitialMode) -> Self {
        match value {
            CliInitialMode::Btc => InitialInvestmentMode::Btc,
            CliInitialMode::Jpy => InitialInvestmentMode::Jpy,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliWithdrawalMode {
    Fixed,
    Percentage,
}

impl From<CliWithdrawalMode> for WithdrawalMode {
    fn from(value: CliWithdrawalMode) -> Self {
        match value {
            CliWithdrawalMode::Fixed => WithdrawalMode::Fixed,
            CliWithdrawalMode::Percentage => WithdrawalMode::Percentage,
        }
    }
}

/// Numeric options stay textual so the validator reports every bad field at once.
#[derive(Args, Debug)]
struct AccumulateArgs {
    #[arg(long, value_enum, default_value_t = CliInitialMode::Btc)]
    mode: CliInitialMode,
    /// Lump sum in JPY, used with `--mode jpy`.
    #[arg(long, default_value = "")]
    initial_investment: String,
    /// Starting holding in BTC, used with `--mode btc`.
    #[arg(long, default_value = "")]
    initial_btc_holding: String,
    #[arg(long, default_value = "")]
    monthly_investment: String,
    #[arg(long, default_value = "")]
    years: String,
    #[arg(long, value_enum, default_value_t = CliPriceModel::Standard)]
    model: CliPriceModel,
    #[arg(long, default_value = "")]
    exchange_rate: String,
    #[arg(long, default_value = "")]
    inflation_rate: String,
}

impl AccumulateArgs {
    fn into_raw(self) -> RawAccumulationInputs {
        RawAccumulationInputs {
            initial_investment_mode: self.mode.into(),
            initial_investment: self.initial_investment,
            initial_btc_holding: self.initial_btc_holding,
            monthly_investment: self.monthly_investment,
            years: self.years,
            price_model: self.model.into(),
            exchange_rate: self.exchange_rate,
            inflation_rate: self.inflation_rate,
        }
    }
}

#[derive(Args, Debug)]
struct WithdrawArgs {
    #[arg(long, default_value = "")]
    initial_btc: String,
    #[arg(long, default_value = "")]
    start_year: String,
    #[arg(long, value_enum, default_value_t = CliWithdrawalMode::Fixed)]
    mode: CliWithdrawalMode,
    /// Monthly after-tax spending in JPY for `--mode fixed`.
    #[arg(long, default_value = "")]
    amount: String,
    /// Annual percentage of the holding for `--mode percentage`.
    #[arg(long, default_value = "")]
    rate: String,
    /// Enables a second phase starting in this year.
    #[arg(long)]
    second_phase_year: Option<String>,
    #[arg(long, value_enum, default_value_t = CliWithdrawalMode::Fixed)]
    second_mode: CliWithdrawalMode,
    #[arg(long, default_value = "")]
    second_amount: String,
    #[arg(long, default_value = "")]
    second_rate: String,
    #[arg(long, default_value = "")]
    tax_rate: String,
    #[arg(long, default_value = "")]
    exchange_rate: String,
    #[arg(long, default_value = "")]
    inflation_rate: String,
    #[arg(long, value_enum, default_value_t = CliPriceModel::Standard)]
    model: CliPriceModel,
}

impl WithdrawArgs {
    fn into_raw(self) -> RawWithdrawalInputs {
        RawWithdrawalInputs {
            initial_btc: self.initial_btc,
            start_year: self.start_year,
            price_model: self.model.into(),
            withdrawal_mode: self.mode.into(),
            withdrawal_amount: self.amount,
            withdrawal_rate: self.rate,
            second_phase_enabled: self.second_phase_year.is_some(),
            second_phase_year: self.second_phase_year.unwrap_or_default(),
            second_phase_mode: self.second_mode.into(),
            second_phase_amount: self.second_amount,
            second_phase_rate: self.second_rate,
            tax_rate: self.tax_rate,
            exchange_rate: self.exchange_rate,
            inflation_rate: self.inflation_rate,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;

    match cli.command {
        Command::Serve { port } => {
            let config = match port {
                Some(port) => config.with_port(port),
                None => config,
            };
            api::run_http_server(config)
                .await
                .context("HTTP server failed")?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Accumulate(args) => {
            let mut raw = args.into_raw();
            config.fill_accumulation_defaults(&mut raw);
            match api::project_accumulation(&raw, config.current_year) {
                Ok(projection) => print_json(&projection),
                Err(err) => Ok(report_failure(err)),
            }
        }
        Command::Withdraw(args) => {
            let mut raw = args.into_raw();
            config.fill_withdrawal_defaults(&mut raw);
            match api::project_withdrawal(&raw, config.current_year) {
                Ok(projection) => print_json(&projection),
                Err(err) => Ok(report_failure(err)),
            }
        }
        Command::Price { year, model } => match api::quote_price(year, model.into()) {
            Ok(quote) => print_json(&quote),
            Err(err) => Ok(report_failure(err.into())),
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<ExitCode> {
    let json = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

fn report_failure(err: ProjectionError) -> ExitCode {
    match err {
        ProjectionError::Fields(errors) => {
            warn!(fields = errors.len(), "rejected invalid inputs");
            for (field, message) in errors.iter() {
                eprintln!("{field}: {message}");
            }
            ExitCode::from(2)
        }
        ProjectionError::Engine(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
