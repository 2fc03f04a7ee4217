mod accumulation;
mod error;
mod price;
mod types;
mod validation;
mod withdrawal;

pub use accumulation::{run_accumulation, summarize_accumulation};
pub use error::EngineError;
pub use price::{GENESIS_YEAR, PowerLawModel, days_since_genesis, price, price_curve};
pub use types::{
    AccumulationParameters, AccumulationSummary, HORIZON_END_YEAR, InitialInvestment,
    InitialInvestmentMode, PriceModelVariant, PricePoint, WithdrawalBasis, WithdrawalMode,
    WithdrawalParameters, WithdrawalPhase, WithdrawalRule, WithdrawalSchedule, WithdrawalSummary,
    YearlyAccumulationRecord, YearlyWithdrawalRecord,
};
pub use validation::{
    Field, FieldErrors, MAX_INVESTMENT_YEARS, MIN_INVESTMENT_YEARS, RawAccumulationInputs,
    RawWithdrawalInputs, validate_accumulation, validate_withdrawal,
};
pub use withdrawal::{depletion_year, run_withdrawal, summarize_withdrawal};
