//! Raw form input to typed, range-checked simulation parameters.
//!
//! Every field is checked in one pass so callers can show all problems at once.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::types::{
    AccumulationParameters, HORIZON_END_YEAR, InitialInvestment, InitialInvestmentMode,
    PriceModelVariant, WithdrawalMode, WithdrawalParameters, WithdrawalPhase, WithdrawalRule,
    WithdrawalSchedule,
};

pub const MIN_INVESTMENT_YEARS: i64 = 1;
pub const MAX_INVESTMENT_YEARS: i64 = 26;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    InitialInvestment,
    InitialBtcHolding,
    MonthlyInvestment,
    Years,
    InitialBtc,
    StartYear,
    WithdrawalAmount,
    WithdrawalRate,
    SecondPhaseYear,
    SecondPhaseAmount,
    SecondPhaseRate,
    TaxRate,
    ExchangeRate,
    InflationRate,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::InitialInvestment => "initialInvestment",
            Field::InitialBtcHolding => "initialBtcHolding",
            Field::MonthlyInvestment => "monthlyInvestment",
            Field::Years => "years",
            Field::InitialBtc => "initialBtc",
            Field::StartYear => "startYear",
            Field::WithdrawalAmount => "withdrawalAmount",
            Field::WithdrawalRate => "withdrawalRate",
            Field::SecondPhaseYear => "secondPhaseYear",
            Field::SecondPhaseAmount => "secondPhaseAmount",
            Field::SecondPhaseRate => "secondPhaseRate",
            Field::TaxRate => "taxRate",
            Field::ExchangeRate => "exchangeRate",
            Field::InflationRate => "inflationRate",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field key to message. Only the first problem found for a field is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[serde(transparent)]
#[error("{} field(s) failed validation", .0.len())]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAccumulationInputs {
    pub initial_investment_mode: InitialInvestmentMode,
    pub initial_investment: String,
    pub initial_btc_holding: String,
    pub monthly_investment: String,
    pub years: String,
    pub price_model: PriceModelVariant,
    pub exchange_rate: String,
    pub inflation_rate: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawWithdrawalInputs {
    pub initial_btc: String,
    pub start_year: String,
    pub price_model: PriceModelVariant,
    pub withdrawal_mode: WithdrawalMode,
    pub withdrawal_amount: String,
    pub withdrawal_rate: String,
    pub second_phase_enabled: bool,
    pub second_phase_year: String,
    pub second_phase_mode: WithdrawalMode,
    pub second_phase_amount: String,
    pub second_phase_rate: String,
    pub tax_rate: String,
    pub exchange_rate: String,
    pub inflation_rate: String,
}

pub fn validate_accumulation(
    raw: &RawAccumulationInputs,
    current_year: i32,
) -> Result<AccumulationParameters, FieldErrors> {
    let mut checker = Checker::default();

    let initial = match raw.initial_investment_mode {
        InitialInvestmentMode::Btc => checker
            .non_negative(Field::InitialBtcHolding, &raw.initial_btc_holding)
            .map(|holding_btc| InitialInvestment::Btc { holding_btc }),
        InitialInvestmentMode::Jpy => checker
            .non_negative(Field::InitialInvestment, &raw.initial_investment)
            .map(|amount_jpy| InitialInvestment::Jpy { amount_jpy }),
    };
    let monthly_investment =
        checker.non_negative(Field::MonthlyInvestment, &raw.monthly_investment);
    let years = checker.whole_in_range(
        Field::Years,
        &raw.years,
        MIN_INVESTMENT_YEARS,
        MAX_INVESTMENT_YEARS,
    );
    let exchange_rate = checker.positive(Field::ExchangeRate, &raw.exchange_rate);
    let inflation_rate = checker.percent(Field::InflationRate, &raw.inflation_rate);

    let (
        Some(initial),
        Some(monthly_investment_jpy),
        Some(years),
        Some(exchange_rate),
        Some(inflation),
    ) = (
        initial,
        monthly_investment,
        years,
        exchange_rate,
        inflation_rate,
    )
    else {
        return Err(checker.errors);
    };

    Ok(AccumulationParameters {
        current_year,
        initial,
        monthly_investment_jpy,
        years: years as u32,
        price_model: raw.price_model,
        exchange_rate,
        inflation_rate: inflation / 100.0,
    })
}

pub fn validate_withdrawal(
    raw: &RawWithdrawalInputs,
    current_year: i32,
) -> Result<WithdrawalParameters, FieldErrors> {
    let mut checker = Checker::default();

    let initial_btc = checker.non_negative(Field::InitialBtc, &raw.initial_btc);
    let start_year = checker
        .whole_in_range(
            Field::StartYear,
            &raw.start_year,
            i64::from(current_year),
            i64::from(HORIZON_END_YEAR),
        )
        .map(|year| year as i32);
    let first_rule = checker.rule(
        raw.withdrawal_mode,
        (Field::WithdrawalAmount, raw.withdrawal_amount.as_str()),
        (Field::WithdrawalRate, raw.withdrawal_rate.as_str()),
    );

    let second_phase = if raw.second_phase_enabled {
        let year = checker
            .whole_number(Field::SecondPhaseYear, &raw.second_phase_year)
            .and_then(|year| checker.second_phase_year(year, start_year));
        let rule = checker.rule(
            raw.second_phase_mode,
            (Field::SecondPhaseAmount, raw.second_phase_amount.as_str()),
            (Field::SecondPhaseRate, raw.second_phase_rate.as_str()),
        );
        Some((year, rule))
    } else {
        None
    };

    let tax_rate = checker.percent(Field::TaxRate, &raw.tax_rate);
    let exchange_rate = checker.positive(Field::ExchangeRate, &raw.exchange_rate);
    let inflation_rate = checker.percent(Field::InflationRate, &raw.inflation_rate);

    let (
        Some(initial_btc),
        Some(start_year),
        Some(first_rule),
        Some(tax_rate),
        Some(exchange_rate),
        Some(inflation_rate),
    ) = (
        initial_btc,
        start_year,
        first_rule,
        tax_rate,
        exchange_rate,
        inflation_rate,
    )
    else {
        return Err(checker.errors);
    };

    let mut phases = vec![WithdrawalPhase {
        start_year,
        rule: first_rule,
    }];
    match second_phase {
        Some((Some(year), Some(rule))) => phases.push(WithdrawalPhase {
            start_year: year,
            rule,
        }),
        Some(_) => return Err(checker.errors),
        None => {}
    }

    let schedule = match WithdrawalSchedule::new(phases) {
        Ok(schedule) => schedule,
        Err(err) => {
            checker.errors.insert(Field::SecondPhaseYear, err.to_string());
            return Err(checker.errors);
        }
    };

    Ok(WithdrawalParameters {
        current_year,
        initial_btc,
        start_year,
        schedule,
        price_model: raw.price_model,
        tax_rate: tax_rate / 100.0,
        exchange_rate,
        inflation_rate: inflation_rate / 100.0,
    })
}

#[derive(Default)]
struct Checker {
    errors: FieldErrors,
}

impl Checker {
    fn number(&mut self, field: Field, raw: &str) -> Option<f64> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.errors.insert(field, "This field is required");
            return None;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                self.errors.insert(field, "Enter a valid number");
                None
            }
        }
    }

    fn non_negative(&mut self, field: Field, raw: &str) -> Option<f64> {
        let value = self.number(field, raw)?;
        if value < 0.0 {
            self.errors.insert(field, "Must be 0 or greater");
            return None;
        }
        Some(value)
    }

    fn positive(&mut self, field: Field, raw: &str) -> Option<f64> {
        let value = self.number(field, raw)?;
        if value <= 0.0 {
            self.errors.insert(field, "Must be greater than 0");
            return None;
        }
        Some(value)
    }

    fn percent(&mut self, field: Field, raw: &str) -> Option<f64> {
        let value = self.number(field, raw)?;
        if !(0.0..=100.0).contains(&value) {
            self.errors.insert(field, "Must be between 0 and 100");
            return None;
        }
        Some(value)
    }

    fn whole_number(&mut self, field: Field, raw: &str) -> Option<i64> {
        let value = self.number(field, raw)?;
        if value.fract() != 0.0 || value.abs() > i32::MAX as f64 {
            self.errors.insert(field, "Must be a whole number");
            return None;
        }
        Some(value as i64)
    }

    fn whole_in_range(&mut self, field: Field, raw: &str, min: i64, max: i64) -> Option<i64> {
        let value = self.whole_number(field, raw)?;
        if !(min..=max).contains(&value) {
            self.errors
                .insert(field, format!("Must be between {min} and {max}"));
            return None;
        }
        Some(value)
    }

    fn second_phase_year(&mut self, year: i64, start_year: Option<i32>) -> Option<i32> {
        if year > i64::from(HORIZON_END_YEAR) {
            self.errors.insert(
                Field::SecondPhaseYear,
                format!("Must be {HORIZON_END_YEAR} or earlier"),
            );
            return None;
        }
        // Without a valid start year the ordering check has nothing to compare against.
        let start_year = start_year?;
        if year <= i64::from(start_year) {
            self.errors.insert(
                Field::SecondPhaseYear,
                format!("Must be later than the start year ({start_year})"),
            );
            return None;
        }
        Some(year as i32)
    }

    fn rule(
        &mut self,
        mode: WithdrawalMode,
        amount: (Field, &str),
        rate: (Field, &str),
    ) -> Option<WithdrawalRule> {
        match mode {
            WithdrawalMode::Fixed => self
                .non_negative(amount.0, amount.1)
                .map(|monthly_amount_jpy| WithdrawalRule::Fixed { monthly_amount_jpy }),
            WithdrawalMode::Percentage => {
                self.percent(rate.0, rate.1)
                    .map(|annual_rate_percent| WithdrawalRule::Percentage {
                        annual_rate_percent,
                    })
            }
        }
    }
}
