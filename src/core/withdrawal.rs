use tracing::debug;

use super::error::EngineError;
use super::price::{PowerLawModel, years_to_horizon};
use super::types::{
    HORIZON_END_YEAR, WithdrawalBasis, WithdrawalParameters, WithdrawalRule, WithdrawalSummary,
    YearlyWithdrawalRecord,
};

/// Years after the current year at which the summary samples the holding value.
const SUMMARY_LOOKAHEAD_YEARS: i32 = 5;

struct RequestedWithdrawal {
    basis: WithdrawalBasis,
    amount_jpy: f64,
}

/// Projects scheduled withdrawals from the start year through the horizon.
///
/// A year that asks for more BTC than is left sells everything; the holding then
/// stays at zero and later years record no withdrawals.
pub fn run_withdrawal(
    params: &WithdrawalParameters,
) -> Result<Vec<YearlyWithdrawalRecord>, EngineError> {
    let horizon_years = years_to_horizon(params.start_year)?;

    let net_share = 1.0 - params.tax_rate;
    if params.schedule.has_fixed_phase() && net_share <= 0.0 {
        return Err(EngineError::TaxRateConsumesWithdrawal {
            tax_rate_percent: params.tax_rate * 100.0,
        });
    }

    let model = PowerLawModel::for_variant(params.price_model)?;
    let mut remaining_btc = params.initial_btc;
    let mut records = Vec::with_capacity(horizon_years);

    for year in params.start_year..=HORIZON_END_YEAR {
        let btc_price_jpy = model.price_usd(year)? * params.exchange_rate;
        let (active_phase, phase) = params.schedule.active_phase(year);

        if remaining_btc <= 0.0 {
            remaining_btc = 0.0;
            records.push(YearlyWithdrawalRecord {
                year,
                btc_price_jpy,
                active_phase,
                withdrawal_rate_or_amount: WithdrawalBasis::NotApplicable,
                withdrawal_amount_jpy: 0.0,
                withdrawal_btc: 0.0,
                remaining_btc,
                total_value_jpy: 0.0,
            });
            continue;
        }

        let years_since_start = (year - params.start_year) as u32;
        let requested = requested_withdrawal(
            params,
            phase.rule,
            remaining_btc,
            btc_price_jpy,
            years_since_start,
            net_share,
        );
        let requested_btc = requested.amount_jpy / btc_price_jpy;

        let (withdrawal_btc, withdrawal_amount_jpy) = if requested_btc >= remaining_btc {
            (remaining_btc, remaining_btc * btc_price_jpy)
        } else {
            (requested_btc, requested.amount_jpy)
        };
        remaining_btc = if requested_btc >= remaining_btc {
            0.0
        } else {
            remaining_btc - withdrawal_btc
        };

        records.push(YearlyWithdrawalRecord {
            year,
            btc_price_jpy,
            active_phase,
            withdrawal_rate_or_amount: requested.basis,
            withdrawal_amount_jpy,
            withdrawal_btc,
            remaining_btc,
            total_value_jpy: remaining_btc * btc_price_jpy,
        });
    }

    debug!(
        start_year = params.start_year,
        phases = params.schedule.phases().len(),
        model = ?params.price_model,
        depletion_year = ?depletion_year(&records),
        "withdrawal projection complete"
    );
    Ok(records)
}

/// First year whose closing balance is exhausted, if any.
pub fn depletion_year(records: &[YearlyWithdrawalRecord]) -> Option<i32> {
    records
        .iter()
        .find(|record| record.remaining_btc <= 0.0)
        .map(|record| record.year)
}

pub fn summarize_withdrawal(
    params: &WithdrawalParameters,
    records: &[YearlyWithdrawalRecord],
) -> WithdrawalSummary {
    let depletion_year = depletion_year(records);
    let lookahead_year = params.current_year + SUMMARY_LOOKAHEAD_YEARS;

    WithdrawalSummary {
        depletion_year,
        years_sustained: depletion_year.map(|year| year - params.start_year),
        value_five_years_out: records
            .iter()
            .find(|record| record.year == lookahead_year)
            .map(|record| record.total_value_jpy),
        total_withdrawn_jpy: records
            .iter()
            .map(|record| record.withdrawal_amount_jpy)
            .sum(),
    }
}

fn requested_withdrawal(
    params: &WithdrawalParameters,
    rule: WithdrawalRule,
    remaining_btc: f64,
    btc_price_jpy: f64,
    years_since_start: u32,
    net_share: f64,
) -> RequestedWithdrawal {
    match rule {
        WithdrawalRule::Fixed { monthly_amount_jpy } => {
            let monthly_net =
                monthly_amount_jpy * (1.0 + params.inflation_rate).powi(years_since_start as i32);
            let monthly_gross = monthly_net / net_share;
            RequestedWithdrawal {
                basis: WithdrawalBasis::MonthlyAmountJpy(monthly_net),
                amount_jpy: monthly_gross * 12.0,
            }
        }
        WithdrawalRule::Percentage {
            annual_rate_percent,
        } => RequestedWithdrawal {
            basis: WithdrawalBasis::AnnualRatePercent(annual_rate_percent),
            amount_jpy: remaining_btc * btc_price_jpy * (annual_rate_percent / 100.0),
        },
    }
}
