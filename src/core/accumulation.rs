use tracing::debug;

use super::error::EngineError;
use super::price::{PowerLawModel, years_to_horizon};
use super::types::{
    AccumulationParameters, AccumulationSummary, HORIZON_END_YEAR, InitialInvestment,
    YearlyAccumulationRecord,
};

/// Projects a recurring-purchase plan from the current year through the horizon.
///
/// Purchases happen while `year - current_year < years`; afterwards the holding
/// only coasts on price appreciation.
pub fn run_accumulation(
    params: &AccumulationParameters,
) -> Result<Vec<YearlyAccumulationRecord>, EngineError> {
    let horizon_years = years_to_horizon(params.current_year)?;
    let model = PowerLawModel::for_variant(params.price_model)?;
    let first_price_jpy = model.price_usd(params.current_year)? * params.exchange_rate;
    let mut btc_held = opening_btc(params.initial, first_price_jpy);

    let mut records = Vec::with_capacity(horizon_years);
    for year in params.current_year..=HORIZON_END_YEAR {
        let years_since_start = (year - params.current_year) as u32;
        let btc_price_jpy = model.price_usd(year)? * params.exchange_rate;
        let is_investment_period = years_since_start < params.years;

        let annual_investment_jpy = if is_investment_period {
            annual_contribution(params, years_since_start)
        } else {
            0.0
        };
        let btc_purchased = annual_investment_jpy / btc_price_jpy;
        btc_held += btc_purchased;

        records.push(YearlyAccumulationRecord {
            year,
            btc_price_jpy,
            annual_investment_jpy,
            btc_purchased,
            btc_held_cumulative: btc_held,
            total_value_jpy: btc_held * btc_price_jpy,
            is_investment_period,
        });
    }

    debug!(
        first_year = params.current_year,
        years = params.years,
        model = ?params.price_model,
        records = records.len(),
        "accumulation projection complete"
    );
    Ok(records)
}

pub fn summarize_accumulation(
    params: &AccumulationParameters,
    records: &[YearlyAccumulationRecord],
) -> AccumulationSummary {
    let initial_jpy = match params.initial {
        InitialInvestment::Jpy { amount_jpy } => amount_jpy,
        InitialInvestment::Btc { .. } => 0.0,
    };
    let total_invested_jpy = initial_jpy
        + records
            .iter()
            .map(|record| record.annual_investment_jpy)
            .sum::<f64>();
    let (final_btc_held, final_value_jpy) = records
        .last()
        .map(|record| (record.btc_held_cumulative, record.total_value_jpy))
        .unwrap_or((0.0, 0.0));
    let last_investment_year = (params.current_year + params.years.max(1) as i32 - 1)
        .min(HORIZON_END_YEAR);

    AccumulationSummary {
        total_invested_jpy,
        final_btc_held,
        final_value_jpy,
        last_investment_year,
        multiple_on_invested: (total_invested_jpy > 0.0)
            .then(|| final_value_jpy / total_invested_jpy),
    }
}

fn opening_btc(initial: InitialInvestment, first_price_jpy: f64) -> f64 {
    match initial {
        InitialInvestment::Btc { holding_btc } => holding_btc,
        InitialInvestment::Jpy { amount_jpy } => amount_jpy / first_price_jpy,
    }
}

fn annual_contribution(params: &AccumulationParameters, years_since_start: u32) -> f64 {
    let inflation_multiplier = (1.0 + params.inflation_rate).powi(years_since_start as i32);
    params.monthly_investment_jpy * 12.0 * inflation_multiplier
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::price::price;
    use crate::core::types::PriceModelVariant;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    fn sample_params() -> AccumulationParameters {
        AccumulationParameters {
            current_year: 2026,
            initial: InitialInvestment::Btc { holding_btc: 0.0 },
            monthly_investment_jpy: 10_000.0,
            years: 10,
            price_model: PriceModelVariant::Standard,
            exchange_rate: 150.0,
            inflation_rate: 0.0,
        }
    }

    #[test]
    fn ten_year_plan_invests_then_coasts_to_2050() {
        let params = sample_params();
        let records = run_accumulation(&params).expect("valid params");

        assert_eq!(records.len(), 25);
        assert_eq!(records.first().map(|r| r.year), Some(2026));
        assert_eq!(records.last().map(|r| r.year), Some(2050));

        for record in &records {
            let investing = record.year <= 2035;
            assert_eq!(record.is_investment_period, investing, "year {}", record.year);
        }
        for pair in records.windows(2) {
            if pair[1].year <= 2035 {
                assert!(pair[1].btc_held_cumulative > pair[0].btc_held_cumulative);
            } else {
                assert_eq!(pair[1].btc_held_cumulative, pair[0].btc_held_cumulative);
                assert_eq!(pair[1].btc_purchased, 0.0);
                assert_eq!(pair[1].annual_investment_jpy, 0.0);
            }
        }
    }

    #[test]
    fn first_year_purchase_matches_hand_calculation() {
        let params = sample_params();
        let records = run_accumulation(&params).expect("valid params");

        let price_jpy = price(2026, PriceModelVariant::Standard).expect("valid year") * 150.0;
        assert_approx(records[0].btc_price_jpy, price_jpy);
        assert_approx(records[0].annual_investment_jpy, 120_000.0);
        assert_approx(records[0].btc_purchased, 120_000.0 / price_jpy);
        assert_approx(
            records[0].total_value_jpy,
            records[0].btc_held_cumulative * price_jpy,
        );
    }

    #[test]
    fn jpy_initial_investment_converts_at_first_year_price() {
        let mut params = sample_params();
        params.initial = InitialInvestment::Jpy {
            amount_jpy: 1_000_000.0,
        };
        params.monthly_investment_jpy = 0.0;

        let records = run_accumulation(&params).expect("valid params");
        let first_price = records[0].btc_price_jpy;

        assert_approx(records[0].btc_held_cumulative, 1_000_000.0 / first_price);
        assert_approx(records[0].total_value_jpy, 1_000_000.0);
        assert!(records.iter().all(|r| r.btc_purchased == 0.0));
    }

    #[test]
    fn btc_initial_holding_is_carried_into_first_year() {
        let mut params = sample_params();
        params.initial = InitialInvestment::Btc { holding_btc: 0.5 };

        let records = run_accumulation(&params).expect("valid params");
        assert_approx(
            records[0].btc_held_cumulative,
            0.5 + records[0].btc_purchased,
        );
    }

    #[test]
    fn inflation_compounds_contributions_from_start_year() {
        let mut params = sample_params();
        params.inflation_rate = 0.10;

        let records = run_accumulation(&params).expect("valid params");
        assert_approx(records[0].annual_investment_jpy, 120_000.0);
        assert_approx(records[1].annual_investment_jpy, 132_000.0);
        assert_approx(records[2].annual_investment_jpy, 145_200.0);
    }

    #[test]
    fn investment_period_longer_than_horizon_invests_every_year() {
        let mut params = sample_params();
        params.current_year = 2040;
        params.years = 26;

        let records = run_accumulation(&params).expect("valid params");
        assert_eq!(records.len(), 11);
        assert!(records.iter().all(|r| r.is_investment_period));

        let summary = summarize_accumulation(&params, &records);
        assert_eq!(summary.last_investment_year, 2050);
    }

    #[test]
    fn start_year_beyond_horizon_is_an_engine_error() {
        let mut params = sample_params();
        params.current_year = 2051;
        assert_eq!(
            run_accumulation(&params),
            Err(EngineError::EmptyHorizon { first_year: 2051 })
        );
    }

    #[test]
    fn start_year_before_genesis_is_an_engine_error() {
        let mut params = sample_params();
        params.current_year = i32::MIN;
        assert_eq!(
            run_accumulation(&params),
            Err(EngineError::InvalidYear { year: i32::MIN })
        );
    }

    #[test]
    fn summary_totals_contributions_and_final_value() {
        let mut params = sample_params();
        params.initial = InitialInvestment::Jpy {
            amount_jpy: 500_000.0,
        };

        let records = run_accumulation(&params).expect("valid params");
        let summary = summarize_accumulation(&params, &records);
        let last = records.last().expect("non-empty");

        assert_approx(summary.total_invested_jpy, 500_000.0 + 10.0 * 120_000.0);
        assert_approx(summary.final_btc_held, last.btc_held_cumulative);
        assert_approx(summary.final_value_jpy, last.total_value_jpy);
        assert_eq!(summary.last_investment_year, 2035);
        let multiple = summary.multiple_on_invested.expect("invested something");
        assert_approx(multiple, last.total_value_jpy / summary.total_invested_jpy);
    }

    #[test]
    fn summary_has_no_multiple_without_jpy_invested() {
        let mut params = sample_params();
        params.initial = InitialInvestment::Btc { holding_btc: 1.0 };
        params.monthly_investment_jpy = 0.0;

        let records = run_accumulation(&params).expect("valid params");
        let summary = summarize_accumulation(&params, &records);
        assert_eq!(summary.multiple_on_invested, None);
        assert_approx(summary.final_btc_held, 1.0);
    }

    #[test]
    fn reruns_are_identical() {
        let params = sample_params();
        assert_eq!(run_accumulation(&params), run_accumulation(&params));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_holdings_grow_only_by_purchases(
            current_year in 2009i32..=2050,
            years in 1u32..=26,
            monthly in 0u32..1_000_000,
            holding_milli in 0u32..10_000,
            inflation_bp in 0u32..2_000,
            conservative in proptest::bool::ANY
        ) {
            let params = AccumulationParameters {
                current_year,
                initial: InitialInvestment::Btc { holding_btc: holding_milli as f64 / 1_000.0 },
                monthly_investment_jpy: monthly as f64,
                years,
                price_model: if conservative {
                    PriceModelVariant::Conservative
                } else {
                    PriceModelVariant::Standard
                },
                exchange_rate: 150.0,
                inflation_rate: inflation_bp as f64 / 10_000.0,
            };
            let records = run_accumulation(&params).expect("valid params");

            prop_assert!(!records.is_empty());
            prop_assert_eq!(records.len() as i32, HORIZON_END_YEAR - current_year + 1);

            let mut previous = params_opening(&params);
            for record in &records {
                let expected = previous + record.btc_purchased;
                prop_assert!((record.btc_held_cumulative - expected).abs() <= 1e-12 * expected.max(1.0));
                if !record.is_investment_period {
                    prop_assert_eq!(record.btc_purchased, 0.0);
                }
                prop_assert!(record.total_value_jpy >= 0.0);
                previous = record.btc_held_cumulative;
            }
        }
    }

    fn params_opening(params: &AccumulationParameters) -> f64 {
        match params.initial {
            InitialInvestment::Btc { holding_btc } => holding_btc,
            InitialInvestment::Jpy { .. } => unreachable!("property only uses BTC holdings"),
        }
    }
}
