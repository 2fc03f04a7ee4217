use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// Last calendar year covered by every projection.
pub const HORIZON_END_YEAR: i32 = 2050;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceModelVariant {
    #[default]
    Standard,
    Conservative,
}

impl PriceModelVariant {
    pub const ALL: [PriceModelVariant; 2] =
        [PriceModelVariant::Standard, PriceModelVariant::Conservative];

    /// USD price the variant reaches at the 2050 anchor.
    pub fn target_price_usd(self) -> f64 {
        match self {
            PriceModelVariant::Standard => 10_000_000.0,
            PriceModelVariant::Conservative => 4_000_000.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialInvestmentMode {
    #[default]
    Btc,
    Jpy,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalMode {
    #[default]
    Fixed,
    Percentage,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum InitialInvestment {
    Btc { holding_btc: f64 },
    Jpy { amount_jpy: f64 },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum WithdrawalRule {
    /// After-tax monthly spending in JPY, before inflation.
    Fixed { monthly_amount_jpy: f64 },
    Percentage { annual_rate_percent: f64 },
}

impl WithdrawalRule {
    pub fn mode(self) -> WithdrawalMode {
        match self {
            WithdrawalRule::Fixed { .. } => WithdrawalMode::Fixed,
            WithdrawalRule::Percentage { .. } => WithdrawalMode::Percentage,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WithdrawalPhase {
    pub start_year: i32,
    pub rule: WithdrawalRule,
}

/// Ordered withdrawal phases; each one stays active until the next one starts.
#[derive(Clone, Debug, PartialEq)]
pub struct WithdrawalSchedule {
    phases: Vec<WithdrawalPhase>,
}

impl WithdrawalSchedule {
    pub fn new(phases: Vec<WithdrawalPhase>) -> Result<Self, EngineError> {
        if phases.is_empty() {
            return Err(EngineError::EmptySchedule);
        }
        for pair in phases.windows(2) {
            if pair[1].start_year <= pair[0].start_year {
                return Err(EngineError::UnorderedPhases {
                    previous: pair[0].start_year,
                    next: pair[1].start_year,
                });
            }
        }
        Ok(Self { phases })
    }

    pub fn phases(&self) -> &[WithdrawalPhase] {
        &self.phases
    }

    /// Returns the 1-based phase number and descriptor in force for `year`.
    /// Years before the first phase resolve to the first phase.
    pub fn active_phase(&self, year: i32) -> (usize, &WithdrawalPhase) {
        let index = self
            .phases
            .iter()
            .rposition(|phase| phase.start_year <= year)
            .unwrap_or(0);
        (index + 1, &self.phases[index])
    }

    pub fn has_fixed_phase(&self) -> bool {
        self.phases
            .iter()
            .any(|phase| phase.rule.mode() == WithdrawalMode::Fixed)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AccumulationParameters {
    pub current_year: i32,
    pub initial: InitialInvestment,
    pub monthly_investment_jpy: f64,
    pub years: u32,
    pub price_model: PriceModelVariant,
    pub exchange_rate: f64,
    pub inflation_rate: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WithdrawalParameters {
    pub current_year: i32,
    pub initial_btc: f64,
    pub start_year: i32,
    pub schedule: WithdrawalSchedule,
    pub price_model: PriceModelVariant,
    pub tax_rate: f64,
    pub exchange_rate: f64,
    pub inflation_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyAccumulationRecord {
    pub year: i32,
    pub btc_price_jpy: f64,
    pub annual_investment_jpy: f64,
    pub btc_purchased: f64,
    pub btc_held_cumulative: f64,
    pub total_value_jpy: f64,
    pub is_investment_period: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum WithdrawalBasis {
    AnnualRatePercent(f64),
    MonthlyAmountJpy(f64),
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyWithdrawalRecord {
    pub year: i32,
    pub btc_price_jpy: f64,
    pub active_phase: usize,
    pub withdrawal_rate_or_amount: WithdrawalBasis,
    pub withdrawal_amount_jpy: f64,
    #[serde(rename = "withdrawalBTC")]
    pub withdrawal_btc: f64,
    #[serde(rename = "remainingBTC")]
    pub remaining_btc: f64,
    pub total_value_jpy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulationSummary {
    pub total_invested_jpy: f64,
    pub final_btc_held: f64,
    pub final_value_jpy: f64,
    pub last_investment_year: i32,
    pub multiple_on_invested: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalSummary {
    pub depletion_year: Option<i32>,
    pub years_sustained: Option<i32>,
    pub value_five_years_out: Option<f64>,
    pub total_withdrawn_jpy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub year: i32,
    pub days_since_genesis: f64,
    pub price_usd: f64,
    pub price_jpy: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(start_year: i32, monthly_amount_jpy: f64) -> WithdrawalPhase {
        WithdrawalPhase {
            start_year,
            rule: WithdrawalRule::Fixed { monthly_amount_jpy },
        }
    }

    fn percentage(start_year: i32, annual_rate_percent: f64) -> WithdrawalPhase {
        WithdrawalPhase {
            start_year,
            rule: WithdrawalRule::Percentage {
                annual_rate_percent,
            },
        }
    }

    #[test]
    fn schedule_rejects_empty_phase_list() {
        assert_eq!(
            WithdrawalSchedule::new(Vec::new()),
            Err(EngineError::EmptySchedule)
        );
    }

    #[test]
    fn schedule_rejects_phase_that_does_not_start_later() {
        let err = WithdrawalSchedule::new(vec![fixed(2030, 1.0), percentage(2030, 4.0)])
            .expect_err("same start year must be rejected");
        assert_eq!(
            err,
            EngineError::UnorderedPhases {
                previous: 2030,
                next: 2030
            }
        );
    }

    #[test]
    fn active_phase_switches_exactly_at_second_start_year() {
        let schedule =
            WithdrawalSchedule::new(vec![fixed(2026, 100_000.0), percentage(2030, 4.0)])
                .expect("valid schedule");

        assert_eq!(schedule.active_phase(2026).0, 1);
        assert_eq!(schedule.active_phase(2029).0, 1);
        assert_eq!(schedule.active_phase(2030).0, 2);
        assert_eq!(schedule.active_phase(2050).0, 2);
        assert_eq!(
            schedule.active_phase(2031).1.rule.mode(),
            WithdrawalMode::Percentage
        );
    }

    #[test]
    fn third_phase_is_resolved_without_special_casing() {
        let schedule = WithdrawalSchedule::new(vec![
            fixed(2026, 100_000.0),
            percentage(2030, 4.0),
            fixed(2040, 50_000.0),
        ])
        .expect("valid schedule");

        assert_eq!(schedule.active_phase(2039).0, 2);
        assert_eq!(schedule.active_phase(2040).0, 3);
        assert!(schedule.has_fixed_phase());
    }

    #[test]
    fn withdrawal_basis_serializes_as_tagged_value() {
        let rate = serde_json::to_string(&WithdrawalBasis::AnnualRatePercent(4.0))
            .expect("basis should serialize");
        let none =
            serde_json::to_string(&WithdrawalBasis::NotApplicable).expect("basis should serialize");

        assert_eq!(rate, r#"{"kind":"annualRatePercent","value":4.0}"#);
        assert_eq!(none, r#"{"kind":"notApplicable"}"#);
    }

    #[test]
    fn withdrawal_record_uses_btc_suffix_field_names() {
        let record = YearlyWithdrawalRecord {
            year: 2030,
            btc_price_jpy: 1.0,
            active_phase: 1,
            withdrawal_rate_or_amount: WithdrawalBasis::NotApplicable,
            withdrawal_amount_jpy: 0.0,
            withdrawal_btc: 0.0,
            remaining_btc: 0.0,
            total_value_jpy: 0.0,
        };
        let json = serde_json::to_string(&record).expect("record should serialize");

        assert!(json.contains("\"withdrawalBTC\""));
        assert!(json.contains("\"remainingBTC\""));
        assert!(json.contains("\"activePhase\""));
        assert!(json.contains("\"withdrawalRateOrAmount\""));
    }
}
