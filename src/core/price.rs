//! Power-law BTC/USD price model.
//!
//! `log10(price)` is affine in `log10(days since genesis)`. Each variant is pinned
//! by two anchors: the present-day reference price and its own 2050 target.

use super::error::EngineError;
use super::types::{HORIZON_END_YEAR, PriceModelVariant, PricePoint};

pub const GENESIS_YEAR: i32 = 2009;
const GENESIS_DAY: u32 = 3;

const REFERENCE_YEAR: i32 = 2025;
const REFERENCE_PRICE_USD: f64 = 100_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLawModel {
    slope: f64,
    intercept: f64,
}

impl PowerLawModel {
    /// Solves slope and intercept from two `(days, price)` anchors.
    pub fn from_anchors(reference: (f64, f64), target: (f64, f64)) -> Result<Self, EngineError> {
        let (reference_days, reference_price) = reference;
        let (target_days, target_price) = target;
        let finite = [reference_days, reference_price, target_days, target_price]
            .iter()
            .all(|value| value.is_finite() && *value > 0.0);
        if !finite || target_days <= reference_days || target_price <= reference_price {
            return Err(EngineError::InvalidAnchors);
        }

        let slope = (target_price.log10() - reference_price.log10())
            / (target_days.log10() - reference_days.log10());
        let intercept = reference_price.log10() - slope * reference_days.log10();
        Ok(Self { slope, intercept })
    }

    pub fn for_variant(variant: PriceModelVariant) -> Result<Self, EngineError> {
        Self::from_anchors(
            (days_since_genesis(REFERENCE_YEAR)?, REFERENCE_PRICE_USD),
            (
                days_since_genesis(HORIZON_END_YEAR)?,
                variant.target_price_usd(),
            ),
        )
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn price_usd(&self, year: i32) -> Result<f64, EngineError> {
        let days = days_since_genesis(year)?;
        Ok(10f64.powf(self.intercept + self.slope * days.log10()))
    }
}

/// Days from the genesis block to the mid-point of `year`.
///
/// Counted with the Gregorian leap rule, so every `i32` year from genesis on is valid.
pub fn days_since_genesis(year: i32) -> Result<f64, EngineError> {
    if year < GENESIS_YEAR {
        return Err(EngineError::InvalidYear { year });
    }

    let year = i64::from(year);
    let genesis_year = i64::from(GENESIS_YEAR);
    // Genesis is January 3rd, two days into its year.
    let genesis_offset = i64::from(GENESIS_DAY) - 1;
    let days_to_year_start = 365 * (year - genesis_year)
        + leap_years_before(year)
        - leap_years_before(genesis_year)
        - genesis_offset;
    Ok(days_to_year_start as f64 + days_in_year(year) as f64 / 2.0)
}

/// Number of yearly records from `first_year` through the horizon.
pub(super) fn years_to_horizon(first_year: i32) -> Result<usize, EngineError> {
    if first_year < GENESIS_YEAR {
        return Err(EngineError::InvalidYear { year: first_year });
    }
    if first_year > HORIZON_END_YEAR {
        return Err(EngineError::EmptyHorizon { first_year });
    }
    usize::try_from(HORIZON_END_YEAR - first_year + 1)
        .map_err(|_| EngineError::EmptyHorizon { first_year })
}

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_year(year: i64) -> i64 {
    if is_leap_year(year) { 366 } else { 365 }
}

/// Leap years in `1..year`.
fn leap_years_before(year: i64) -> i64 {
    let last = year - 1;
    last / 4 - last / 100 + last / 400
}

/// Projected USD price for `year` under `variant`.
pub fn price(year: i32, variant: PriceModelVariant) -> Result<f64, EngineError> {
    PowerLawModel::for_variant(variant)?.price_usd(year)
}

/// One point per year of `from_year..=to_year`, which must lie within genesis..=2050.
pub fn price_curve(
    variant: PriceModelVariant,
    from_year: i32,
    to_year: i32,
    exchange_rate: f64,
) -> Result<Vec<PricePoint>, EngineError> {
    if from_year < GENESIS_YEAR {
        return Err(EngineError::InvalidYear { year: from_year });
    }
    if to_year > HORIZON_END_YEAR {
        return Err(EngineError::BeyondHorizon { year: to_year });
    }
    if from_year > to_year {
        return Err(EngineError::EmptyHorizon {
            first_year: from_year,
        });
    }

    let model = PowerLawModel::for_variant(variant)?;
    let span = usize::try_from(to_year - from_year + 1).unwrap_or_default();
    let mut points = Vec::with_capacity(span);
    for year in from_year..=to_year {
        let price_usd = model.price_usd(year)?;
        points.push(PricePoint {
            year,
            days_since_genesis: days_since_genesis(year)?,
            price_usd,
            price_jpy: price_usd * exchange_rate,
        });
    }
    Ok(points)
}
