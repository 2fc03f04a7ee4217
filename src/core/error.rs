use thiserror::Error;

/// Run-level failure reported once per simulation, separate from field errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("year {year} is before the Bitcoin genesis year")]
    InvalidYear { year: i32 },
    #[error("year {year} is past the 2050 projection horizon")]
    BeyondHorizon { year: i32 },
    #[error("price anchors must be increasing in both time and price")]
    InvalidAnchors,
    #[error("projection starting in {first_year} has no years before the horizon ends")]
    EmptyHorizon { first_year: i32 },
    #[error("withdrawal schedule needs at least one phase")]
    EmptySchedule,
    #[error("withdrawal phase starting in {next} must begin after the phase starting in {previous}")]
    UnorderedPhases { previous: i32, next: i32 },
    #[error("a tax rate of {tax_rate_percent}% leaves nothing to spend from a fixed withdrawal")]
    TaxRateConsumesWithdrawal { tax_rate_percent: f64 },
}
