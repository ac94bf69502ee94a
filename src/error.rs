use std::fmt::{Display, Formatter};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::quantity::currency::Currency;

/// Structural problems with tariff input. Fatal to the computation that hit them.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TariffError {
    #[error("no rate band covers {time} (effective {effective_from})")]
    ScheduleGap { effective_from: NaiveDate, time: NaiveTime },

    #[error("no tariff is effective at {at}")]
    NotEffective { at: DateTime<Utc> },

    #[error("rate bands overlap at {time} (effective {effective_from})")]
    ScheduleOverlap { effective_from: NaiveDate, time: NaiveTime },

    #[error("effective periods overlap on {date}")]
    EffectiveOverlap { date: NaiveDate },

    #[error("tariff period effective {effective_from} has no rate bands")]
    EmptyPeriod { effective_from: NaiveDate },

    #[error("tariff has no effective periods")]
    NoPeriods,

    #[error("tariff mixes currencies: {expected} and {actual}")]
    MixedCurrencies { expected: Currency, actual: Currency },

    #[error("malformed tariff: {0}")]
    Malformed(String),
}

impl TariffError {
    /// Whether the error is a coverage gap, as opposed to an overlap or a shape problem.
    #[must_use]
    pub const fn is_gap(&self) -> bool {
        matches!(self, Self::ScheduleGap { .. } | Self::NotEffective { .. })
    }

    #[must_use]
    pub const fn is_overlap(&self) -> bool {
        matches!(self, Self::ScheduleOverlap { .. } | Self::EffectiveOverlap { .. })
    }
}

impl From<serde_json::Error> for TariffError {
    fn from(error: serde_json::Error) -> Self {
        Self::Malformed(error.to_string())
    }
}

/// Context build stage that failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Rate,
    Windows,
    Usage,
    History,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Rate => "rate",
            Self::Windows => "windows",
            Self::Usage => "usage",
            Self::History => "history",
        })
    }
}

/// Every sub-computation that failed while building a context.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildError {
    pub failures: Vec<(Stage, TariffError)>,
}

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to build the context:")?;
        for (stage, error) in &self.failures {
            write!(f, " [{stage}] {error};")?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildError {}

/// Non-fatal conditions absorbed into neutral results.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Notice {
    /// No usage samples fell into the requested period.
    InsufficientData { period_start: DateTime<Utc>, period_end: DateTime<Utc> },

    /// A negative countdown was clamped to zero.
    ClockSkew { skew_seconds: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_error_lists_every_stage() {
        let error = BuildError {
            failures: vec![
                (Stage::Rate, TariffError::NoPeriods),
                (Stage::Usage, TariffError::Malformed("oops".to_owned())),
            ],
        };
        let message = error.to_string();
        assert!(message.contains("[rate] tariff has no effective periods"));
        assert!(message.contains("[usage] malformed tariff: oops"));
    }

    #[test]
    fn test_notice_serialization() {
        let json = serde_json::to_string(&Notice::ClockSkew { skew_seconds: 5 }).unwrap();
        assert_eq!(json, r#"{"kind":"clock-skew","skewSeconds":5}"#);
    }
}
