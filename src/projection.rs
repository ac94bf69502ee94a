use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    ops::Interval,
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours},
    tariff::TariffSchedule,
    usage::UsageAggregate,
};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceBasis {
    pub days_elapsed: f64,
    pub days_in_period: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedCost {
    pub period_end: DateTime<Utc>,
    pub estimated_total: Cost,
    pub estimated_kwh: KilowattHours,

    /// Standing charges of the whole period, known in advance rather than extrapolated.
    pub standing_charges: Cost,

    pub confidence_basis: ConfidenceBasis,

    /// The period is over and the estimate is the actual total.
    pub is_final: bool,
}

impl ProjectedCost {
    /// Estimated energy cost together with the standing charges.
    pub fn estimated_bill(&self) -> Cost {
        self.estimated_total + self.standing_charges
    }
}

/// Linear extrapolation of the usage to date over the whole billing period.
#[derive(Copy, Clone, Debug, bon::Builder)]
pub struct Projector {
    /// Lower bound of the elapsed time, so that the first minutes of a period do not explode.
    #[builder(default = TimeDelta::hours(1))]
    min_elapsed: TimeDelta,
}

impl Default for Projector {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Projector {
    #[instrument(skip_all, fields(now = %now))]
    pub fn project(
        &self,
        to_date: &UsageAggregate,
        schedule: &TariffSchedule,
        period: Interval,
        now: DateTime<Utc>,
    ) -> ProjectedCost {
        let period_seconds = period.duration().num_seconds().max(0);
        let elapsed_seconds = (now - period.start).num_seconds().clamp(0, period_seconds);
        let days_elapsed = elapsed_seconds as f64 / SECONDS_PER_DAY;
        let confidence_basis =
            ConfidenceBasis { days_elapsed, days_in_period: period_seconds as f64 / SECONDS_PER_DAY };
        let standing_charges = schedule.standing_charges(period);

        if elapsed_seconds >= period_seconds {
            return ProjectedCost {
                period_end: period.end,
                estimated_total: to_date.cost_total,
                estimated_kwh: to_date.total_kwh,
                standing_charges,
                confidence_basis,
                is_final: true,
            };
        }

        let scale = Decimal::from(period_seconds)
            / Decimal::from(elapsed_seconds.max(self.min_elapsed.num_seconds()).max(1));
        let projection = ProjectedCost {
            period_end: period.end,
            estimated_total: to_date.cost_total * scale,
            estimated_kwh: to_date.total_kwh * scale,
            standing_charges,
            confidence_basis,
            is_final: false,
        };
        debug!(days_elapsed, estimated_total = %projection.estimated_total, "projected");
        projection
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    use super::*;
    use crate::quantity::currency::Currency;

    fn period() -> Interval {
        Interval::new(
            Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap(),
        )
    }

    fn schedule() -> TariffSchedule {
        TariffSchedule::from_json(
            r#"{"timezone": "UTC", "periods": [{"effectiveFrom": "2025-01-01", "standingCharge": 0.5, "bands": [{"startTimeOfDay": "00:00", "endTimeOfDay": "00:00", "rateType": "standard", "pricePerUnit": 1, "currency": "USD"}]}]}"#,
        )
        .unwrap()
    }

    fn to_date(cost: i32, kwh: i32) -> UsageAggregate {
        let samples = [crate::usage::UsageSample {
            timestamp: period().start,
            quantity: KilowattHours::from(kwh),
            meter_type: None,
            interval_end: None,
        }];
        let mut aggregate = crate::usage::aggregate(&samples, period(), &schedule()).unwrap();
        assert_eq!(aggregate.currency, Currency::Usd);
        aggregate.cost_total = Cost::from(cost);
        aggregate
    }

    #[test]
    fn test_linear_extrapolation() {
        let now = Utc.with_ymd_and_hms(2025, 4, 11, 0, 0, 0).unwrap();
        let projection = Projector::default().project(&to_date(100, 50), &schedule(), period(), now);
        assert_eq!(projection.estimated_total, Cost::from(300));
        assert_eq!(projection.standing_charges, Cost::from(15));
        assert_eq!(projection.estimated_bill(), Cost::from(315));
        assert_eq!(projection.estimated_kwh, KilowattHours::from(150));
        assert!(!projection.is_final);
        assert_abs_diff_eq!(projection.confidence_basis.days_elapsed, 10.0);
        assert_abs_diff_eq!(projection.confidence_basis.days_in_period, 30.0);
    }

    #[test]
    fn test_period_end_is_exact() {
        let aggregate = to_date(123, 7);
        let projection = Projector::default().project(&aggregate, &schedule(), period(), period().end);
        assert!(projection.is_final);
        assert_eq!(projection.estimated_total, aggregate.cost_total);
        assert_eq!(projection.estimated_bill(), aggregate.bill_total());
    }

    #[test]
    fn test_min_elapsed_clamp() {
        let now = period().start + TimeDelta::minutes(1);
        let projector = Projector::builder().min_elapsed(TimeDelta::hours(24)).build();
        let projection = projector.project(&to_date(1, 1), &schedule(), period(), now);
        assert_eq!(projection.estimated_total, Cost::from(30));
    }

    #[test]
    fn test_local_month_period() {
        let start = Tz::Asia__Tokyo.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap().to_utc();
        let end = Tz::Asia__Tokyo.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap().to_utc();
        let projection = Projector::default().project(&to_date(0, 0), &schedule(), Interval::new(start, end), start);
        assert_abs_diff_eq!(projection.confidence_basis.days_in_period, 28.0);
        assert_eq!(projection.estimated_total, Cost::ZERO);
    }
}
