//! Current rate and the countdown to the next band change.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::{
    error::{Notice, TariffError},
    prelude::*,
    quantity::{cost::HourlyCost, power::Kilowatts, price::KilowattHourPrice},
    tariff::{RateBand, RateBoundary, TariffSchedule},
};

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentRate {
    pub band: RateBand,

    /// Absent when the band never changes within the published schedule.
    pub next_boundary: Option<RateBoundary>,

    /// Clamped to zero.
    #[serde(rename = "secondsUntilNextBoundary", with = "optional_seconds")]
    pub until_next_boundary: Option<TimeDelta>,

    #[serde(skip)]
    pub notice: Option<Notice>,
}

impl CurrentRate {
    #[must_use]
    pub const fn price(&self) -> KilowattHourPrice {
        self.band.price
    }

    /// Price of the band that starts at the next boundary.
    #[must_use]
    pub fn next_price(&self) -> Option<KilowattHourPrice> {
        self.next_boundary.as_ref().map(|boundary| boundary.to_band.price)
    }

    /// Cost of sustaining the power demand for one hour at the current price.
    pub fn cost_per_hour(&self, power: Kilowatts) -> HourlyCost {
        power * self.band.price
    }
}

/// Resolve the band active at `now` along with the next boundary.
#[instrument(skip_all, fields(now = %now))]
pub fn current_rate(schedule: &TariffSchedule, now: DateTime<Utc>) -> Result<CurrentRate, TariffError> {
    let band = schedule.resolve_band(now)?.clone();
    let next_boundary = schedule.next_boundary_after(now)?;
    let (until_next_boundary, notice) = match &next_boundary {
        Some(boundary) => {
            let (countdown, notice) = countdown(boundary.instant, now);
            (Some(countdown), notice)
        }
        None => (None, None),
    };
    debug!(rate_type = %band.rate_type, price = %band.price, ?until_next_boundary, "resolved");
    Ok(CurrentRate { band, next_boundary, until_next_boundary, notice })
}

/// Time left until `target`, clamped to zero with a [`Notice::ClockSkew`] when negative.
pub fn countdown(target: DateTime<Utc>, now: DateTime<Utc>) -> (TimeDelta, Option<Notice>) {
    let delta = target - now;
    if delta < TimeDelta::zero() {
        let skew_seconds = -delta.num_seconds();
        warn!(%target, %now, skew_seconds, "negative countdown, clamping to zero");
        (TimeDelta::zero(), Some(Notice::ClockSkew { skew_seconds }))
    } else {
        (delta, None)
    }
}

mod optional_seconds {
    use chrono::TimeDelta;
    use serde::Serializer;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<TimeDelta>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(delta) => serializer.serialize_some(&delta.num_seconds()),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::Tz;
    use rust_decimal::Decimal;

    use super::*;
    use crate::{quantity::cost::HourlyCost, tariff::RateType};

    fn schedule() -> TariffSchedule {
        TariffSchedule::from_json(
            r#"{
                "timezone": "Europe/London",
                "periods": [{
                    "effectiveFrom": "2025-01-01",
                    "bands": [
                        {"startTimeOfDay": "23:30", "endTimeOfDay": "05:30", "rateType": "off-peak", "pricePerUnit": 0.07, "currency": "GBP"},
                        {"startTimeOfDay": "05:30", "endTimeOfDay": "23:30", "rateType": "peak", "pricePerUnit": 0.30, "currency": "GBP"}
                    ]
                }]
            }"#,
        )
        .unwrap()
    }

    fn london(hour: u32, minute: u32) -> DateTime<Utc> {
        Tz::Europe__London.with_ymd_and_hms(2025, 2, 10, hour, minute, 0).unwrap().to_utc()
    }

    #[test]
    fn test_current_rate_off_peak() -> Result<(), TariffError> {
        let rate = current_rate(&schedule(), london(4, 0))?;
        assert_eq!(rate.band.rate_type, RateType::OffPeak);
        assert_eq!(rate.until_next_boundary, Some(TimeDelta::minutes(90)));
        assert_eq!(rate.next_price(), Some(KilowattHourPrice::from(Decimal::new(30, 2))));
        assert!(rate.notice.is_none());
        Ok(())
    }

    #[test]
    fn test_current_rate_at_boundary() -> Result<(), TariffError> {
        let rate = current_rate(&schedule(), london(5, 30))?;
        assert_eq!(rate.band.rate_type, RateType::Peak);
        assert_eq!(rate.next_boundary.unwrap().instant, london(23, 30));
        Ok(())
    }

    #[test]
    fn test_cost_per_hour() -> Result<(), TariffError> {
        let rate = current_rate(&schedule(), london(12, 0))?;
        assert_eq!(rate.cost_per_hour(Kilowatts::from_watts(2000)), HourlyCost::from(Decimal::new(60, 2)));
        Ok(())
    }

    #[test]
    fn test_countdown_clamps() {
        let (delta, notice) = countdown(london(12, 0), london(12, 1));
        assert_eq!(delta, TimeDelta::zero());
        assert_eq!(notice, Some(Notice::ClockSkew { skew_seconds: 60 }));
    }

    #[test]
    fn test_serialize_seconds() -> Result {
        let rate = current_rate(&schedule(), london(4, 0))?;
        let json = serde_json::to_value(&rate)?;
        assert_eq!(json["secondsUntilNextBoundary"], 5400);
        assert_eq!(json["nextBoundary"]["toBand"]["rateType"], "peak");
        Ok(())
    }
}
