//! Usage aggregation by rate band, with pro-rata apportionment of span readings.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Notice, TariffError},
    ops::Interval,
    prelude::*,
    quantity::{cost::Cost, currency::Currency, energy::KilowattHours},
    tariff::{RateBand, RateType, TariffSchedule},
};

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSample {
    /// Reading instant, or the start of the span for span readings.
    pub timestamp: DateTime<Utc>,

    #[serde(alias = "consumption")]
    pub quantity: KilowattHours,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meter_type: Option<MeterType>,

    /// Exclusive end of the span the reading covers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_end: Option<DateTime<Utc>>,
}

impl UsageSample {
    /// Samples without a meter type are electricity readings.
    #[must_use]
    pub fn meter_type(&self) -> MeterType {
        self.meter_type.unwrap_or(MeterType::Electricity)
    }

    fn span(&self) -> Option<Interval> {
        self.interval_end
            .map(|end| Interval::new(self.timestamp, end))
            .filter(|span| !span.is_empty())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterType {
    Electricity,
    Gas,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageAggregate {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub sample_count: usize,
    pub currency: Currency,
    pub total_kwh: KilowattHours,
    pub kwh_by_rate_type: BTreeMap<RateType, KilowattHours>,
    pub cost_by_rate_type: BTreeMap<RateType, Cost>,
    pub cost_total: Cost,

    /// The same usage priced at the highest band of each tariff day.
    pub comparison_cost: Cost,

    pub savings: Cost,

    /// Standing charges of the local days that start within the period, not part of `cost_total`.
    pub standing_charges: Cost,

    #[serde(skip)]
    pub notice: Option<Notice>,
}

impl UsageAggregate {
    fn empty(period: Interval, currency: Currency) -> Self {
        Self {
            period_start: period.start,
            period_end: period.end,
            sample_count: 0,
            currency,
            total_kwh: KilowattHours::ZERO,
            kwh_by_rate_type: BTreeMap::new(),
            cost_by_rate_type: BTreeMap::new(),
            cost_total: Cost::ZERO,
            comparison_cost: Cost::ZERO,
            savings: Cost::ZERO,
            standing_charges: Cost::ZERO,
            notice: None,
        }
    }

    /// Energy cost together with the standing charges.
    pub fn bill_total(&self) -> Cost {
        self.cost_total + self.standing_charges
    }

    fn add(&mut self, band: &RateBand, kwh: KilowattHours, max_price_cost: Cost) {
        let cost = kwh * band.price;
        *self.kwh_by_rate_type.entry(band.rate_type).or_default() += kwh;
        *self.cost_by_rate_type.entry(band.rate_type).or_default() += cost;
        self.cost_total += cost;
        self.comparison_cost += max_price_cost;
    }
}

/// Samples of the meter type by timestamp, the last one in input order winning.
fn deduplicate(
    samples: &[UsageSample],
    period: Interval,
    meter_type: MeterType,
) -> BTreeMap<DateTime<Utc>, &UsageSample> {
    samples
        .iter()
        .filter(|sample| sample.meter_type() == meter_type && period.contains(sample.timestamp))
        .map(|sample| (sample.timestamp, sample))
        .collect()
}

/// Aggregate the electricity samples whose timestamp falls into the period.
///
/// Instantaneous samples go to the band active at their timestamp. Span samples are split
/// over the bands they cross in proportion to time, the last part taking the remainder.
#[instrument(skip_all, fields(period = ?period, n_samples = samples.len()))]
pub fn aggregate(
    samples: &[UsageSample],
    period: Interval,
    schedule: &TariffSchedule,
) -> Result<UsageAggregate, TariffError> {
    let mut aggregate = UsageAggregate::empty(period, schedule.currency());
    let samples = deduplicate(samples, period, MeterType::Electricity);

    for sample in samples.values() {
        aggregate.sample_count += 1;
        aggregate.total_kwh += sample.quantity;
        for (at, band, kwh) in apportion(sample, schedule)? {
            let max_price_cost = kwh * schedule.max_price_at(at)?;
            aggregate.add(band, kwh, max_price_cost);
        }
    }
    aggregate.savings = aggregate.comparison_cost - aggregate.cost_total;
    aggregate.standing_charges = schedule.standing_charges(period);

    if aggregate.sample_count == 0 {
        warn!(?period, "no usage samples in the period");
        aggregate.notice =
            Some(Notice::InsufficientData { period_start: period.start, period_end: period.end });
    } else {
        debug!(
            sample_count = aggregate.sample_count,
            total_kwh = %aggregate.total_kwh,
            cost_total = %aggregate.cost_total,
            "aggregated",
        );
    }
    Ok(aggregate)
}

/// Split the sample into `(part start, band, energy)` parts that sum exactly to the sample.
fn apportion<'s>(
    sample: &UsageSample,
    schedule: &'s TariffSchedule,
) -> Result<Vec<(DateTime<Utc>, &'s RateBand, KilowattHours)>, TariffError> {
    let Some(span) = sample.span() else {
        return Ok(vec![(sample.timestamp, schedule.resolve_band(sample.timestamp)?, sample.quantity)]);
    };
    let parts = schedule.bands_overlapping(span)?;
    let total_seconds = Decimal::from(span.duration().num_seconds());
    let mut remainder = sample.quantity;
    let mut apportioned = Vec::with_capacity(parts.len());
    for (index, (range, band)) in parts.iter().enumerate() {
        let kwh = if index + 1 == parts.len() {
            remainder
        } else {
            sample.quantity * Decimal::from(range.duration().num_seconds()) / total_seconds
        };
        remainder -= kwh;
        apportioned.push((range.start, *band, kwh));
    }
    Ok(apportioned)
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub kwh: KilowattHours,
}

/// Total energy of the meter type per local date of the sample timestamps, in date order.
pub fn daily_usage(
    samples: &[UsageSample],
    period: Interval,
    timezone: Tz,
    meter_type: MeterType,
) -> Vec<DailyUsage> {
    let mut days = BTreeMap::<NaiveDate, KilowattHours>::new();
    for (timestamp, sample) in deduplicate(samples, period, meter_type) {
        *days.entry(timestamp.with_timezone(&timezone).date_naive()).or_default() += sample.quantity;
    }
    days.into_iter().map(|(date, kwh)| DailyUsage { date, kwh }).collect()
}

/// Electricity per local hour of the day.
///
/// On the day clocks go back, both occurrences of the repeated hour land in the same slot.
pub fn hourly_profile(samples: &[UsageSample], day: NaiveDate, timezone: Tz) -> [KilowattHours; 24] {
    let mut profile = [KilowattHours::ZERO; 24];
    let everything = Interval::new(DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC);
    for (timestamp, sample) in deduplicate(samples, everything, MeterType::Electricity) {
        let local = timestamp.with_timezone(&timezone);
        if local.date_naive() == day {
            profile[local.hour() as usize] += sample.quantity;
        }
    }
    profile
}
