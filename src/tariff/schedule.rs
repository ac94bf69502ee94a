use chrono::{DateTime, MappedLocalTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    error::TariffError,
    ops::Interval,
    prelude::*,
    quantity::{cost::Cost, currency::Currency, price::KilowattHourPrice},
    tariff::{DayTimeline, RateBand, RateBoundary},
};

/// Tariff definition as supplied by the data fetch collaborator.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSchedule {
    #[serde(default)]
    pub code: Option<String>,

    /// Zone of the band times of day and the effective dates.
    pub timezone: Tz,

    pub periods: Vec<RawPeriod>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPeriod {
    /// Inclusive.
    pub effective_from: NaiveDate,

    /// Exclusive, open-ended when absent.
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,

    /// Fixed charge per local day, in the currency of the bands.
    #[serde(default)]
    pub standing_charge: Cost,

    pub bands: Vec<RateBand>,
}

#[derive(Clone, Debug)]
pub struct EffectivePeriod {
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub standing_charge: Cost,
    pub timeline: DayTimeline,
}

impl EffectivePeriod {
    fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.is_none_or(|to| date < to)
    }
}

/// Validated, queryable time-of-use schedule.
///
/// At most one period is effective on any local date, and every period covers the whole day.
#[derive(Clone, Debug)]
pub struct TariffSchedule {
    code: Option<String>,
    timezone: Tz,
    currency: Currency,

    /// Sorted by the effective date.
    periods: Vec<EffectivePeriod>,
}

/// Position of an instant in the schedule: local date, effective period, and half-band.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Cursor {
    date: NaiveDate,
    period: usize,
    segment: usize,
}

impl TryFrom<RawSchedule> for TariffSchedule {
    type Error = TariffError;

    fn try_from(raw: RawSchedule) -> Result<Self, Self::Error> {
        let periods = raw
            .periods
            .into_iter()
            .sorted_by_key(|period| period.effective_from)
            .map(|period| {
                if period.effective_to.is_some_and(|to| to <= period.effective_from) {
                    return Err(TariffError::Malformed(format!(
                        "period effective from {} ends before it starts",
                        period.effective_from,
                    )));
                }
                if period.standing_charge.is_sign_negative() {
                    return Err(TariffError::Malformed(format!(
                        "period effective from {} has a negative standing charge",
                        period.effective_from,
                    )));
                }
                Ok(EffectivePeriod {
                    effective_from: period.effective_from,
                    effective_to: period.effective_to,
                    standing_charge: period.standing_charge,
                    timeline: DayTimeline::try_new(period.effective_from, period.bands)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (previous, next) in periods.iter().tuple_windows() {
            if previous.effective_to.is_none_or(|to| to > next.effective_from) {
                return Err(TariffError::EffectiveOverlap { date: next.effective_from });
            }
        }

        let currency = periods.first().ok_or(TariffError::NoPeriods)?.timeline.currency();
        if let Some(period) = periods.iter().find(|period| period.timeline.currency() != currency) {
            return Err(TariffError::MixedCurrencies {
                expected: currency,
                actual: period.timeline.currency(),
            });
        }

        Ok(Self { code: raw.code, timezone: raw.timezone, currency, periods })
    }
}

impl TariffSchedule {
    /// Parse and validate the JSON tariff definition.
    #[instrument(skip_all)]
    pub fn from_json(json: &str) -> Result<Self, TariffError> {
        let raw: RawSchedule = serde_json::from_str(json)?;
        let this = Self::try_from(raw)?;
        debug!(code = ?this.code, n_periods = this.periods.len(), "validated the schedule");
        Ok(this)
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    #[must_use]
    pub fn periods(&self) -> &[EffectivePeriod] {
        &self.periods
    }

    /// Period effective on the local date of the instant.
    pub fn period_at(&self, instant: DateTime<Utc>) -> Result<&EffectivePeriod, TariffError> {
        let cursor = self.cursor_at(instant)?;
        Ok(&self.periods[cursor.period])
    }

    /// Highest band price effective at the instant, the reference for comparative cost.
    pub fn max_price_at(&self, instant: DateTime<Utc>) -> Result<KilowattHourPrice, TariffError> {
        let cursor = self.cursor_at(instant)?;
        Ok(self.periods[cursor.period].timeline.max_price())
    }

    /// Find the band active at the instant.
    pub fn resolve_band(&self, instant: DateTime<Utc>) -> Result<&RateBand, TariffError> {
        let cursor = self.cursor_at(instant)?;
        Ok(self.band(cursor))
    }

    /// Find the first instant after `instant` where the active band changes.
    ///
    /// Returns `None` when the schedule never changes the band again within its known horizon.
    pub fn next_boundary_after(
        &self,
        instant: DateTime<Utc>,
    ) -> Result<Option<RateBoundary>, TariffError> {
        let cursor = self.cursor_at(instant)?;
        Ok(self.next_change_after(cursor, instant).map(|(next, at)| RateBoundary {
            instant: at,
            from_band: self.band(cursor).clone(),
            to_band: self.band(next).clone(),
        }))
    }

    /// Split the range at every band boundary it crosses.
    ///
    /// The sub-ranges are contiguous, do not overlap, and their union is exactly the range.
    pub fn bands_overlapping(
        &self,
        range: Interval,
    ) -> Result<Vec<(Interval, &RateBand)>, TariffError> {
        let mut parts = Vec::new();
        let mut start = range.start;
        while start < range.end {
            let cursor = self.cursor_at(start)?;
            let end = match self.next_change_after(cursor, start) {
                Some((_, at)) => at.min(range.end),
                None => match self.coverage_end(cursor.period) {
                    Some(coverage_end) if coverage_end < range.end => {
                        return Err(TariffError::NotEffective { at: coverage_end });
                    }
                    _ => range.end,
                },
            };
            parts.push((Interval::new(start, end), self.band(cursor)));
            start = end;
        }
        Ok(parts)
    }

    /// Split the range into its non-empty parts covered by uninterrupted chains of effective periods.
    pub fn covered(&self, range: Interval) -> Vec<Interval> {
        let mut chains: Vec<(NaiveDate, Option<NaiveDate>)> = Vec::new();
        for period in &self.periods {
            match chains.last_mut() {
                Some((_, end)) if *end == Some(period.effective_from) => *end = period.effective_to,
                _ => chains.push((period.effective_from, period.effective_to)),
            }
        }
        chains
            .into_iter()
            .map(|(from, to)| {
                let start = range.start.max(self.localize(from, 0));
                let end = to.map_or(range.end, |to| range.end.min(self.localize(to, 0)));
                Interval::new(start, end)
            })
            .filter(|part| !part.is_empty())
            .collect()
    }

    /// Sum of the standing charges of the local days that start within the range.
    ///
    /// Days outside every effective period carry no charge.
    pub fn standing_charges(&self, range: Interval) -> Cost {
        range
            .start
            .with_timezone(&self.timezone)
            .date_naive()
            .iter_days()
            .map(|date| (date, self.localize(date, 0)))
            .skip_while(|(_, midnight)| *midnight < range.start)
            .take_while(|(_, midnight)| *midnight < range.end)
            .filter_map(|(date, _)| self.period_on(date))
            .map(|period| self.periods[period].standing_charge)
            .sum()
    }

    fn cursor_at(&self, instant: DateTime<Utc>) -> Result<Cursor, TariffError> {
        let local = instant.with_timezone(&self.timezone);
        let date = local.date_naive();
        let period = self.period_on(date).ok_or(TariffError::NotEffective { at: instant })?;
        let segment = self.periods[period].timeline.segment_at(local.num_seconds_from_midnight());
        Ok(Cursor { date, period, segment })
    }

    fn period_on(&self, date: NaiveDate) -> Option<usize> {
        let index = self.periods.partition_point(|period| period.effective_from <= date);
        let index = index.checked_sub(1)?;
        self.periods[index].is_effective_on(date).then_some(index)
    }

    fn band(&self, cursor: Cursor) -> &RateBand {
        self.periods[cursor.period].timeline.segment_band(cursor.segment)
    }

    fn segment_start(&self, cursor: Cursor) -> DateTime<Utc> {
        let (start, _) = self.periods[cursor.period].timeline.segment_bounds(cursor.segment);
        self.localize(cursor.date, start)
    }

    /// Find the first band change that maps to an instant strictly after `instant`.
    ///
    /// Local time folds may map a later half-band onto an earlier instant, those are skipped.
    fn next_change_after(&self, cursor: Cursor, instant: DateTime<Utc>) -> Option<(Cursor, DateTime<Utc>)> {
        let mut next = self.next_change(cursor)?;
        loop {
            let at = self.segment_start(next);
            if at > instant {
                return Some((next, at));
            }
            next = self.next_change(next)?;
        }
    }

    /// Step to the next half-band, crossing into the next local date when needed.
    fn advance(&self, cursor: Cursor) -> Option<Cursor> {
        if cursor.segment + 1 < self.periods[cursor.period].timeline.n_segments() {
            Some(Cursor { segment: cursor.segment + 1, ..cursor })
        } else {
            let date = cursor.date.succ_opt()?;
            Some(Cursor { date, period: self.period_on(date)?, segment: 0 })
        }
    }

    /// Find the first following half-band that belongs to a different logical band.
    fn next_change(&self, from: Cursor) -> Option<Cursor> {
        let is_same_band = |next: Cursor| {
            next.period == from.period
                && self.periods[next.period].timeline.segment_band_index(next.segment)
                    == self.periods[from.period].timeline.segment_band_index(from.segment)
                || self.band(next) == self.band(from)
        };

        let mut cursor = from;
        let mut n_scanned = 0;
        loop {
            let next = if n_scanned > self.periods[cursor.period].timeline.n_segments() {
                // A full day went by without a change: only the next period can bring one.
                let date = self.periods[cursor.period].effective_to?;
                n_scanned = 0;
                Cursor { date, period: self.period_on(date)?, segment: 0 }
            } else {
                self.advance(cursor)?
            };
            if !is_same_band(next) {
                return Some(next);
            }
            if next.period != cursor.period {
                n_scanned = 0;
            }
            n_scanned += 1;
            cursor = next;
        }
    }

    /// End of the uninterrupted chain of effective periods starting with the given one.
    fn coverage_end(&self, period: usize) -> Option<DateTime<Utc>> {
        let mut end = self.periods[period].effective_to?;
        for next in &self.periods[period + 1..] {
            if next.effective_from != end {
                break;
            }
            end = next.effective_to?;
        }
        Some(self.localize(end, 0))
    }

    /// Convert a local date and offset from midnight to an instant.
    ///
    /// Ambiguous local times take the earlier instant, and non-existent ones move forward
    /// to the first instant that exists.
    fn localize(&self, date: NaiveDate, seconds: u32) -> DateTime<Utc> {
        let naive = date.and_time(chrono::NaiveTime::MIN) + TimeDelta::seconds(i64::from(seconds));
        localize(self.timezone, naive)
    }
}

pub(crate) fn localize(timezone: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    for shift in (0..=24 * 4).map(|quarters| TimeDelta::minutes(15 * quarters)) {
        match timezone.from_local_datetime(&(naive + shift)) {
            MappedLocalTime::Single(instant) | MappedLocalTime::Ambiguous(instant, _) => {
                return instant.to_utc();
            }
            MappedLocalTime::None => {}
        }
    }
    warn!(?naive, %timezone, "local time does not exist, falling back to UTC");
    naive.and_utc()
}
