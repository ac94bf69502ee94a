use chrono::{NaiveDate, NaiveTime};
use itertools::Itertools;

use crate::{
    error::TariffError,
    quantity::currency::Currency,
    tariff::{RateBand, band::SECONDS_PER_DAY},
};

/// One tariff day as a sorted, gap-free sequence of half-bands.
///
/// Wrapping bands occupy two half-bands that point at the same logical band.
#[derive(Clone, Debug)]
pub struct DayTimeline {
    bands: Vec<RateBand>,

    /// Half-band start offsets from local midnight, strictly increasing and starting at zero.
    starts: Vec<u32>,

    /// Index into [`DayTimeline::bands`] for each half-band.
    band_indices: Vec<usize>,
}

impl DayTimeline {
    /// Validate the bands for 24-hour coverage without overlaps.
    pub fn try_new(effective_from: NaiveDate, bands: Vec<RateBand>) -> Result<Self, TariffError> {
        let Some(currency) = bands.first().map(|band| band.currency) else {
            return Err(TariffError::EmptyPeriod { effective_from });
        };
        if let Some(band) = bands.iter().find(|band| band.currency != currency) {
            return Err(TariffError::MixedCurrencies { expected: currency, actual: band.currency });
        }

        let half_bands = bands
            .iter()
            .enumerate()
            .flat_map(|(index, band)| band.half_bands().map(move |(start, end)| (start, end, index)))
            .sorted_unstable()
            .collect_vec();

        let mut cursor = 0;
        for (start, end, _) in &half_bands {
            if *start > cursor {
                return Err(TariffError::ScheduleGap { effective_from, time: time_of_day(cursor) });
            }
            if *start < cursor {
                return Err(TariffError::ScheduleOverlap { effective_from, time: time_of_day(*start) });
            }
            cursor = *end;
        }
        if cursor < SECONDS_PER_DAY {
            return Err(TariffError::ScheduleGap { effective_from, time: time_of_day(cursor) });
        }

        let (starts, band_indices) =
            half_bands.into_iter().map(|(start, _, index)| (start, index)).unzip();
        Ok(Self { bands, starts, band_indices })
    }

    /// Logical bands in their input order.
    #[must_use]
    pub fn bands(&self) -> &[RateBand] {
        &self.bands
    }

    #[must_use]
    pub fn currency(&self) -> Currency {
        self.bands[0].currency
    }

    #[must_use]
    pub(crate) const fn n_segments(&self) -> usize {
        self.starts.len()
    }

    /// Find the half-band containing the offset from local midnight.
    #[must_use]
    pub(crate) fn segment_at(&self, seconds: u32) -> usize {
        // The first start is always zero, so the partition point is at least one.
        self.starts.partition_point(|start| *start <= seconds) - 1
    }

    /// Half-band `[start, end)` offsets from local midnight.
    #[must_use]
    pub(crate) fn segment_bounds(&self, segment: usize) -> (u32, u32) {
        let end = self.starts.get(segment + 1).copied().unwrap_or(SECONDS_PER_DAY);
        (self.starts[segment], end)
    }

    #[must_use]
    pub(crate) fn segment_band(&self, segment: usize) -> &RateBand {
        &self.bands[self.band_indices[segment]]
    }

    /// Logical band index of the half-band.
    #[must_use]
    pub(crate) fn segment_band_index(&self, segment: usize) -> usize {
        self.band_indices[segment]
    }

    /// Highest price of the day, used as the reference for savings.
    #[must_use]
    pub fn max_price(&self) -> crate::quantity::price::KilowattHourPrice {
        self.bands.iter().map(|band| band.price).max().unwrap_or_default()
    }
}

fn time_of_day(seconds: u32) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt(seconds % SECONDS_PER_DAY, 0).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{quantity::price::KilowattHourPrice, tariff::RateType};

    fn band(start: (u32, u32), end: (u32, u32), rate_type: RateType, price: i32) -> RateBand {
        RateBand {
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            rate_type,
            price: KilowattHourPrice::from(price),
            currency: Currency::Jpy,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn test_wraparound_split() -> Result<(), TariffError> {
        let timeline = DayTimeline::try_new(
            date(),
            vec![band((23, 0), (7, 0), RateType::OffPeak, 10), band((7, 0), (23, 0), RateType::Peak, 30)],
        )?;
        assert_eq!(timeline.bands().len(), 2);
        assert_eq!(timeline.n_segments(), 3);
        assert_eq!(timeline.segment_bounds(0), (0, 25_200));
        assert_eq!(timeline.segment_bounds(2), (82_800, SECONDS_PER_DAY));
        assert_eq!(timeline.segment_band(0).rate_type, RateType::OffPeak);
        assert_eq!(timeline.segment_band(1).rate_type, RateType::Peak);
        assert_eq!(timeline.segment_band_index(0), timeline.segment_band_index(2));
        assert_eq!(timeline.segment_at(0), 0);
        assert_eq!(timeline.segment_at(25_199), 0);
        assert_eq!(timeline.segment_at(25_200), 1);
        assert_eq!(timeline.segment_at(86_399), 2);
        assert_eq!(timeline.max_price(), KilowattHourPrice::from(30));
        Ok(())
    }

    #[test]
    fn test_gap() {
        let result = DayTimeline::try_new(
            date(),
            vec![band((23, 0), (7, 0), RateType::OffPeak, 10), band((8, 0), (23, 0), RateType::Peak, 30)],
        );
        assert_eq!(
            result.unwrap_err(),
            TariffError::ScheduleGap {
                effective_from: date(),
                time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            }
        );
    }

    #[test]
    fn test_gap_at_end_of_day() {
        let result = DayTimeline::try_new(
            date(),
            vec![band((0, 0), (7, 0), RateType::OffPeak, 10), band((7, 0), (22, 0), RateType::Peak, 30)],
        );
        assert!(result.unwrap_err().is_gap());
    }

    #[test]
    fn test_overlap() {
        let result = DayTimeline::try_new(
            date(),
            vec![band((23, 0), (7, 0), RateType::OffPeak, 10), band((6, 0), (23, 0), RateType::Peak, 30)],
        );
        assert_eq!(
            result.unwrap_err(),
            TariffError::ScheduleOverlap {
                effective_from: date(),
                time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            }
        );
    }

    #[test]
    fn test_empty() {
        assert_eq!(
            DayTimeline::try_new(date(), vec![]).unwrap_err(),
            TariffError::EmptyPeriod { effective_from: date() }
        );
    }

    #[test]
    fn test_mixed_currencies() {
        let mut peak = band((7, 0), (23, 0), RateType::Peak, 30);
        peak.currency = Currency::Gbp;
        let result = DayTimeline::try_new(date(), vec![band((23, 0), (7, 0), RateType::OffPeak, 10), peak]);
        assert_eq!(
            result.unwrap_err(),
            TariffError::MixedCurrencies { expected: Currency::Jpy, actual: Currency::Gbp }
        );
    }

    #[test]
    fn test_single_flat_band() -> Result<(), TariffError> {
        let timeline = DayTimeline::try_new(date(), vec![band((0, 0), (0, 0), RateType::Standard, 25)])?;
        assert_eq!(timeline.n_segments(), 1);
        assert_eq!(timeline.segment_bounds(0), (0, SECONDS_PER_DAY));
        Ok(())
    }
}
