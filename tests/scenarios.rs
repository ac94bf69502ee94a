use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use itertools::Itertools;
use rust_decimal::Decimal;
use tariff_core::{
    context::{AssistantLimits, Context, ContextOptions},
    ops::Interval,
    prelude::*,
    projection::Projector,
    quantity::{cost::Cost, energy::KilowattHours},
    tariff::{RateType, TariffSchedule},
    usage::{UsageSample, aggregate},
    window::{DispatchEvent, DispatchKind, Provenance, WindowKind, WindowTracker},
};

fn schedule() -> TariffSchedule {
    TariffSchedule::from_json(include_str!("data/economy.json")).unwrap()
}

fn tokyo(month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Tz::Asia__Tokyo.with_ymd_and_hms(2025, month, day, hour, minute, 0).unwrap().to_utc()
}

fn sample(timestamp: DateTime<Utc>, kwh: KilowattHours) -> UsageSample {
    UsageSample { timestamp, quantity: kwh, meter_type: None, interval_end: None }
}

fn march_10() -> Interval {
    Interval::new(tokyo(3, 10, 0, 0), tokyo(3, 11, 0, 0))
}

#[test]
fn instantaneous_samples_cost_110_yen() -> Result {
    let samples =
        [sample(tokyo(3, 10, 2, 0), KilowattHours::from(2)), sample(tokyo(3, 10, 10, 0), KilowattHours::from(3))];
    let usage = aggregate(&samples, march_10(), &schedule())?;

    assert_eq!(usage.kwh_by_rate_type[&RateType::OffPeak], KilowattHours::from(2));
    assert_eq!(usage.cost_by_rate_type[&RateType::OffPeak], Cost::from(20));
    assert_eq!(usage.kwh_by_rate_type[&RateType::Peak], KilowattHours::from(3));
    assert_eq!(usage.cost_by_rate_type[&RateType::Peak], Cost::from(90));
    assert_eq!(usage.cost_total, Cost::from(110));
    assert_eq!(usage.currency.format(usage.cost_total), "¥110");
    Ok(())
}

#[test]
fn span_across_boundary_is_apportioned_without_residual() -> Result {
    let mut span = sample(tokyo(3, 10, 6, 59), KilowattHours::from(Decimal::new(1, 0)));
    span.interval_end = Some(tokyo(3, 10, 7, 1));
    let usage = aggregate(&[span], march_10(), &schedule())?;

    let half = KilowattHours::from(Decimal::new(5, 1));
    assert_eq!(usage.kwh_by_rate_type[&RateType::OffPeak], half);
    assert_eq!(usage.kwh_by_rate_type[&RateType::Peak], half);
    assert_eq!(usage.cost_total, Cost::from(20));
    assert_eq!(usage.cost_by_rate_type.values().copied().sum::<Cost>(), usage.cost_total);
    Ok(())
}

#[test]
fn band_split_sums_to_total() -> Result {
    let samples = (0..24 * 6)
        .map(|index| {
            let timestamp = tokyo(3, 10, 0, 0) + TimeDelta::minutes(10 * index);
            let mut sample = sample(timestamp, KilowattHours::from(Decimal::new(index % 7 + 1, 3)));
            sample.interval_end = Some(timestamp + TimeDelta::minutes(25));
            sample
        })
        .collect_vec();
    let usage = aggregate(&samples, march_10(), &schedule())?;
    let sum = usage.kwh_by_rate_type.values().copied().sum::<KilowattHours>();
    assert_eq!(sum, usage.total_kwh);
    Ok(())
}

#[test]
fn empty_sample_set_is_zero() -> Result {
    let usage = aggregate(&[], march_10(), &schedule())?;
    assert_eq!(usage.total_kwh, KilowattHours::ZERO);
    assert_eq!(usage.cost_total, Cost::ZERO);
    assert!(usage.notice.is_some());
    Ok(())
}

#[test]
fn projection_at_period_end_is_exact() -> Result {
    let period = Interval::new(tokyo(3, 1, 0, 0), tokyo(4, 1, 0, 0));
    let samples = [sample(tokyo(3, 10, 2, 0), KilowattHours::from(Decimal::new(1234, 3)))];
    let usage = aggregate(&samples, period, &schedule())?;
    let projection = Projector::default().project(&usage, &schedule(), period, period.end);
    assert_eq!(projection.estimated_total, usage.cost_total);
    assert!(projection.is_final);
    Ok(())
}

#[test]
fn ev_dispatch_inside_off_peak_yields_two_windows() -> Result {
    let schedule = schedule();
    let events = [DispatchEvent {
        start: tokyo(3, 11, 1, 0),
        end: Some(tokyo(3, 11, 3, 0)),
        kind: DispatchKind::EvCharging,
        actual_end: None,
        energy_kwh: None,
        code: None,
        reward_per_kwh: None,
    }];
    let tracker = WindowTracker::builder().schedule(&schedule).events(&events).build();
    let windows = tracker.active_windows(tokyo(3, 11, 2, 0))?;

    assert_eq!(windows.len(), 2);
    assert_eq!((windows[0].kind, windows[0].provenance), (WindowKind::EvCharging, Provenance::DispatchFeed));
    assert_eq!((windows[1].kind, windows[1].provenance), (WindowKind::OffPeak, Provenance::Schedule));
    Ok(())
}

#[test]
fn resolved_band_contains_the_instant() -> Result {
    let schedule = schedule();
    let mut instant = tokyo(5, 30, 0, 0);
    while instant < tokyo(6, 2, 0, 0) {
        let band = schedule.resolve_band(instant)?;
        assert!(band.contains_time(instant.with_timezone(&Tz::Asia__Tokyo).time()));
        instant += TimeDelta::minutes(13);
    }
    Ok(())
}

#[test]
fn sub_ranges_partition_the_range_across_a_tariff_change() -> Result {
    let schedule = schedule();
    let range = Interval::new(tokyo(5, 31, 12, 0), tokyo(6, 1, 12, 0));
    let parts = schedule.bands_overlapping(range)?;

    assert_eq!(parts.first().unwrap().0.start, range.start);
    assert_eq!(parts.last().unwrap().0.end, range.end);
    for ((left, _), (right, _)) in parts.iter().tuple_windows() {
        assert_eq!(left.end, right.start);
    }
    let prices = parts.iter().map(|(_, band)| band.price).collect_vec();
    assert_eq!(prices, [30, 10, 12, 32].map(tariff_core::quantity::price::KilowattHourPrice::from));
    Ok(())
}

#[test]
fn tariff_change_is_the_next_boundary_only_when_the_band_changes() -> Result {
    let schedule = schedule();
    let boundary = schedule.next_boundary_after(tokyo(5, 31, 23, 30))?.unwrap();
    assert_eq!(boundary.instant, tokyo(6, 1, 0, 0));
    assert_eq!(boundary.from_band.rate_type, RateType::OffPeak);
    assert_eq!(boundary.to_band.rate_type, RateType::OffPeak);
    Ok(())
}

#[test]
fn context_serialization_is_byte_identical() -> Result {
    let schedule = schedule();
    let samples = (0..200)
        .map(|index| sample(tokyo(3, 1, 0, 0) + TimeDelta::minutes(97 * index), KilowattHours::from(Decimal::new(index, 2))))
        .collect_vec();
    let now = tokyo(3, 12, 18, 45);
    let build = || Context::build(now, &schedule, &samples, &[], &ContextOptions::default());

    let (first, second) = (build()?, build()?);
    assert_eq!(serde_json::to_string(&first)?, serde_json::to_string(&second)?);
    let limits = AssistantLimits::default();
    let assistant_json = first.to_assistant_json(&limits)?;
    assert_eq!(assistant_json, second.to_assistant_json(&limits)?);
    assert!(assistant_json.len() <= limits.max_bytes);
    Ok(())
}
