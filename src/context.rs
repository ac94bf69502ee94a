//! Bounded snapshot of everything the presentation surfaces and the assistant need for one instant.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeDelta, Utc};
use chrono_tz::Tz;
use enumset::EnumSet;
use serde::{Deserialize, Serialize};

use crate::{
    config::Settings,
    error::{BuildError, Notice, Stage, TariffError},
    ops::Interval,
    prelude::*,
    projection::{ProjectedCost, Projector},
    quantity::{cost::Cost, currency::Currency, energy::KilowattHours, price::KilowattHourPrice},
    rate::{CurrentRate, current_rate},
    tariff::{RateBand, RateType, TariffSchedule, localize},
    usage::{DailyUsage, MeterType, UsageAggregate, UsageSample, aggregate, daily_usage},
    window::{CompletedDispatch, DispatchEvent, DispatchStatus, Window, WindowTracker},
};

/// Knobs of [`Context::build`], part of its input.
#[derive(Clone, Debug, bon::Builder)]
pub struct ContextOptions {
    #[builder(default = TimeDelta::hours(24))]
    pub window_horizon: TimeDelta,

    #[builder(default = TimeDelta::hours(1))]
    pub min_projection_elapsed: TimeDelta,

    /// Within `1..=28`.
    #[builder(default = 1)]
    pub billing_day: u32,

    #[builder(default = RateType::WINDOWED)]
    pub window_rate_types: EnumSet<RateType>,

    #[builder(default = 5)]
    pub completed_dispatch_limit: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TryFrom<&Settings> for ContextOptions {
    type Error = Error;

    fn try_from(settings: &Settings) -> Result<Self> {
        Ok(Self::builder()
            .window_horizon(settings.window_horizon()?)
            .min_projection_elapsed(settings.min_projection_elapsed()?)
            .billing_day(settings.effective_billing_day())
            .window_rate_types(settings.window_rate_types)
            .completed_dispatch_limit(settings.completed_dispatch_limit)
            .build())
    }
}

/// Caps of the assistant serialization.
#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AssistantLimits {
    pub max_windows: usize,
    pub max_history_days: usize,

    /// Budget of the serialized JSON, enforced by dropping history first and then windows.
    pub max_bytes: usize,
}

impl Default for AssistantLimits {
    fn default() -> Self {
        Self { max_windows: 5, max_history_days: 7, max_bytes: 4096 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffSummary {
    pub code: Option<String>,
    pub timezone: Tz,
    pub currency: Currency,

    /// Logical bands effective on the query date.
    pub bands: Vec<RateBand>,

    /// Per local day, effective on the query date.
    pub standing_charge: Cost,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub kwh: KilowattHours,
    pub cost: Cost,
}

/// Immutable analytics snapshot for a single query instant.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    generated_at: DateTime<Utc>,
    tariff: TariffSummary,
    billing_period: Interval,
    current_rate: CurrentRate,
    active_window: Option<Window>,
    upcoming_windows: Vec<Window>,
    dispatch_status: DispatchStatus,
    completed_dispatches: Vec<CompletedDispatch>,
    usage: UsageAggregate,
    projection: ProjectedCost,
    history: Vec<HistoryDay>,

    /// Gas meter readings per local day, reported in energy only.
    gas_history: Vec<DailyUsage>,

    notices: Vec<Notice>,
}

impl Context {
    /// Assemble the context, a pure function of its arguments.
    ///
    /// Every failing stage is reported in the error, and no partial context is exposed.
    #[instrument(skip_all, fields(now = %now, n_samples = samples.len(), n_events = events.len()))]
    pub fn build(
        now: DateTime<Utc>,
        schedule: &TariffSchedule,
        samples: &[UsageSample],
        events: &[DispatchEvent],
        options: &ContextOptions,
    ) -> Result<Self, BuildError> {
        let mut failures = Vec::new();

        let billing_period = billing_period(now, schedule.timezone(), options.billing_day);
        let tracker = WindowTracker::builder()
            .schedule(schedule)
            .events(events)
            .rate_types(options.window_rate_types)
            .build();

        let to_date = billing_period.with_end(now.min(billing_period.end));

        let rate = check(
            &mut failures,
            Stage::Rate,
            current_rate(schedule, now).and_then(|rate| Ok((schedule.period_at(now)?, rate))),
        );
        let windows = check(
            &mut failures,
            Stage::Windows,
            tracker.active_window(now).and_then(|active| {
                Ok((active, tracker.upcoming_windows(now, options.window_horizon)?))
            }),
        );
        let usage = check(&mut failures, Stage::Usage, aggregate(samples, to_date, schedule));
        let history = check(&mut failures, Stage::History, history(samples, to_date, schedule));

        let (Some((period, current_rate)), Some((active_window, upcoming_windows)), Some(usage), Some(history)) =
            (rate, windows, usage, history)
        else {
            return Err(BuildError { failures });
        };

        let projection = Projector::builder()
            .min_elapsed(options.min_projection_elapsed)
            .build()
            .project(&usage, schedule, billing_period, now);
        let notices = [current_rate.notice.clone(), usage.notice.clone()].into_iter().flatten().collect();
        let context = Self {
            generated_at: now,
            tariff: TariffSummary {
                code: schedule.code().map(ToOwned::to_owned),
                timezone: schedule.timezone(),
                currency: schedule.currency(),
                bands: period.timeline.bands().to_vec(),
                standing_charge: period.standing_charge,
            },
            billing_period,
            current_rate,
            active_window,
            upcoming_windows,
            dispatch_status: tracker.dispatch_status(now),
            completed_dispatches: tracker.completed_dispatches(now, options.completed_dispatch_limit),
            usage,
            projection,
            history,
            gas_history: daily_usage(samples, to_date, schedule.timezone(), MeterType::Gas),
            notices,
        };
        info!(
            rate_type = %context.current_rate.band.rate_type,
            cost_to_date = %context.usage.cost_total,
            estimated_total = %context.projection.estimated_total,
            "built the context",
        );
        Ok(context)
    }

    #[must_use]
    pub const fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    #[must_use]
    pub const fn tariff(&self) -> &TariffSummary {
        &self.tariff
    }

    #[must_use]
    pub const fn billing_period(&self) -> Interval {
        self.billing_period
    }

    #[must_use]
    pub const fn current_rate(&self) -> &CurrentRate {
        &self.current_rate
    }

    #[must_use]
    pub const fn active_window(&self) -> Option<&Window> {
        self.active_window.as_ref()
    }

    #[must_use]
    pub fn upcoming_windows(&self) -> &[Window] {
        &self.upcoming_windows
    }

    #[must_use]
    pub const fn dispatch_status(&self) -> &DispatchStatus {
        &self.dispatch_status
    }

    #[must_use]
    pub fn completed_dispatches(&self) -> &[CompletedDispatch] {
        &self.completed_dispatches
    }

    #[must_use]
    pub const fn usage(&self) -> &UsageAggregate {
        &self.usage
    }

    #[must_use]
    pub const fn projection(&self) -> &ProjectedCost {
        &self.projection
    }

    #[must_use]
    pub fn history(&self) -> &[HistoryDay] {
        &self.history
    }

    #[must_use]
    pub fn gas_history(&self) -> &[DailyUsage] {
        &self.gas_history
    }

    #[must_use]
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Compact serialization for the assistant, with presentation rounding and the caps applied.
    pub fn to_assistant_json(&self, limits: &AssistantLimits) -> Result<String, serde_json::Error> {
        let currency = self.tariff.currency;
        let round = |cost: Cost| currency.round(cost);
        let history_start = self.history.len().saturating_sub(limits.max_history_days);
        let mut view = AssistantView {
            generated_at: self.generated_at,
            tariff_code: self.tariff.code.as_deref(),
            timezone: self.tariff.timezone,
            currency,
            rate: AssistantRate {
                rate_type: self.current_rate.band.rate_type,
                price: self.current_rate.price(),
                seconds_until_next: self.current_rate.until_next_boundary.map(|delta| delta.num_seconds()),
                next_rate_type: self.current_rate.next_boundary.as_ref().map(|boundary| boundary.to_band.rate_type),
                next_price: self.current_rate.next_price(),
                standing_charge: round(self.tariff.standing_charge),
            },
            active_window: self.active_window.as_ref(),
            upcoming_windows: &self.upcoming_windows[..self.upcoming_windows.len().min(limits.max_windows)],
            is_dispatching: self.dispatch_status.is_dispatching,
            usage: AssistantUsage {
                period_start: self.usage.period_start,
                period_end: self.usage.period_end,
                total_kwh: self.usage.total_kwh,
                kwh_by_rate_type: &self.usage.kwh_by_rate_type,
                cost_by_rate_type: self
                    .usage
                    .cost_by_rate_type
                    .iter()
                    .map(|(rate_type, cost)| (*rate_type, round(*cost)))
                    .collect(),
                cost_total: round(self.usage.cost_total),
                savings: round(self.usage.savings),
                standing_charges: round(self.usage.standing_charges),
                gas_kwh: (!self.gas_history.is_empty())
                    .then(|| self.gas_history.iter().map(|day| day.kwh).sum()),
            },
            projection: AssistantProjection {
                period_end: self.projection.period_end,
                estimated_total: round(self.projection.estimated_total),
                estimated_bill: round(self.projection.estimated_bill()),
                days_elapsed: self.projection.confidence_basis.days_elapsed,
                days_in_period: self.projection.confidence_basis.days_in_period,
                is_final: self.projection.is_final,
            },
            history: self.history[history_start..]
                .iter()
                .map(|day| HistoryDay { cost: round(day.cost), ..day.clone() })
                .collect(),
            notices: &self.notices,
        };

        loop {
            let json = serde_json::to_string(&view)?;
            if json.len() <= limits.max_bytes {
                return Ok(json);
            }
            if !view.history.is_empty() {
                view.history.remove(0);
            } else if let Some((_, rest)) = view.upcoming_windows.split_last() {
                view.upcoming_windows = rest;
            } else {
                warn!(n_bytes = json.len(), max_bytes = limits.max_bytes, "nothing left to trim");
                return Ok(json);
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssistantView<'a> {
    generated_at: DateTime<Utc>,
    tariff_code: Option<&'a str>,
    timezone: Tz,
    currency: Currency,
    rate: AssistantRate,
    active_window: Option<&'a Window>,
    upcoming_windows: &'a [Window],
    is_dispatching: bool,
    usage: AssistantUsage<'a>,
    projection: AssistantProjection,
    history: Vec<HistoryDay>,
    notices: &'a [Notice],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssistantRate {
    rate_type: RateType,
    price: KilowattHourPrice,
    seconds_until_next: Option<i64>,
    next_rate_type: Option<RateType>,
    next_price: Option<KilowattHourPrice>,

    /// Per local day.
    standing_charge: Cost,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssistantUsage<'a> {
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    total_kwh: KilowattHours,
    kwh_by_rate_type: &'a BTreeMap<RateType, KilowattHours>,
    cost_by_rate_type: BTreeMap<RateType, Cost>,
    cost_total: Cost,
    savings: Cost,
    standing_charges: Cost,

    #[serde(skip_serializing_if = "Option::is_none")]
    gas_kwh: Option<KilowattHours>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssistantProjection {
    period_end: DateTime<Utc>,
    estimated_total: Cost,
    estimated_bill: Cost,
    days_elapsed: f64,
    days_in_period: f64,
    is_final: bool,
}

fn check<T>(
    failures: &mut Vec<(Stage, TariffError)>,
    stage: Stage,
    result: Result<T, TariffError>,
) -> Option<T> {
    result
        .inspect_err(|error| warn!(%stage, %error, "stage failed"))
        .map_err(|error| failures.push((stage, error)))
        .ok()
}

/// Local month containing `now`, starting at midnight of the billing day.
#[must_use]
pub fn billing_period(now: DateTime<Utc>, timezone: Tz, billing_day: u32) -> Interval {
    let billing_day = billing_day.clamp(1, 28);
    let today = now.with_timezone(&timezone).date_naive();
    let anchor = today.with_day(billing_day).unwrap_or(today);
    let start = if today.day() >= billing_day { anchor } else { anchor - Months::new(1) };
    let end = start + Months::new(1);
    Interval::new(local_midnight(timezone, start), local_midnight(timezone, end))
}

fn local_midnight(timezone: Tz, date: NaiveDate) -> DateTime<Utc> {
    localize(timezone, date.and_time(chrono::NaiveTime::MIN))
}

/// Electricity and its cost per local day of the period, each day clipped to the period.
fn history(
    samples: &[UsageSample],
    period: Interval,
    schedule: &TariffSchedule,
) -> Result<Vec<HistoryDay>, TariffError> {
    let timezone = schedule.timezone();
    daily_usage(samples, period, timezone, MeterType::Electricity)
        .into_iter()
        .map(|day| {
            let next = day.date.succ_opt().unwrap_or(day.date);
            let range = Interval::new(
                local_midnight(timezone, day.date).max(period.start),
                local_midnight(timezone, next).min(period.end),
            );
            let cost = aggregate(samples, range, schedule)?.cost_total;
            Ok(HistoryDay { date: day.date, kwh: day.kwh, cost })
        })
        .collect()
}
