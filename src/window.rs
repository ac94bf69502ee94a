//! Off-peak and dispatch windows with their countdown state.

use std::cmp::Reverse;

use chrono::{DateTime, TimeDelta, Utc};
use enumset::EnumSet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    error::TariffError,
    ops::Interval,
    prelude::*,
    quantity::energy::KilowattHours,
    tariff::{RateType, TariffSchedule},
};

/// Ad hoc event from the provider's dispatch feed.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEvent {
    pub start: DateTime<Utc>,

    /// `None` for an open event.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    #[serde(rename = "type")]
    pub kind: DispatchKind,

    /// Supersedes [`DispatchEvent::end`] when present.
    #[serde(default)]
    pub actual_end: Option<DateTime<Utc>>,

    /// Energy transferred during a completed charging dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_kwh: Option<KilowattHours>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Saving session reward in provider points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_per_kwh: Option<u32>,
}

impl DispatchEvent {
    #[must_use]
    pub fn effective_end(&self) -> Option<DateTime<Utc>> {
        self.actual_end.or(self.end)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchKind {
    #[serde(alias = "EV-charging", alias = "ev_charging")]
    EvCharging,

    #[serde(alias = "saving_session")]
    SavingSession,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowKind {
    OffPeak,
    Dispatch,
    EvCharging,
    SavingSession,
}

impl From<DispatchKind> for WindowKind {
    fn from(kind: DispatchKind) -> Self {
        match kind {
            DispatchKind::EvCharging => Self::EvCharging,
            DispatchKind::SavingSession => Self::SavingSession,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    DispatchFeed,
    Schedule,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowStatus {
    Upcoming,
    Active,
    Ended,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    #[serde(rename = "type")]
    pub kind: WindowKind,

    pub provenance: Provenance,
    pub start: DateTime<Utc>,

    /// `None` while the end is not known yet.
    pub end: Option<DateTime<Utc>>,

    pub status: WindowStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_per_kwh: Option<u32>,
}

impl Window {
    fn new(
        kind: WindowKind,
        provenance: Provenance,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let status = if now < start {
            WindowStatus::Upcoming
        } else if end.is_none_or(|end| now < end) {
            WindowStatus::Active
        } else {
            WindowStatus::Ended
        };
        Self { kind, provenance, start, end, status, reward_per_kwh: None }
    }

    /// Time until the window opens when upcoming, or until it closes when active.
    #[must_use]
    pub fn countdown(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        match self.status {
            WindowStatus::Upcoming => Some(self.start - now),
            WindowStatus::Active => self.end.map(|end| end - now),
            WindowStatus::Ended => None,
        }
        .map(|delta| delta.max(TimeDelta::zero()))
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, WindowStatus::Active)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchStatus {
    pub is_dispatching: bool,
    pub current: Option<Window>,
    pub next: Option<Window>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedDispatch {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub energy_kwh: Option<KilowattHours>,
}

impl CompletedDispatch {
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// Merges schedule-derived windows with the dispatch feed.
#[derive(bon::Builder)]
pub struct WindowTracker<'a> {
    schedule: &'a TariffSchedule,

    #[builder(default)]
    events: &'a [DispatchEvent],

    /// Schedule rate types that count as windows.
    #[builder(default = RateType::WINDOWED)]
    rate_types: EnumSet<RateType>,
}

impl WindowTracker<'_> {
    /// Every window in force at `now`: dispatch-feed windows first, then by start.
    pub fn active_windows(&self, now: DateTime<Utc>) -> Result<Vec<Window>, TariffError> {
        Ok(self
            .windows(now, TimeDelta::zero())?
            .into_iter()
            .filter(Window::is_active)
            .sorted_by_key(|window| (window.provenance, window.start, window.kind))
            .collect())
    }

    pub fn active_window(&self, now: DateTime<Utc>) -> Result<Option<Window>, TariffError> {
        Ok(self.active_windows(now)?.into_iter().next())
    }

    /// Non-ended windows that start before `now + horizon`, active ones included.
    #[instrument(skip_all, fields(now = %now))]
    pub fn upcoming_windows(&self, now: DateTime<Utc>, horizon: TimeDelta) -> Result<Vec<Window>, TariffError> {
        let until = now + horizon;
        let windows = self
            .windows(now, horizon)?
            .into_iter()
            .filter(|window| window.status != WindowStatus::Ended && window.start < until)
            .sorted_by_key(|window| (window.start, window.kind, window.provenance))
            .collect_vec();
        debug!(n_windows = windows.len(), "found upcoming windows");
        Ok(windows)
    }

    pub fn dispatch_status(&self, now: DateTime<Utc>) -> DispatchStatus {
        let charging = self
            .feed_windows(now)
            .filter(|window| window.kind == WindowKind::EvCharging)
            .sorted_by_key(|window| window.start)
            .collect_vec();
        let current = charging.iter().find(|window| window.is_active()).cloned();
        let next = charging.iter().find(|window| window.status == WindowStatus::Upcoming).cloned();
        DispatchStatus { is_dispatching: current.is_some(), current, next }
    }

    /// Finished charging dispatches, most recent first.
    pub fn completed_dispatches(&self, now: DateTime<Utc>, limit: usize) -> Vec<CompletedDispatch> {
        self.events
            .iter()
            .filter(|event| event.kind == DispatchKind::EvCharging)
            .filter_map(|event| {
                let end = event.effective_end()?;
                (event.start < end && end <= now).then(|| CompletedDispatch {
                    start: event.start,
                    end,
                    energy_kwh: event.energy_kwh,
                })
            })
            .sorted_by_key(|dispatch| Reverse(dispatch.end))
            .take(limit)
            .collect()
    }

    fn windows(&self, now: DateTime<Utc>, horizon: TimeDelta) -> Result<Vec<Window>, TariffError> {
        let mut windows = self.schedule_windows(now, horizon)?;
        windows.extend(self.feed_windows(now));
        Ok(windows)
    }

    fn feed_windows(&self, now: DateTime<Utc>) -> impl Iterator<Item = Window> {
        self.events.iter().filter_map(move |event| {
            let end = event.effective_end();
            if end.is_some_and(|end| end <= event.start) {
                trace!(start = %event.start, "dropping an empty dispatch");
                return None;
            }
            let mut window = Window::new(event.kind.into(), Provenance::DispatchFeed, event.start, end, now);
            window.reward_per_kwh = event.reward_per_kwh;
            Some(window)
        })
    }

    /// Merge consecutive schedule bands of the same windowed rate type.
    fn schedule_windows(&self, now: DateTime<Utc>, horizon: TimeDelta) -> Result<Vec<Window>, TariffError> {
        let scan = Interval::new(now - TimeDelta::days(1), now + horizon + TimeDelta::days(1));
        let mut windows: Vec<Window> = Vec::new();
        let parts = self
            .schedule
            .covered(scan)
            .into_iter()
            .map(|part| self.schedule.bands_overlapping(part))
            .flatten_ok()
            .collect::<Result<Vec<_>, _>>()?;
        for (range, band) in parts {
            if !self.rate_types.contains(band.rate_type) {
                continue;
            }
            let kind = match band.rate_type {
                RateType::OffPeak => WindowKind::OffPeak,
                RateType::Dispatch => WindowKind::Dispatch,
                RateType::Peak | RateType::Standard => continue,
            };
            match windows.last_mut() {
                Some(last) if last.kind == kind && last.end == Some(range.start) => {
                    *last = Window::new(kind, Provenance::Schedule, last.start, Some(range.end), now);
                }
                _ => windows.push(Window::new(kind, Provenance::Schedule, range.start, Some(range.end), now)),
            }
        }
        Ok(windows)
    }
}
