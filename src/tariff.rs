//! Time-of-use schedule model: validated rate bands keyed by effective date.

mod band;
mod rate_type;
mod schedule;
mod timeline;

pub use self::{
    band::{RateBand, RateBoundary},
    rate_type::RateType,
    schedule::{EffectivePeriod, RawPeriod, RawSchedule, TariffSchedule},
    timeline::DayTimeline,
};
pub(crate) use self::schedule::localize;
