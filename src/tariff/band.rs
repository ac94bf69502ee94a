use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{
    quantity::{currency::Currency, price::KilowattHourPrice},
    tariff::RateType,
};

pub const SECONDS_PER_DAY: u32 = 86_400;

/// One logical time-of-use band.
///
/// A band whose end is not after its start wraps over midnight, for example `23:00–07:00`.
/// An end of `00:00` (or `24:00`) means «until midnight».
#[derive(Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateBand {
    #[serde(
        rename = "startTimeOfDay",
        deserialize_with = "deserialize_time_of_day",
        serialize_with = "serialize_time_of_day"
    )]
    pub start: NaiveTime,

    #[serde(
        rename = "endTimeOfDay",
        deserialize_with = "deserialize_time_of_day",
        serialize_with = "serialize_time_of_day"
    )]
    pub end: NaiveTime,

    pub rate_type: RateType,

    #[serde(rename = "pricePerUnit")]
    pub price: KilowattHourPrice,

    pub currency: Currency,
}

impl RateBand {
    #[must_use]
    pub fn start_seconds(&self) -> u32 {
        self.start.num_seconds_from_midnight()
    }

    /// End offset from midnight, with midnight itself mapped to the end of the day.
    #[must_use]
    pub fn end_seconds(&self) -> u32 {
        match self.end.num_seconds_from_midnight() {
            0 => SECONDS_PER_DAY,
            seconds => seconds,
        }
    }

    #[must_use]
    pub fn wraps_midnight(&self) -> bool {
        self.end_seconds() <= self.start_seconds()
    }

    /// Check whether the time of day falls into `[start, end)`, comparing circularly.
    #[must_use]
    pub fn contains_time(&self, time: NaiveTime) -> bool {
        let seconds = time.num_seconds_from_midnight();
        let (start, end) = (self.start_seconds(), self.end_seconds());
        if self.wraps_midnight() {
            seconds >= start || seconds < end
        } else {
            (start..end).contains(&seconds)
        }
    }

    /// Split the band into non-wrapping `[start, end)` second offsets.
    pub(crate) fn half_bands(&self) -> impl Iterator<Item = (u32, u32)> {
        let (start, end) = (self.start_seconds(), self.end_seconds());
        let halves = if self.wraps_midnight() {
            [(start, SECONDS_PER_DAY), (0, end)]
        } else {
            [(start, end), (0, 0)]
        };
        halves.into_iter().filter(|(start, end)| start < end)
    }
}

/// Transition point in a resolved timeline.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateBoundary {
    pub instant: DateTime<Utc>,
    pub from_band: RateBand,
    pub to_band: RateBand,
}

fn deserialize_time_of_day<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
    let text = String::deserialize(deserializer)?;
    if text == "24:00" || text == "24:00:00" {
        return Ok(NaiveTime::MIN);
    }
    NaiveTime::parse_from_str(&text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&text, "%H:%M"))
        .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(&text), &"a time of day like 23:30"))
}

fn serialize_time_of_day<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
    if time.second() == 0 {
        serializer.collect_str(&time.format("%H:%M"))
    } else {
        serializer.collect_str(&time.format("%H:%M:%S"))
    }
}
