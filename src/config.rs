use std::{fmt::Debug, fs, path::Path};

use chrono::TimeDelta;
use enumset::EnumSet;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::{context::AssistantLimits, prelude::*, tariff::RateType};

/// Tunables of the analytics core, read from a TOML file where every field is optional.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Lower bound of the elapsed time the cost projection divides by.
    #[serde_as(as = "DisplayFromStr")]
    pub min_projection_elapsed: humantime::Duration,

    /// How far ahead to look for upcoming windows.
    #[serde_as(as = "DisplayFromStr")]
    pub window_horizon: humantime::Duration,

    /// Day of the month the billing period starts on, capped at 28.
    pub billing_day: u32,

    /// Schedule rate types reported as windows.
    pub window_rate_types: EnumSet<RateType>,

    pub completed_dispatch_limit: usize,

    pub assistant: AssistantLimits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_projection_elapsed: std::time::Duration::from_secs(3600).into(),
            window_horizon: std::time::Duration::from_secs(24 * 3600).into(),
            billing_day: 1,
            window_rate_types: RateType::WINDOWED,
            completed_dispatch_limit: 5,
            assistant: AssistantLimits::default(),
        }
    }
}

impl Settings {
    /// Read the settings, falling back to the defaults when the file does not exist.
    #[instrument(name = "Reading the settings…")]
    pub fn read_from<P: AsRef<Path> + Debug>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            debug!("no settings file, using the defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).with_context(|| format!("failed to read `{}`", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("failed to parse `{}`", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)?;
        ensure!(
            (1..=31).contains(&settings.billing_day),
            "billing day must be within 1..=31, got {}",
            settings.billing_day,
        );
        Ok(settings)
    }

    pub fn min_projection_elapsed(&self) -> Result<TimeDelta> {
        Ok(TimeDelta::from_std(self.min_projection_elapsed.into())?)
    }

    pub fn window_horizon(&self) -> Result<TimeDelta> {
        Ok(TimeDelta::from_std(self.window_horizon.into())?)
    }

    /// Billing day as used for period boundaries.
    #[must_use]
    pub fn effective_billing_day(&self) -> u32 {
        self.billing_day.clamp(1, 28)
    }
}

#[cfg(test)]
mod tests {
    use enumset::enum_set;

    use super::*;

    #[test]
    fn test_defaults() -> Result {
        let settings = Settings::from_toml("")?;
        assert_eq!(settings.window_horizon()?, TimeDelta::hours(24));
        assert_eq!(settings.min_projection_elapsed()?, TimeDelta::hours(1));
        assert_eq!(settings.billing_day, 1);
        assert_eq!(settings.window_rate_types, RateType::WINDOWED);
        Ok(())
    }

    #[test]
    fn test_parse() -> Result {
        let settings = Settings::from_toml(
            r#"
                window-horizon = "12h"
                billing-day = 31
                window-rate-types = ["off-peak"]

                [assistant]
                max-windows = 2
            "#,
        )?;
        assert_eq!(settings.window_horizon()?, TimeDelta::hours(12));
        assert_eq!(settings.effective_billing_day(), 28);
        assert_eq!(settings.window_rate_types, enum_set!(RateType::OffPeak));
        assert_eq!(settings.assistant.max_windows, 2);
        assert_eq!(settings.assistant.max_bytes, AssistantLimits::default().max_bytes);
        Ok(())
    }

    #[test]
    fn test_rejects_zero_billing_day() {
        assert!(Settings::from_toml("billing-day = 0").is_err());
    }

    #[test]
    fn test_missing_file() -> Result {
        let settings = Settings::read_from("/nonexistent/tariff.toml")?;
        assert_eq!(settings.completed_dispatch_limit, 5);
        Ok(())
    }
}
