use std::{fs, path::PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tariff_core::{
    config::Settings,
    tariff::TariffSchedule,
    usage::UsageSample,
    window::DispatchEvent,
};

use tariff_core::prelude::*;

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[clap(flatten)]
    pub snapshot: SnapshotArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the full context as JSON.
    #[clap(name = "context")]
    Context(ContextArgs),

    /// Show the current rate and the next boundary.
    #[clap(name = "rate")]
    Rate(RateArgs),

    /// List the active and upcoming windows, and the recent dispatches.
    #[clap(name = "windows")]
    Windows,

    /// Show the usage split by rate type, and the hourly profile of a day.
    #[clap(name = "usage")]
    Usage(UsageArgs),
}

#[derive(Parser)]
pub struct ContextArgs {
    /// Print the compact assistant serialization instead of the full context.
    #[clap(long)]
    pub assistant: bool,
}

#[derive(Parser)]
pub struct RateArgs {
    /// Live power demand to estimate the hourly cost for.
    #[clap(long, env = "POWER_WATTS")]
    pub power_watts: Option<u32>,
}

#[derive(Parser)]
pub struct UsageArgs {
    /// Local date of the hourly profile, today by default.
    #[clap(long)]
    pub day: Option<NaiveDate>,
}

/// Already-fetched JSON snapshots.
#[derive(Parser)]
pub struct SnapshotArgs {
    /// Tariff schedule JSON.
    #[clap(long = "schedule", env = "TARIFF_SCHEDULE")]
    schedule_path: PathBuf,

    /// Usage samples JSON array.
    #[clap(long = "usage", env = "TARIFF_USAGE")]
    usage_path: Option<PathBuf>,

    /// Dispatch events JSON array.
    #[clap(long = "dispatches", env = "TARIFF_DISPATCHES")]
    dispatches_path: Option<PathBuf>,

    /// Settings TOML, the defaults apply when it is missing.
    #[clap(long = "settings", env = "TARIFF_SETTINGS", default_value = "tariff.toml")]
    settings_path: PathBuf,

    /// Query instant, the current time by default.
    #[clap(long, env = "TARIFF_NOW")]
    now: Option<DateTime<Utc>>,
}

impl SnapshotArgs {
    pub fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    pub fn settings(&self) -> Result<Settings> {
        Settings::read_from(&self.settings_path)
    }

    #[instrument(skip_all, fields(path = %self.schedule_path.display()))]
    pub fn schedule(&self) -> Result<TariffSchedule> {
        let json = fs::read_to_string(&self.schedule_path)
            .with_context(|| format!("failed to read `{}`", self.schedule_path.display()))?;
        TariffSchedule::from_json(&json).context("invalid tariff schedule")
    }

    pub fn samples(&self) -> Result<Vec<UsageSample>> {
        read_optional(self.usage_path.as_ref())
    }

    pub fn events(&self) -> Result<Vec<DispatchEvent>> {
        read_optional(self.dispatches_path.as_ref())
    }
}

fn read_optional<T: DeserializeOwned>(path: Option<&PathBuf>) -> Result<Vec<T>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let json = fs::read_to_string(path).with_context(|| format!("failed to read `{}`", path.display()))?;
    let items: Vec<T> =
        serde_json::from_str(&json).with_context(|| format!("failed to parse `{}`", path.display()))?;
    debug!(path = %path.display(), n_items = items.len(), "loaded");
    Ok(items)
}
