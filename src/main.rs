mod cli;
mod tables;

use chrono::Datelike;
use clap::{Parser, crate_version};
use tariff_core::{
    context::{Context, ContextOptions},
    prelude::*,
    quantity::power::Kilowatts,
    rate::current_rate,
    usage::{MeterType, aggregate, daily_usage, hourly_profile},
    window::WindowTracker,
};

use crate::{
    cli::{Args, Command},
    tables::{
        build_dispatches_table,
        build_gas_table,
        build_hourly_table,
        build_rate_table,
        build_usage_table,
        build_windows_table,
    },
};

fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    let args = Args::parse();
    let now = args.snapshot.now();
    let settings = args.snapshot.settings()?;
    let options = ContextOptions::try_from(&settings)?;
    let schedule = args.snapshot.schedule()?;
    let timezone = schedule.timezone();

    match args.command {
        Command::Context(context_args) => {
            let samples = args.snapshot.samples()?;
            let events = args.snapshot.events()?;
            let context = Context::build(now, &schedule, &samples, &events, &options)?;
            if context_args.assistant {
                println!("{}", context.to_assistant_json(&settings.assistant)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&context)?);
            }
        }

        Command::Rate(rate_args) => {
            let rate = current_rate(&schedule, now)?;
            let standing_charge = schedule.period_at(now)?.standing_charge;
            println!("{}", build_rate_table(&rate, standing_charge, timezone, schedule.currency()));
            if let Some(watts) = rate_args.power_watts {
                let power = Kilowatts::from_watts(watts);
                let cost = rate.cost_per_hour(power);
                info!(%power, %cost, "hourly cost at the live demand");
            }
        }

        Command::Windows => {
            let events = args.snapshot.events()?;
            let tracker = WindowTracker::builder()
                .schedule(&schedule)
                .events(&events)
                .rate_types(options.window_rate_types)
                .build();
            let windows = tracker.upcoming_windows(now, options.window_horizon)?;
            println!("{}", build_windows_table(&windows, now, timezone));
            let dispatches = tracker.completed_dispatches(now, options.completed_dispatch_limit);
            if !dispatches.is_empty() {
                println!("{}", build_dispatches_table(&dispatches, timezone));
            }
        }

        Command::Usage(usage_args) => {
            let samples = args.snapshot.samples()?;
            let period = tariff_core::context::billing_period(now, timezone, options.billing_day);
            let to_date = period.with_end(now.min(period.end));
            let usage = aggregate(&samples, to_date, &schedule)?;
            println!("{}", build_usage_table(&usage));
            let gas = daily_usage(&samples, to_date, timezone, MeterType::Gas);
            if !gas.is_empty() {
                println!("{}", build_gas_table(&gas));
            }

            let day = usage_args.day.unwrap_or_else(|| now.with_timezone(&timezone).date_naive());
            info!(%day, weekday = %day.weekday(), "hourly profile");
            println!("{}", build_hourly_table(&hourly_profile(&samples, day, timezone)));
        }
    }

    info!("done!");
    Ok(())
}
