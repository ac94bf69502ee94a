use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use tariff_core::{
    quantity::{cost::Cost, currency::Currency, energy::KilowattHours},
    rate::CurrentRate,
    tariff::RateType,
    usage::{DailyUsage, UsageAggregate},
    window::{CompletedDispatch, Window, WindowStatus},
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

const fn rate_type_color(rate_type: RateType) -> Color {
    match rate_type {
        RateType::Peak => Color::Red,
        RateType::OffPeak | RateType::Dispatch => Color::Green,
        RateType::Standard => Color::DarkYellow,
    }
}

/// Format the countdown like `2h 05m`.
#[must_use]
pub fn format_countdown(delta: chrono::TimeDelta) -> String {
    let minutes = delta.num_minutes().max(0);
    match (minutes / 60, minutes % 60) {
        (0, minutes) => format!("{minutes}m"),
        (hours, minutes) => format!("{hours}h {minutes:02}m"),
    }
}

pub fn build_rate_table(rate: &CurrentRate, standing_charge: Cost, timezone: Tz, currency: Currency) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Now", "Price", "Until", "In", "Next", "Next price", "Standing"]);
    let boundary = rate.next_boundary.as_ref();
    table.add_row(vec![
        Cell::new(rate.band.rate_type).fg(rate_type_color(rate.band.rate_type)),
        Cell::new(format!("{}{}", currency.symbol(), rate.price())).set_alignment(CellAlignment::Right),
        Cell::new(boundary.map_or_else(
            || "-".to_owned(),
            |boundary| boundary.instant.with_timezone(&timezone).format("%b %d %H:%M").to_string(),
        )),
        Cell::new(rate.until_next_boundary.map_or_else(|| "-".to_owned(), format_countdown))
            .add_attribute(Attribute::Bold),
        Cell::new(boundary.map_or_else(|| "-".to_owned(), |boundary| boundary.to_band.rate_type.to_string())),
        Cell::new(rate.next_price().map_or_else(|| "-".to_owned(), |price| format!("{}{price}", currency.symbol())))
            .set_alignment(CellAlignment::Right),
        Cell::new(format!("{}/day", currency.format(standing_charge)))
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Dim),
    ]);
    table
}

pub fn build_windows_table(windows: &[Window], now: DateTime<Utc>, timezone: Tz) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Type", "Source", "Start", "End", "Status", "Countdown"]);
    for window in windows {
        let local = |instant: DateTime<Utc>| instant.with_timezone(&timezone).format("%b %d %H:%M").to_string();
        table.add_row(vec![
            Cell::new(format!("{:?}", window.kind)),
            Cell::new(format!("{:?}", window.provenance)).add_attribute(Attribute::Dim),
            Cell::new(local(window.start)),
            Cell::new(window.end.map_or_else(|| "open".to_owned(), local)),
            Cell::new(format!("{:?}", window.status)).fg(match window.status {
                WindowStatus::Active => Color::Green,
                WindowStatus::Upcoming => Color::DarkYellow,
                WindowStatus::Ended => Color::DarkGrey,
            }),
            Cell::new(window.countdown(now).map_or_else(|| "-".to_owned(), format_countdown))
                .set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn build_dispatches_table(dispatches: &[CompletedDispatch], timezone: Tz) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Start", "End", "Duration", "Energy"]);
    for dispatch in dispatches {
        table.add_row(vec![
            Cell::new(dispatch.start.with_timezone(&timezone).format("%b %d %H:%M")),
            Cell::new(dispatch.end.with_timezone(&timezone).format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(format_countdown(dispatch.duration())),
            Cell::new(dispatch.energy_kwh.map_or_else(|| "-".to_owned(), |kwh| kwh.to_string()))
                .set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn build_usage_table(usage: &UsageAggregate) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Rate", "Energy", "Cost"]);
    for (rate_type, kwh) in &usage.kwh_by_rate_type {
        let cost = usage.cost_by_rate_type.get(rate_type).copied().unwrap_or_default();
        table.add_row(vec![
            Cell::new(rate_type).fg(rate_type_color(*rate_type)),
            Cell::new(kwh).set_alignment(CellAlignment::Right),
            Cell::new(usage.currency.format(cost)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(usage.total_kwh).set_alignment(CellAlignment::Right).add_attribute(Attribute::Bold),
        Cell::new(usage.currency.format(usage.cost_total))
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![
        Cell::new("Savings").add_attribute(Attribute::Dim),
        Cell::new(""),
        Cell::new(usage.currency.format(usage.savings))
            .set_alignment(CellAlignment::Right)
            .fg(if usage.savings.is_sign_negative() { Color::Red } else { Color::Green }),
    ]);
    if !usage.standing_charges.is_zero() {
        table.add_row(vec![
            Cell::new("Standing").add_attribute(Attribute::Dim),
            Cell::new(""),
            Cell::new(usage.currency.format(usage.standing_charges)).set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new("Bill").add_attribute(Attribute::Bold),
            Cell::new(""),
            Cell::new(usage.currency.format(usage.bill_total()))
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Bold),
        ]);
    }
    table
}

pub fn build_gas_table(days: &[DailyUsage]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Date", "Gas"]);
    for day in days {
        table.add_row(vec![
            Cell::new(day.date.format("%b %d")),
            Cell::new(day.kwh).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn build_hourly_table(profile: &[KilowattHours; 24]) -> Table {
    let peak = profile.iter().copied().max().unwrap_or_default();
    let mut table = new_table();
    table.set_header(vec!["Hour", "Energy"]);
    for (hour, kwh) in profile.iter().enumerate() {
        table.add_row(vec![
            Cell::new(format!("{hour:02}:00")).add_attribute(Attribute::Dim),
            Cell::new(kwh).set_alignment(CellAlignment::Right).fg(if !kwh.is_zero() && *kwh == peak {
                Color::Red
            } else {
                Color::Reset
            }),
        ]);
    }
    table
}
