//! Buienradar precipitation fetcher
//!
//! Requests the plain-text raintext feed (pipe-delimited `value|HH:MM`
//! lines, 5-minute buckets covering up to two hours) and reduces it to
//! running rain sums for the next 10, 60 and 120 minutes.

use crate::config::Config;
use crate::error::{BoreasError, Result};
use crate::logging::{LogContext, get_logger_with_context};
use crate::plot;
use crate::schedule::ScheduleBoard;
use crate::store::{Device, DeviceKind, DeviceStore, MINUTE_FORMAT, StateUpdate};
use chrono::{Duration, NaiveDateTime, Timelike};

pub const BUIENRADAR_URL: &str = "https://gpsgadget.buienradar.nl/data/raintext";

/// Parsed rain totals plus the accumulated plot table rows
#[derive(Debug, Clone, PartialEq)]
pub struct RainSummary {
    pub rain_10_minutes: f64,
    pub rain_60_minutes: f64,
    pub rain_120_minutes: f64,
    /// One `timestamp,intensity` line per input line, for the plot table
    pub plot_rows: String,
}

/// Fetch the precipitation time series and update the device state
pub async fn run(
    config: &Config,
    client: &reqwest::Client,
    store: &dyn DeviceStore,
    device: &Device,
    schedule: &mut ScheduleBoard,
) -> Result<()> {
    let logger =
        get_logger_with_context(LogContext::new("precipitation").with_device(&device.name));
    let now = chrono::Local::now().naive_local();

    let next = now + Duration::minutes(config.precipitation.interval_minutes as i64);
    schedule.advance(DeviceKind::Precipitation, next);
    store.update_state(
        device.id,
        StateUpdate::new("nextPlannedUpdate", next.format(MINUTE_FORMAT).to_string()),
    );
    logger.debug(&format!(
        "Start Buienradar action now. Scheduled next run at {}",
        next.format(MINUTE_FORMAT)
    ));

    let url = format!(
        "{}?lat={}&lon={}",
        BUIENRADAR_URL, device.coords.lat, device.coords.lon
    );
    logger.debug(&format!("Requesting {}", url));

    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(BoreasError::api(format!(
            "Buienradar request ended with status {}",
            response.status()
        )));
    }
    let body = response.text().await?;

    let summary = parse_raintext(&body, now)?;

    store.update_states(
        device.id,
        vec![
            StateUpdate::new("rain10Minutes", summary.rain_10_minutes)
                .with_ui(format!("{} mm / 10 mn", summary.rain_10_minutes))
                .with_decimals(1),
            StateUpdate::new("rain60Minutes", summary.rain_60_minutes)
                .with_ui(format!("{} mm / hr", summary.rain_60_minutes))
                .with_decimals(1),
            StateUpdate::new("rain120Minutes", summary.rain_120_minutes)
                .with_ui(format!("{} mm / 2 hr", summary.rain_120_minutes))
                .with_decimals(1),
        ],
    );

    // Plot table is best-effort: a missing or unreadable companion
    // configuration must not undo the state updates above
    if config.precipitation.plot_enabled {
        match plot::write_rain_table(&config.precipitation.plot_prefs_file, &summary.plot_rows) {
            Ok(path) => logger.debug(&format!(
                "Wrote {} bytes to {}",
                summary.plot_rows.len(),
                path.display()
            )),
            Err(e) => logger.warn(&format!("Could not write plot table: {}", e)),
        }
    }

    store.update_state(
        device.id,
        StateUpdate::new(
            "lastSuccessfullRun",
            now.format(MINUTE_FORMAT).to_string(),
        ),
    );
    logger.debug("Buienradar finished. Updated device");
    Ok(())
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Parse the raintext body into rain sums and plot rows
///
/// Intensity per line is `10 ^ ((value - 109) / 32)` mm/h, the radar
/// reflectivity transform the feed documents. The running sums are
/// re-rounded to one decimal after every line; this cumulative rounding is
/// part of the observable output and is kept as-is.
///
/// The time string is re-derived from the value field rather than the part
/// after the bar, so the rollover machinery only engages when the value
/// field itself looks time-like. Kept from the original line parser; the
/// part after the bar is only checked for presence.
pub fn parse_raintext(body: &str, start: NaiveDateTime) -> Result<RainSummary> {
    let mut sum10 = 0.0;
    let mut sum60 = 0.0;
    let mut sum120 = 0.0;
    let mut plot_rows = String::new();

    let mut moment = start;
    let mut hr = start.hour();
    let mut hr_before = start.hour();
    let mut min_before = start.minute();

    let mut count = 0u32;
    for line in body.lines() {
        count += 1;
        let (rainfall, _clock) = line.split_once('|').ok_or_else(|| {
            BoreasError::decode(format!("Buienradar line {} is not value|HH:MM", count))
        })?;

        let raintime = rainfall.trim();
        if raintime.len() > 4
            && raintime.get(0..2).is_some_and(is_numeric)
            && raintime.get(3..).is_some_and(is_numeric)
        {
            hr_before = raintime[0..2]
                .parse()
                .map_err(|_| BoreasError::decode("Buienradar hour is not numeric"))?;
            min_before = raintime[3..]
                .parse()
                .map_err(|_| BoreasError::decode("Buienradar minute is not numeric"))?;
            if hr_before < hr {
                // day change
                moment += Duration::days(1);
            }
        }
        let stamp = moment
            .with_hour(hr_before)
            .and_then(|m| m.with_minute(min_before))
            .ok_or_else(|| {
                BoreasError::decode(format!(
                    "Buienradar time {:02}:{:02} is out of range",
                    hr_before, min_before
                ))
            })?;
        hr = hr_before;

        let value: f64 = raintime.parse().map_err(|_| {
            BoreasError::decode(format!("Buienradar value '{}' is not numeric", raintime))
        })?;
        let intensity = 10f64.powf((value - 109.0) / 32.0);

        // First 2 lines cover the next 10 minutes, first 12 the next hour
        if count < 3 {
            sum10 += intensity;
        }
        if count < 13 {
            sum60 += intensity;
        }
        sum120 += intensity;

        sum10 = round1(sum10);
        sum60 = round1(sum60);
        sum120 = round1(sum120);

        plot_rows.push_str(&format!(
            "{},{}\n",
            stamp.format("%Y-%m-%d %H:%M:%S"),
            round2(intensity)
        ));
    }

    Ok(RainSummary {
        rain_10_minutes: sum10,
        rain_60_minutes: sum60,
        rain_120_minutes: sum120,
        plot_rows,
    })
}
