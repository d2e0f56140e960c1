//! OpenUV fetchers: current UV index and next-day forecast
//!
//! Both talk to api.openuv.io with the access token in the x-access-token
//! header. The current-index fetcher spreads the daily request quota evenly
//! across daylight by deriving its own next-run moment from the
//! sunrise/sunset state it wrote on an earlier cycle; the forecast fetcher
//! runs once a day.

use crate::config::Config;
use crate::error::{BoreasError, Result};
use crate::logging::{LogContext, get_logger_with_context};
use crate::schedule::ScheduleBoard;
use crate::store::{Device, DeviceKind, DeviceStore, MINUTE_FORMAT, StateUpdate};
use chrono::{Duration, NaiveDateTime, Timelike};

pub const OPENUV_UV_URL: &str = "https://api.openuv.io/api/v1/uv";
pub const OPENUV_FORECAST_URL: &str = "https://api.openuv.io/api/v1/forecast";

/// Fallback minutes between fetches when sunrise/sunset state is unusable
const FALLBACK_INTERVAL_MINUTES: i64 = 30;

/// Daily forecast fetch moment (next day, fixed time of day)
const FORECAST_RUN_HOUR: u32 = 12;
const FORECAST_RUN_MINUTE: u32 = 8;

/// Severity names per floored UV index; anything above 10 is Extreme.
/// Literal table, including the repeated boundary entries.
const UV_BUCKETS: [&str; 11] = [
    "Low", "Low", "Low", // 0-2
    "Moderate", "Moderate", "Moderate", // 3-5
    "High", "High", // 6-7
    "Very High", "Very High", "Very High", // 8-10
];

/// Named severity category for a floored UV index
pub fn bucket_name(int_uv: i64) -> &'static str {
    if int_uv > 10 {
        "Extreme"
    } else {
        UV_BUCKETS[int_uv.clamp(0, 10) as usize]
    }
}

/// Current local-minus-UTC wall-clock offset
fn local_utc_offset() -> Duration {
    chrono::Local::now().naive_local() - chrono::Utc::now().naive_utc()
}

/// Convert a UTC ISO-8601 timestamp string to local time
///
/// The offset is the current one, sampled once per conversion, not the
/// offset that applied at the converted instant. Good enough for
/// same-day sun times; kept as the observable behavior.
pub fn utc_to_local(ts: &str) -> Result<NaiveDateTime> {
    utc_to_local_with_offset(ts, local_utc_offset())
}

fn utc_to_local_with_offset(ts: &str, offset: Duration) -> Result<NaiveDateTime> {
    let parsed = NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.fZ")?;
    Ok(parsed + offset)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute the next UV fetch moment
///
/// With usable sunrise-end/sunset-start times the daily request quota is
/// spread evenly across the daylight minutes; the base moment is snapped
/// into daylight (tomorrow's sunrise when past sunset, today's sunrise when
/// before it). Without them, a fixed fallback interval from now applies.
pub fn next_uv_run(
    now: NaiveDateTime,
    sunrise_end: Option<NaiveDateTime>,
    sunset_start: Option<NaiveDateTime>,
    daily_max: u32,
) -> NaiveDateTime {
    let (Some(sunrise), Some(sunset)) = (sunrise_end, sunset_start) else {
        return now + Duration::minutes(FALLBACK_INTERVAL_MINUTES);
    };

    // Compare times of day only; the stored sun times carry yesterday's date
    let now_hhmm = (now.hour() * 60 + now.minute()) as i64;
    let sunrise_hhmm = (sunrise.hour() * 60 + sunrise.minute()) as i64;
    let sunset_hhmm = (sunset.hour() * 60 + sunset.minute()) as i64;

    let mut moment = now;
    if now_hhmm > sunset_hhmm {
        // Past sunset: next request opens tomorrow's daylight window
        moment += Duration::days(1);
        moment = moment
            .with_hour(sunrise.hour())
            .and_then(|m| m.with_minute(sunrise.minute()))
            .unwrap_or(moment);
    } else if now_hhmm < sunrise_hhmm {
        moment = moment
            .with_hour(sunrise.hour())
            .and_then(|m| m.with_minute(sunrise.minute()))
            .unwrap_or(moment);
    }

    let sun_up_minutes = sunset_hhmm - sunrise_hhmm;
    let interval = (sun_up_minutes as f64 / (daily_max as f64 - 1.0)).round() as i64;
    moment + Duration::minutes(interval)
}

/// Read a sun time state written on an earlier cycle
fn sun_state(store: &dyn DeviceStore, device_id: u32, key: &str) -> Option<NaiveDateTime> {
    let value = store.state(device_id, key)?;
    let text = value.as_str()?.to_string();
    NaiveDateTime::parse_from_str(&text, MINUTE_FORMAT).ok()
}

/// Fetch the current UV index and update the device state
pub async fn run_uv_now(
    config: &Config,
    client: &reqwest::Client,
    store: &dyn DeviceStore,
    device: &Device,
    schedule: &mut ScheduleBoard,
) -> Result<()> {
    let logger = get_logger_with_context(LogContext::new("uv").with_device(&device.name));
    let now = chrono::Local::now().naive_local();

    let sunrise_end = sun_state(store, device.id, "sunriseEnd");
    let sunset_start = sun_state(store, device.id, "sunsetStart");
    let next = next_uv_run(now, sunrise_end, sunset_start, config.uv_index.daily_max);
    schedule.advance(DeviceKind::UvNow, next);
    store.update_state(
        device.id,
        StateUpdate::new("nextPlannedUpdate", next.format(MINUTE_FORMAT).to_string()),
    );
    logger.debug(&format!(
        "Start UV index action now. Scheduled next run at {}",
        next.format(MINUTE_FORMAT)
    ));

    let url = format!(
        "{}?lat={}&lng={}",
        OPENUV_UV_URL, device.coords.lat, device.coords.lon
    );
    logger.debug(&format!("Requesting {}", url));

    let response = client
        .get(&url)
        .header("content-type", "application/json")
        .header("x-access-token", &config.uv_index.api_key)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(BoreasError::api(format!(
            "OpenUV request ended with status {}",
            response.status()
        )));
    }

    let payload: serde_json::Value = response
        .json()
        .await
        .map_err(|e| BoreasError::decode(format!("OpenUV response is not JSON: {}", e)))?;
    let result = payload.get("result").ok_or_else(|| {
        BoreasError::api("OpenUV result did not contain the expected 'result' info")
    })?;

    let mut updates = state_updates_from_uv_result(result, local_utc_offset())?;
    updates.push(StateUpdate::new(
        "lastSuccessfullRun",
        now.format(MINUTE_FORMAT).to_string(),
    ));
    store.update_states(device.id, updates);

    logger.debug("UV index finished. Updated device");
    Ok(())
}

/// Translate an OpenUV `result` object into state updates
///
/// Every nested field is optional: absence is silently skipped, never an
/// error. Conversions use the given UTC offset.
pub fn state_updates_from_uv_result(
    result: &serde_json::Value,
    offset: Duration,
) -> Result<Vec<StateUpdate>> {
    let mut updates = Vec::new();

    if let (Some(uv_time), Some(uv)) = (
        result.get("uv_time").and_then(|v| v.as_str()),
        result.get("uv").and_then(|v| v.as_f64()),
    ) {
        let local = utc_to_local_with_offset(uv_time, offset)?;
        updates.push(StateUpdate::new(
            "uvtime",
            local.format(MINUTE_FORMAT).to_string(),
        ));
        updates.push(StateUpdate::new("uvindex", round2(uv)));

        let int_uv = uv.floor() as i64;
        updates.push(StateUpdate::new("uvint", int_uv));
        updates.push(StateUpdate::new("uvname", bucket_name(int_uv)));
    }

    // The feed spells the value uv_max but the presence flag checked here
    // is uvmax; both have to cooperate before anything is written
    if result.get("uvmax").is_some() {
        let uv_max = result
            .get("uv_max")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| BoreasError::api("OpenUV uvmax flagged without uv_max value"))?;
        updates.push(StateUpdate::new("uvmax", round2(uv_max)));
    }

    if let (Some(ozone), Some(ozone_time)) = (
        result.get("ozone"),
        result.get("ozone_time").and_then(|v| v.as_str()),
    ) {
        let local = utc_to_local_with_offset(ozone_time, offset)?;
        updates.push(StateUpdate::new("ozone", ozone.clone()));
        updates.push(StateUpdate::new(
            "ozonetime",
            local.format(MINUTE_FORMAT).to_string(),
        ));
    }

    if let Some(exposure) = result.get("safe_exposure_time").and_then(|v| v.as_object()) {
        for skin_type in 1..=6 {
            let key = format!("st{}", skin_type);
            if let Some(minutes) = exposure.get(&key) {
                let display = match minutes {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                updates.push(
                    StateUpdate::new(format!("safe_st{}", skin_type), minutes.clone())
                        .with_ui(format!("{} minutes", display)),
                );
            }
        }
    }

    if let Some(sun_times) = result
        .get("sun_info")
        .and_then(|v| v.get("sun_times"))
        .and_then(|v| v.as_object())
    {
        for key in ["sunriseEnd", "sunsetStart", "solarNoon", "night"] {
            if let Some(ts) = sun_times.get(key).and_then(|v| v.as_str()) {
                let local = utc_to_local_with_offset(ts, offset)?;
                updates.push(StateUpdate::new(
                    key,
                    local.format(MINUTE_FORMAT).to_string(),
                ));
            }
        }
    }

    Ok(updates)
}

/// Fetch tomorrow's UV forecast and update the device state
pub async fn run_uv_forecast(
    config: &Config,
    client: &reqwest::Client,
    store: &dyn DeviceStore,
    device: &Device,
    schedule: &mut ScheduleBoard,
) -> Result<()> {
    let logger = get_logger_with_context(LogContext::new("uvforecast").with_device(&device.name));
    let now = chrono::Local::now().naive_local();

    let next = (now + Duration::days(1))
        .date()
        .and_hms_opt(FORECAST_RUN_HOUR, FORECAST_RUN_MINUTE, 0)
        .expect("valid forecast run time");
    schedule.advance(DeviceKind::UvForecast, next);
    store.update_state(
        device.id,
        StateUpdate::new("nextPlannedUpdate", next.format(MINUTE_FORMAT).to_string()),
    );
    logger.debug(&format!(
        "Start UV forecast action now. Scheduled next run at {}",
        next.format(MINUTE_FORMAT)
    ));

    let url = format!(
        "{}?lat={}&lng={}",
        OPENUV_FORECAST_URL, device.forecast_coords.lat, device.forecast_coords.lon
    );
    logger.debug(&format!("Requesting {}", url));

    let response = client
        .get(&url)
        .header("content-type", "application/json")
        .header("x-access-token", &config.uv_index.api_key)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(BoreasError::api(format!(
            "OpenUV forecast request ended with status {}",
            response.status()
        )));
    }

    let payload: serde_json::Value = response
        .json()
        .await
        .map_err(|e| BoreasError::decode(format!("OpenUV forecast response is not JSON: {}", e)))?;
    let entries = payload
        .get("result")
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            BoreasError::api("OpenUV forecast did not contain the expected 'result' info")
        })?;

    let mut updates = state_updates_from_forecast(entries, local_utc_offset())?;
    updates.push(StateUpdate::new(
        "lastSuccessfullRun",
        now.format(MINUTE_FORMAT).to_string(),
    ));
    store.update_states(device.id, updates);

    logger.debug("UV forecast finished. Updated device");
    Ok(())
}

/// Translate forecast entries into per-hour state updates plus the
/// daily maximum and the local hour at which it occurs
pub fn state_updates_from_forecast(
    entries: &[serde_json::Value],
    offset: Duration,
) -> Result<Vec<StateUpdate>> {
    let mut updates = Vec::new();
    let mut max_uv = 0.0f64;
    let mut max_hour = 0u32;

    for entry in entries {
        let uv_time = entry
            .get("uv_time")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BoreasError::api("OpenUV forecast entry without uv_time"))?;
        let uv = entry
            .get("uv")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| BoreasError::api("OpenUV forecast entry without uv"))?;

        let local = utc_to_local_with_offset(uv_time, offset)?;
        let this_uv = round2(uv);
        if this_uv > max_uv {
            max_uv = this_uv;
            max_hour = local.hour();
        }
        updates.push(StateUpdate::new(
            format!("UVForeCastHour_{:02}", local.hour()),
            this_uv,
        ));
    }

    updates.push(StateUpdate::new("MaxExpected", max_uv));
    updates.push(StateUpdate::new("MaxHour", max_hour as u64));
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn local(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 6, 21)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn value_of<'a>(updates: &'a [StateUpdate], key: &str) -> Option<&'a serde_json::Value> {
        updates.iter().find(|u| u.key == key).map(|u| &u.value)
    }

    #[test]
    fn bucket_table_boundaries() {
        assert_eq!(bucket_name(0), "Low");
        assert_eq!(bucket_name(2), "Low");
        assert_eq!(bucket_name(3), "Moderate");
        assert_eq!(bucket_name(5), "Moderate");
        assert_eq!(bucket_name(6), "High");
        assert_eq!(bucket_name(7), "High");
        assert_eq!(bucket_name(8), "Very High");
        // Index 10 is the last table entry, not yet Extreme
        assert_eq!(bucket_name(10), "Very High");
        assert_eq!(bucket_name(11), "Extreme");
    }

    #[test]
    fn utc_conversion_applies_given_offset() {
        let local =
            utc_to_local_with_offset("2021-06-21T10:15:30.000000Z", Duration::hours(2)).unwrap();
        assert_eq!(local.to_string(), "2021-06-21 12:15:30");

        assert!(utc_to_local_with_offset("yesterday at ten", Duration::zero()).is_err());
    }

    #[test]
    fn daylight_quota_spread() {
        // Sunrise 06:30, sunset 21:10 -> 880 daylight minutes; with a
        // quota of 45 that is 880 / 44 = 20 minutes between requests
        let next = next_uv_run(local(12, 0), Some(local(6, 30)), Some(local(21, 10)), 45);
        assert_eq!(next, local(12, 20));
    }

    #[test]
    fn before_sunrise_snaps_to_sunrise() {
        let next = next_uv_run(local(5, 0), Some(local(6, 30)), Some(local(21, 10)), 45);
        assert_eq!(next, local(6, 50));
    }

    #[test]
    fn after_sunset_moves_to_next_day() {
        let next = next_uv_run(local(22, 0), Some(local(6, 30)), Some(local(21, 10)), 45);
        let expected = NaiveDate::from_ymd_opt(2021, 6, 22)
            .unwrap()
            .and_hms_opt(6, 50, 0)
            .unwrap();
        assert_eq!(next, expected);
    }

    #[test]
    fn missing_sun_state_falls_back_to_fixed_interval() {
        let next = next_uv_run(local(12, 0), None, Some(local(21, 10)), 45);
        assert_eq!(next, local(12, 30));
    }

    #[test]
    fn full_result_produces_all_fields() {
        let result = json!({
            "uv": 5.4321,
            "uv_time": "2021-06-21T11:00:00.000000Z",
            "ozone": 310.5,
            "ozone_time": "2021-06-21T10:00:00.000000Z",
            "safe_exposure_time": { "st1": 20, "st2": 25, "st6": 130 },
            "sun_info": { "sun_times": {
                "sunriseEnd": "2021-06-21T03:25:00.000000Z",
                "sunsetStart": "2021-06-21T19:55:00.000000Z",
                "solarNoon": "2021-06-21T11:40:00.000000Z",
                "night": "2021-06-21T21:30:00.000000Z"
            }}
        });
        let updates = state_updates_from_uv_result(&result, Duration::hours(2)).unwrap();

        assert_eq!(value_of(&updates, "uvtime"), Some(&json!("2021-06-21 13:00")));
        assert_eq!(value_of(&updates, "uvindex"), Some(&json!(5.43)));
        assert_eq!(value_of(&updates, "uvint"), Some(&json!(5)));
        assert_eq!(value_of(&updates, "uvname"), Some(&json!("Moderate")));
        assert_eq!(value_of(&updates, "ozone"), Some(&json!(310.5)));
        assert_eq!(value_of(&updates, "ozonetime"), Some(&json!("2021-06-21 12:00")));
        assert_eq!(value_of(&updates, "safe_st1"), Some(&json!(20)));
        assert_eq!(value_of(&updates, "safe_st6"), Some(&json!(130)));
        assert_eq!(
            value_of(&updates, "sunriseEnd"),
            Some(&json!("2021-06-21 05:25"))
        );
        assert_eq!(value_of(&updates, "night"), Some(&json!("2021-06-21 23:30")));

        let st1 = updates.iter().find(|u| u.key == "safe_st1").unwrap();
        assert_eq!(st1.ui_value.as_deref(), Some("20 minutes"));
    }

    #[test]
    fn absent_fields_are_skipped_silently() {
        let result = json!({ "uv": 3.0 });
        // uv without uv_time writes nothing at all
        let updates = state_updates_from_uv_result(&result, Duration::zero()).unwrap();
        assert!(updates.is_empty());
    }

    #[test]
    fn skin_types_are_skipped_individually() {
        let result = json!({ "safe_exposure_time": { "st3": 45 } });
        let updates = state_updates_from_uv_result(&result, Duration::zero()).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].key, "safe_st3");
    }

    #[test]
    fn forecast_tracks_maximum_and_its_hour() {
        let entries = vec![
            json!({ "uv": 1.0, "uv_time": "2021-06-22T07:00:00.000000Z" }),
            json!({ "uv": 6.789, "uv_time": "2021-06-22T11:00:00.000000Z" }),
            json!({ "uv": 4.0, "uv_time": "2021-06-22T15:00:00.000000Z" }),
        ];
        let updates = state_updates_from_forecast(&entries, Duration::hours(2)).unwrap();

        assert_eq!(value_of(&updates, "UVForeCastHour_09"), Some(&json!(1.0)));
        assert_eq!(value_of(&updates, "UVForeCastHour_13"), Some(&json!(6.79)));
        assert_eq!(value_of(&updates, "UVForeCastHour_17"), Some(&json!(4.0)));
        assert_eq!(value_of(&updates, "MaxExpected"), Some(&json!(6.79)));
        assert_eq!(value_of(&updates, "MaxHour"), Some(&json!(13)));
    }

    #[test]
    fn forecast_entry_without_uv_time_is_an_error() {
        let entries = vec![json!({ "uv": 1.0 })];
        assert!(state_updates_from_forecast(&entries, Duration::zero()).is_err());
    }
}
