//! Weerlive weather fetcher
//!
//! Requests the Weerlive JSON endpoint and copies every field of every
//! `liveweer` object verbatim into the device state, plus localized
//! day-of-week names for today and the two days after.

use crate::config::Config;
use crate::error::{BoreasError, Result};
use crate::logging::{LogContext, get_logger_with_context};
use crate::schedule::ScheduleBoard;
use crate::store::{Device, DeviceKind, DeviceStore, MINUTE_FORMAT, StateUpdate};
use chrono::{Datelike, Duration, NaiveDateTime};

pub const WEERLIVE_URL: &str = "https://weerlive.nl/api/json-data-10min.php";

/// Fetch the latest weather information and update the device state
pub async fn run(
    config: &Config,
    client: &reqwest::Client,
    store: &dyn DeviceStore,
    device: &Device,
    schedule: &mut ScheduleBoard,
) -> Result<()> {
    let logger = get_logger_with_context(LogContext::new("weather").with_device(&device.name));
    let now = chrono::Local::now().naive_local();

    // Advance the schedule before the request so a failure never tight-loops
    let next = now + Duration::minutes(config.weather.interval_minutes as i64);
    schedule.advance(DeviceKind::Weather, next);
    store.update_state(
        device.id,
        StateUpdate::new("nextPlannedUpdate", next.format(MINUTE_FORMAT).to_string()),
    );
    logger.debug(&format!(
        "Start Weerlive action now. Scheduled next run at {}",
        next.format(MINUTE_FORMAT)
    ));

    let url = format!(
        "{}?key={}&locatie={},{}",
        WEERLIVE_URL, config.weather.api_key, device.coords.lat, device.coords.lon
    );
    logger.debug(&format!("Requesting {}", url));

    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(BoreasError::api(format!(
            "Weerlive request ended with status {}",
            response.status()
        )));
    }

    let payload: serde_json::Value = response
        .json()
        .await
        .map_err(|e| BoreasError::decode(format!("Weerlive response is not JSON: {}", e)))?;

    let mut updates = state_updates_from_payload(&payload)?;
    updates.extend(day_name_updates(&config.day_names, now));
    updates.push(StateUpdate::new(
        "lastSuccessfullRun",
        now.format(MINUTE_FORMAT).to_string(),
    ));
    store.update_states(device.id, updates);

    logger.debug("Weerlive finished. Updated device");
    Ok(())
}

/// Translate a Weerlive payload into state updates
///
/// Every field of every `liveweer` object is copied as-is. When the alarm
/// flag reports inactive (`alarm == "0"`), any alarm text from the same
/// payload is suppressed by clearing `alarmtxt` afterwards.
pub fn state_updates_from_payload(payload: &serde_json::Value) -> Result<Vec<StateUpdate>> {
    let entries = payload
        .get("liveweer")
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            BoreasError::api("Weerlive result did not contain the expected 'liveweer' info")
        })?;

    let mut updates = Vec::new();
    for entry in entries {
        let Some(fields) = entry.as_object() else {
            continue;
        };
        for (key, value) in fields {
            updates.push(StateUpdate::new(key.clone(), value.clone()));
        }
        if fields.get("alarm").and_then(|v| v.as_str()) == Some("0") {
            updates.push(StateUpdate::new("alarmtxt", ""));
        }
    }
    Ok(updates)
}

/// Day-of-week display names for today, tomorrow and the day after
pub fn day_name_updates(day_names: &[String], now: NaiveDateTime) -> Vec<StateUpdate> {
    let mut updates = Vec::with_capacity(3);
    let mut moment = now;
    for key in ["d0day", "d1day", "d2day"] {
        let index = moment.weekday().num_days_from_monday() as usize;
        let name = day_names.get(index).cloned().unwrap_or_default();
        updates.push(StateUpdate::new(key, name));
        moment += Duration::hours(24);
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn value_of<'a>(updates: &'a [StateUpdate], key: &str) -> Option<&'a serde_json::Value> {
        // The store applies updates in order, so the last write wins
        updates.iter().rev().find(|u| u.key == key).map(|u| &u.value)
    }

    #[test]
    fn copies_every_field_verbatim() {
        let payload = json!({
            "liveweer": [{
                "plaats": "Utrecht",
                "temp": "12.4",
                "windr": "ZW",
                "verw": "Af en toe zon"
            }]
        });
        let updates = state_updates_from_payload(&payload).unwrap();
        assert_eq!(value_of(&updates, "plaats"), Some(&json!("Utrecht")));
        assert_eq!(value_of(&updates, "temp"), Some(&json!("12.4")));
        assert_eq!(value_of(&updates, "verw"), Some(&json!("Af en toe zon")));
    }

    #[test]
    fn inactive_alarm_clears_alarm_text() {
        let payload = json!({
            "liveweer": [{
                "alarm": "0",
                "alarmtxt": "stale storm warning"
            }]
        });
        let updates = state_updates_from_payload(&payload).unwrap();
        assert_eq!(value_of(&updates, "alarmtxt"), Some(&json!("")));
        assert_eq!(value_of(&updates, "alarm"), Some(&json!("0")));
    }

    #[test]
    fn active_alarm_keeps_alarm_text() {
        let payload = json!({
            "liveweer": [{
                "alarm": "1",
                "alarmtxt": "code orange"
            }]
        });
        let updates = state_updates_from_payload(&payload).unwrap();
        assert_eq!(value_of(&updates, "alarmtxt"), Some(&json!("code orange")));
    }

    #[test]
    fn missing_liveweer_is_an_api_error() {
        let payload = json!({ "something": [] });
        let err = state_updates_from_payload(&payload).unwrap_err();
        assert!(matches!(err, BoreasError::Api { .. }));
    }

    #[test]
    fn day_names_follow_weekday_numbers() {
        let names: Vec<String> = ["ma", "di", "wo", "do", "vr", "za", "zo"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        // 2021-04-04 is a Sunday
        let now = NaiveDate::from_ymd_opt(2021, 4, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let updates = day_name_updates(&names, now);
        assert_eq!(value_of(&updates, "d0day"), Some(&json!("zo")));
        assert_eq!(value_of(&updates, "d1day"), Some(&json!("ma")));
        assert_eq!(value_of(&updates, "d2day"), Some(&json!("di")));
    }
}
