//! Moon phase calculation
//!
//! Pure function of the current local time, no I/O and no failure path.
//! The lunation constants come from the classic "moon phase from days
//! since 2001-01-01" closed form.

use crate::config::Config;
use crate::logging::get_logger;
use crate::schedule::ScheduleBoard;
use crate::store::{Device, DeviceKind, DeviceStore, MINUTE_FORMAT, StateUpdate};
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Minutes between recalculations, independent of sun position
const RESCHEDULE_MINUTES: i64 = 60;

/// Phase names per supported language, indexed by phase index
const PHASES_NL: [&str; 8] = [
    "Nieuwe maan",
    "Wassende maansikkel",
    "Eerste kwartier",
    "Wassende maan",
    "Volle maan",
    "Afnemende maan",
    "Laatste kwartier",
    "Afnemende maansikkel",
];

const PHASES_EN: [&str; 8] = [
    "New Moon",
    "Waxing crescent",
    "First quarter",
    "Waxing gibbous",
    "Full Moon",
    "Waning gibbous",
    "Last quarter",
    "Waning crescent",
];

/// Image name tag per phase index
const PHASE_IMAGES: [&str; 8] = [
    "new", "waxcr", "first", "waxgi", "full", "wangi", "last", "wancr",
];

/// Computed phase at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoonPhase {
    /// Position within the lunation cycle, [0, 1), rounded to 3 decimals
    pub position: f64,
    /// One of the 8 named phases
    pub index: usize,
}

impl MoonPhase {
    /// Localized phase name; unknown languages fall back to Dutch
    pub fn name(&self, language: &str) -> &'static str {
        match language {
            "EN" => PHASES_EN[self.index],
            _ => PHASES_NL[self.index],
        }
    }

    /// Fixed image tag for this phase
    pub fn icon(&self) -> &'static str {
        PHASE_IMAGES[self.index]
    }
}

/// Compute the moon phase at a local timestamp
pub fn phase_at(now: NaiveDateTime) -> MoonPhase {
    let epoch = NaiveDate::from_ymd_opt(2001, 1, 1)
        .expect("valid epoch date")
        .and_hms_opt(0, 0, 0)
        .expect("valid epoch time");
    let diff = now - epoch;

    // Whole days plus the fractional remainder in seconds
    let whole_days = diff.num_days();
    let leftover_seconds = diff.num_seconds() - whole_days * 86_400;
    let days = whole_days as f64 + leftover_seconds as f64 / 86_400.0;

    let lunations = 0.204_397_31 + days * 0.033_863_192_69;
    let position = lunations.rem_euclid(1.0);
    let index = (((position * 8.0 + 0.5).floor() as i64) & 7) as usize;

    MoonPhase {
        position: (position * 1000.0).round() / 1000.0,
        index,
    }
}

/// Calculate the phase and write it to the device state
pub fn run(config: &Config, store: &dyn DeviceStore, device: &Device, schedule: &mut ScheduleBoard) {
    let logger = get_logger("moon");
    let now = chrono::Local::now().naive_local();

    let next = now + Duration::minutes(RESCHEDULE_MINUTES);
    schedule.advance(DeviceKind::Moon, next);
    logger.debug(&format!(
        "Start moon phase action now. Scheduled next run at {}",
        next.format(MINUTE_FORMAT)
    ));
    store.update_state(
        device.id,
        StateUpdate::new("nextPlannedUpdate", next.format(MINUTE_FORMAT).to_string()),
    );

    let phase = phase_at(now);

    store.update_states(
        device.id,
        vec![
            StateUpdate::new("moonPhase", phase.position),
            StateUpdate::new("moonPhaseIcon", phase.icon()),
            StateUpdate::new("moonIconIndex", phase.index as u64),
            StateUpdate::new("moonPhaseName", phase.name(&config.moon.language)),
            StateUpdate::new(
                "lastSuccessfullRun",
                now.format(MINUTE_FORMAT).to_string(),
            ),
        ],
    );
    logger.debug("Moon phase finished. Updated device");
}
